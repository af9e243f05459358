use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::geometry::Point;
use crate::graph::{next_owner_id, OwnerId, SharedGraph, VertexId};

use super::trace::IterationTrace;
use super::{Flow, Layout, LayoutContext, LayoutError};

/// Terminal result of an asynchronous pass. Cancellation is a distinguished
/// non-error outcome; worker failures arrive here instead of unwinding on a
/// thread nobody observes.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Completed,
    Cancelled,
    Failed(LayoutError),
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

/// What the host receives on its own thread. Iteration events carry a
/// location snapshot taken under the graph lock, so the host reads positions
/// without touching the graph mid-run.
#[derive(Clone, Debug, PartialEq)]
pub enum LayoutEvent {
    IterationCompleted {
        iteration: usize,
        locations: Vec<(VertexId, Point)>,
    },
    Completed {
        outcome: Outcome,
    },
}

enum WorkerMessage {
    Iteration {
        iteration: usize,
        locations: Vec<(VertexId, Point)>,
    },
    Done {
        outcome: Outcome,
        layout: Box<dyn Layout>,
    },
}

/// Drives a layout algorithm on a worker thread.
///
/// State machine: idle → running → idle, where the transition back happens
/// when the host observes the terminal [`LayoutEvent::Completed`] through
/// [`poll_event`](AsyncLayout::poll_event) /
/// [`wait_event`](AsyncLayout::wait_event). At most one pass is in flight;
/// starting a second is [`LayoutError::Busy`].
///
/// Events travel over a rendezvous channel: the worker is parked until the
/// host takes each one, which both preserves ordering (every iteration event
/// strictly precedes the terminal event) and keeps the worker from racing
/// ahead of a host still reacting to the previous tick.
pub struct AsyncLayout {
    layout: Option<Box<dyn Layout>>,
    owner: OwnerId,
    cancel: Arc<AtomicBool>,
    events: Option<Receiver<WorkerMessage>>,
    worker: Option<JoinHandle<()>>,
}

impl AsyncLayout {
    pub fn new(layout: Box<dyn Layout>) -> Self {
        AsyncLayout::with_owner(layout, next_owner_id())
    }

    /// Share a claim holder with the drawer composing this instance, so the
    /// worker piggybacks on the drawer's claim instead of fighting it.
    pub(crate) fn with_owner(layout: Box<dyn Layout>, owner: OwnerId) -> Self {
        AsyncLayout {
            layout: Some(layout),
            owner,
            cancel: Arc::new(AtomicBool::new(false)),
            events: None,
            worker: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.events.is_some()
    }

    /// Swap the algorithm between runs. The replaced instance is returned so
    /// a host can keep tuned parameters around.
    pub fn set_layout(
        &mut self,
        layout: Box<dyn Layout>,
    ) -> Result<Option<Box<dyn Layout>>, LayoutError> {
        if self.is_busy() {
            return Err(LayoutError::Busy);
        }
        Ok(self.layout.replace(layout))
    }

    /// Begin an asynchronous pass. Returns immediately; the caller then
    /// drains events from its own thread.
    pub fn start(&mut self, graph: SharedGraph, ctx: LayoutContext) -> Result<(), LayoutError> {
        if self.is_busy() {
            return Err(LayoutError::Busy);
        }
        let Some(mut layout) = self.layout.take() else {
            return Err(LayoutError::Busy);
        };
        let newly_claimed = match graph.claim(self.owner) {
            Ok(newly) => newly,
            Err(error) => {
                self.layout = Some(layout);
                return Err(error.into());
            }
        };

        self.cancel.store(false, Ordering::SeqCst);
        let (tx, rx) = mpsc::sync_channel(0);
        let cancel = Arc::clone(&self.cancel);
        let owner = self.owner;
        debug!("starting asynchronous layout pass");
        let handle = thread::spawn(move || {
            let outcome = run_algorithm(&mut layout, &graph, &ctx, &tx, &cancel);
            if newly_claimed {
                let _ = graph.release(owner);
            }
            // The algorithm box rides back with the terminal message so the
            // state machine can reuse it for the next pass.
            let _ = tx.send(WorkerMessage::Done { outcome, layout });
        });
        self.events = Some(rx);
        self.worker = Some(handle);
        Ok(())
    }

    /// Request cooperative cancellation. No-op when idle. The algorithm polls
    /// between ticks, so an in-progress tick still finishes; the terminal
    /// event fires regardless.
    pub fn cancel(&self) {
        if self.is_busy() {
            self.cancel.store(true, Ordering::SeqCst);
        }
    }

    /// Non-blocking event read. `None` while idle or when nothing is pending.
    pub fn poll_event(&mut self) -> Option<LayoutEvent> {
        let receiver = self.events.as_ref()?;
        match receiver.try_recv() {
            Ok(message) => Some(self.accept(message)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(self.worker_vanished()),
        }
    }

    /// Blocking event read. `None` only when idle.
    pub fn wait_event(&mut self) -> Option<LayoutEvent> {
        let receiver = self.events.as_ref()?;
        match receiver.recv() {
            Ok(message) => Some(self.accept(message)),
            Err(_) => Some(self.worker_vanished()),
        }
    }

    fn accept(&mut self, message: WorkerMessage) -> LayoutEvent {
        match message {
            WorkerMessage::Iteration {
                iteration,
                locations,
            } => LayoutEvent::IterationCompleted {
                iteration,
                locations,
            },
            WorkerMessage::Done { outcome, layout } => {
                self.layout = Some(layout);
                self.finish_run();
                LayoutEvent::Completed { outcome }
            }
        }
    }

    fn worker_vanished(&mut self) -> LayoutEvent {
        self.finish_run();
        LayoutEvent::Completed {
            outcome: Outcome::Failed(LayoutError::Panicked(
                "layout worker terminated without reporting".into(),
            )),
        }
    }

    fn finish_run(&mut self) {
        self.events = None;
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

/// Worker body. Sends zero or more iteration messages and reports the
/// outcome; every send parks until the host takes it. A host that drops its
/// receiver mid-run turns the next send into a stop signal.
fn run_algorithm(
    layout: &mut Box<dyn Layout>,
    graph: &SharedGraph,
    ctx: &LayoutContext,
    tx: &SyncSender<WorkerMessage>,
    cancel: &AtomicBool,
) -> Outcome {
    let mut trace = IterationTrace::from_env();

    let outcome = if cancel.load(Ordering::SeqCst) {
        Outcome::Cancelled
    } else {
        let run = {
            let mut guard = graph.lock();
            let graph_ref = &mut *guard;
            catch_unwind(AssertUnwindSafe(|| {
                layout.lay_out_observed(graph_ref, ctx, &mut |g, iteration| {
                    let locations = g.locations();
                    trace.record(iteration, &locations);
                    if tx
                        .send(WorkerMessage::Iteration {
                            iteration,
                            locations,
                        })
                        .is_err()
                    {
                        return Flow::Stop;
                    }
                    if cancel.load(Ordering::SeqCst) {
                        Flow::Stop
                    } else {
                        Flow::Continue
                    }
                })
            }))
        };
        match run {
            Ok(Ok(())) => {
                if cancel.load(Ordering::SeqCst) {
                    Outcome::Cancelled
                } else {
                    Outcome::Completed
                }
            }
            Ok(Err(error)) => Outcome::Failed(error),
            Err(panic) => Outcome::Failed(LayoutError::Panicked(panic_text(panic))),
        }
    };

    trace.write(&outcome);
    debug!(?outcome, "asynchronous layout pass finished");
    outcome
}

fn panic_text(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = panic.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::graph::{Graph, GraphError};
    use crate::layout::force_directed::FruchtermanReingoldLayout;
    use crate::layout::LayoutKind;

    fn shared_path_graph(n: usize) -> SharedGraph {
        let mut graph = Graph::new();
        let ids: Vec<_> = (0..n).map(|_| graph.add_vertex()).collect();
        for pair in ids.windows(2) {
            graph.add_edge(pair[0], pair[1], false).unwrap();
        }
        SharedGraph::new(graph)
    }

    fn ctx() -> LayoutContext {
        LayoutContext::new(Rect::new(0.0, 0.0, 100.0, 100.0))
    }

    fn drain(layout: &mut AsyncLayout) -> Vec<LayoutEvent> {
        let mut events = Vec::new();
        while let Some(event) = layout.wait_event() {
            let last = matches!(event, LayoutEvent::Completed { .. });
            events.push(event);
            if last {
                break;
            }
        }
        events
    }

    struct PanickyLayout;

    impl Layout for PanickyLayout {
        fn lay_out_observed(
            &mut self,
            _graph: &mut Graph,
            _ctx: &LayoutContext,
            _observer: &mut dyn FnMut(&Graph, usize) -> Flow,
        ) -> Result<(), LayoutError> {
            panic!("forces diverged");
        }
    }

    #[test]
    fn events_end_with_exactly_one_completion() {
        let mut driver = AsyncLayout::new(Box::new(FruchtermanReingoldLayout {
            iterations: 5,
            ..Default::default()
        }));
        driver.start(shared_path_graph(4), ctx()).unwrap();
        let events = drain(&mut driver);

        let completions = events
            .iter()
            .filter(|e| matches!(e, LayoutEvent::Completed { .. }))
            .count();
        assert_eq!(completions, 1);
        assert!(matches!(
            events.last(),
            Some(LayoutEvent::Completed {
                outcome: Outcome::Completed
            })
        ));

        // Iteration ordinals arrive in order, all before the completion.
        let ordinals: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                LayoutEvent::IterationCompleted { iteration, .. } => Some(*iteration),
                _ => None,
            })
            .collect();
        assert_eq!(ordinals, vec![0, 1, 2, 3, 4]);
        assert!(!driver.is_busy());
    }

    #[test]
    fn starting_while_busy_is_rejected() {
        let mut driver = AsyncLayout::new(LayoutKind::FruchtermanReingold.create());
        let graph = shared_path_graph(3);
        driver.start(graph.clone(), ctx()).unwrap();
        assert!(driver.is_busy());

        let second = driver.start(shared_path_graph(3), ctx());
        assert_eq!(second, Err(LayoutError::Busy));

        drain(&mut driver);
        assert!(!driver.is_busy());
        driver.start(shared_path_graph(3), ctx()).unwrap();
        drain(&mut driver);
    }

    #[test]
    fn cancel_before_any_iteration_reports_cancelled() {
        let mut driver = AsyncLayout::new(LayoutKind::FruchtermanReingold.create());
        driver.start(shared_path_graph(4), ctx()).unwrap();
        driver.cancel();

        let events = drain(&mut driver);
        match events.last() {
            Some(LayoutEvent::Completed { outcome }) => assert!(outcome.is_cancelled()),
            other => panic!("expected completion, got {other:?}"),
        }
        // Whatever ran before the flag was seen still precedes the terminal
        // event, and nothing follows it.
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, LayoutEvent::Completed { .. }))
                .count(),
            1
        );
        assert!(driver.poll_event().is_none());
    }

    #[test]
    fn cancel_while_idle_is_a_no_op() {
        let mut driver = AsyncLayout::new(LayoutKind::Circle.create());
        driver.cancel();
        driver.start(shared_path_graph(3), ctx()).unwrap();
        let events = drain(&mut driver);
        assert!(matches!(
            events.last(),
            Some(LayoutEvent::Completed {
                outcome: Outcome::Completed
            })
        ));
    }

    #[test]
    fn worker_panic_is_captured_as_failure() {
        let mut driver = AsyncLayout::new(Box::new(PanickyLayout));
        let graph = shared_path_graph(2);
        driver.start(graph.clone(), ctx()).unwrap();
        let events = drain(&mut driver);
        match events.last() {
            Some(LayoutEvent::Completed {
                outcome: Outcome::Failed(LayoutError::Panicked(text)),
            }) => assert!(text.contains("forces diverged")),
            other => panic!("expected captured panic, got {other:?}"),
        }
        // The claim must be released even after a failure.
        assert!(!graph.lock().is_owned());
    }

    #[test]
    fn claim_is_held_during_and_released_after_a_run() {
        let mut driver = AsyncLayout::new(LayoutKind::Grid.create());
        let graph = shared_path_graph(3);
        driver.start(graph.clone(), ctx()).unwrap();
        drain(&mut driver);
        assert!(!graph.lock().is_owned());
    }

    #[test]
    fn already_owned_graph_is_rejected_synchronously() {
        let graph = shared_path_graph(3);
        graph.claim(next_owner_id()).unwrap();

        let mut driver = AsyncLayout::new(LayoutKind::Grid.create());
        let result = driver.start(graph, ctx());
        assert_eq!(
            result,
            Err(LayoutError::Graph(GraphError::AlreadyOwned))
        );
        assert!(!driver.is_busy());
        // The algorithm box must survive the refused start.
        driver.start(shared_path_graph(2), ctx()).unwrap();
        drain(&mut driver);
    }

    #[test]
    fn iteration_snapshots_carry_positions() {
        let mut driver = AsyncLayout::new(Box::new(FruchtermanReingoldLayout {
            iterations: 3,
            ..Default::default()
        }));
        driver.start(shared_path_graph(5), ctx()).unwrap();
        let events = drain(&mut driver);
        let snapshot = events.iter().find_map(|e| match e {
            LayoutEvent::IterationCompleted { locations, .. } => Some(locations.clone()),
            _ => None,
        });
        let locations = snapshot.expect("at least one iteration event");
        assert_eq!(locations.len(), 5);
        for (_, location) in locations {
            assert!(location.is_finite());
        }
    }

    #[test]
    fn set_layout_is_refused_mid_run() {
        let mut driver = AsyncLayout::new(LayoutKind::FruchtermanReingold.create());
        driver.start(shared_path_graph(3), ctx()).unwrap();
        assert!(driver.set_layout(LayoutKind::Grid.create()).is_err());
        drain(&mut driver);
        assert!(driver.set_layout(LayoutKind::Grid.create()).is_ok());
    }
}
