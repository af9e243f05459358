pub mod async_;
pub mod force_directed;
pub mod geometric;
pub mod multiscale;
pub mod static_;
pub mod sugiyama;
pub(crate) mod trace;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::geometry::{Point, Rect};
use crate::graph::{Graph, GraphError, VertexId};

use force_directed::FruchtermanReingoldLayout;
use geometric::{CircleLayout, GridLayout, RandomLayout, SinusoidLayout, SpiralLayout};
use multiscale::HarelKorenFastMultiscaleLayout;
use static_::{NullLayout, PolarLayout};
use sugiyama::SugiyamaLayout;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("an asynchronous layout pass is already running")]
    Busy,
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("layout worker panicked: {0}")]
    Panicked(String),
}

/// Observer verdict after an iteration: keep refining or wind down. Stopping
/// is not an error; the driver that requested the stop decides what it means.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Continuity store shared across layout passes, so an iterative algorithm
/// resumes from where the previous pass left off instead of jumping.
#[derive(Debug, Default)]
pub struct LayoutMemory {
    slots: hashbrown::HashMap<MemorySlot, f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemorySlot {
    Temperature,
}

impl LayoutMemory {
    pub fn get(&self, slot: MemorySlot) -> Option<f64> {
        self.slots.get(&slot).copied()
    }

    pub fn set(&mut self, slot: MemorySlot, value: f64) {
        self.slots.insert(slot, value);
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

/// Everything a layout pass is given: the rectangle to fill, a margin inset,
/// and optionally a shared memory store. Created fresh per invocation by the
/// caller; read-only to the algorithm apart from the memory slots.
#[derive(Clone, Debug)]
pub struct LayoutContext {
    pub bounds: Rect,
    pub margin: f64,
    memory: Option<Arc<Mutex<LayoutMemory>>>,
}

impl LayoutContext {
    pub fn new(bounds: Rect) -> Self {
        LayoutContext {
            bounds,
            margin: 0.0,
            memory: None,
        }
    }

    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin.max(0.0);
        self
    }

    pub fn with_memory(mut self, memory: Arc<Mutex<LayoutMemory>>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// The rectangle vertices actually land in.
    pub fn inner_bounds(&self) -> Rect {
        self.bounds.inset(self.margin)
    }

    pub fn recall(&self, slot: MemorySlot) -> Option<f64> {
        self.memory.as_ref().and_then(|m| m.lock().get(slot))
    }

    pub fn memorize(&self, slot: MemorySlot, value: f64) {
        if let Some(memory) = &self.memory {
            memory.lock().set(slot, value);
        }
    }
}

/// A layout algorithm: assigns a location to every vertex, inside (or
/// consistently mapped from) the context rectangle.
///
/// `lay_out` is the synchronous contract; it blocks for the full run.
/// `lay_out_observed` is the same run with an iteration observer: one-shot
/// algorithms never call it, iterative ones call it once per refinement tick
/// and stop early when it answers [`Flow::Stop`].
pub trait Layout: Send {
    fn lay_out(&mut self, graph: &mut Graph, ctx: &LayoutContext) -> Result<(), LayoutError> {
        self.lay_out_observed(graph, ctx, &mut |_, _| Flow::Continue)
    }

    fn lay_out_observed(
        &mut self,
        graph: &mut Graph,
        ctx: &LayoutContext,
        observer: &mut dyn FnMut(&Graph, usize) -> Flow,
    ) -> Result<(), LayoutError>;
}

/// The closed set of selectable algorithms. Every variant has exactly one row
/// in [`LAYOUT_REGISTRY`]; adding an algorithm means adding one row there and
/// nothing else.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayoutKind {
    Circle,
    Spiral,
    SinusoidHorizontal,
    SinusoidVertical,
    FruchtermanReingold,
    Grid,
    Random,
    Sugiyama,
    Null,
    Polar,
    PolarAbsolute,
    HarelKorenFastMultiscale,
}

pub struct LayoutRegistration {
    pub kind: LayoutKind,
    pub label: &'static str,
    pub build: fn() -> Box<dyn Layout>,
}

fn boxed<T: Layout + Default + 'static>() -> Box<dyn Layout> {
    Box::<T>::default()
}

/// Single registration table: factory, labels, and enumeration all read from
/// here, so the kind enum and its constructors cannot drift apart.
pub const LAYOUT_REGISTRY: &[LayoutRegistration] = &[
    LayoutRegistration {
        kind: LayoutKind::Circle,
        label: "Circle",
        build: boxed::<CircleLayout>,
    },
    LayoutRegistration {
        kind: LayoutKind::Spiral,
        label: "Spiral",
        build: boxed::<SpiralLayout>,
    },
    LayoutRegistration {
        kind: LayoutKind::SinusoidHorizontal,
        label: "Horizontal Sine Wave",
        build: SinusoidLayout::boxed_horizontal,
    },
    LayoutRegistration {
        kind: LayoutKind::SinusoidVertical,
        label: "Vertical Sine Wave",
        build: SinusoidLayout::boxed_vertical,
    },
    LayoutRegistration {
        kind: LayoutKind::FruchtermanReingold,
        label: "Fruchterman-Reingold",
        build: boxed::<FruchtermanReingoldLayout>,
    },
    LayoutRegistration {
        kind: LayoutKind::Grid,
        label: "Grid",
        build: boxed::<GridLayout>,
    },
    LayoutRegistration {
        kind: LayoutKind::Random,
        label: "Random",
        build: boxed::<RandomLayout>,
    },
    LayoutRegistration {
        kind: LayoutKind::Sugiyama,
        label: "Sugiyama",
        build: boxed::<SugiyamaLayout>,
    },
    LayoutRegistration {
        kind: LayoutKind::Null,
        label: "None",
        build: boxed::<NullLayout>,
    },
    LayoutRegistration {
        kind: LayoutKind::Polar,
        label: "Polar",
        build: PolarLayout::boxed_relative,
    },
    LayoutRegistration {
        kind: LayoutKind::PolarAbsolute,
        label: "Polar Absolute",
        build: PolarLayout::boxed_absolute,
    },
    LayoutRegistration {
        kind: LayoutKind::HarelKorenFastMultiscale,
        label: "Harel-Koren Fast Multiscale",
        build: boxed::<HarelKorenFastMultiscaleLayout>,
    },
];

impl LayoutKind {
    pub fn all() -> impl Iterator<Item = LayoutKind> {
        LAYOUT_REGISTRY.iter().map(|r| r.kind)
    }

    pub fn label(&self) -> &'static str {
        self.registration().label
    }

    pub fn create(&self) -> Box<dyn Layout> {
        (self.registration().build)()
    }

    fn registration(&self) -> &'static LayoutRegistration {
        LAYOUT_REGISTRY
            .iter()
            .find(|r| r.kind == *self)
            .expect("every LayoutKind has a registry row")
    }
}

/// Holds the current algorithm selection and notifies subscribers when it
/// changes. Notification runs synchronously on the setter's thread, after the
/// field update, so a handler re-reading `current` sees the new value.
pub struct LayoutManager {
    current: LayoutKind,
    subscribers: Vec<Box<dyn FnMut(LayoutKind)>>,
}

impl LayoutManager {
    pub fn new(initial: LayoutKind) -> Self {
        LayoutManager {
            current: initial,
            subscribers: Vec::new(),
        }
    }

    pub fn current(&self) -> LayoutKind {
        self.current
    }

    /// Selecting the already-current kind is a no-op and notifies nobody.
    pub fn set_current(&mut self, kind: LayoutKind) {
        if kind == self.current {
            return;
        }
        self.current = kind;
        for subscriber in &mut self.subscribers {
            subscriber(kind);
        }
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(LayoutKind) + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    pub fn create_layout(&self) -> Box<dyn Layout> {
        self.current.create()
    }
}

impl Default for LayoutManager {
    fn default() -> Self {
        LayoutManager::new(LayoutKind::FruchtermanReingold)
    }
}

/// Move a vertex unless it is pinned via `MetadataKey::Locked`.
pub(crate) fn place(graph: &mut Graph, id: VertexId, location: Point) {
    if !graph.is_locked(id) {
        graph.set_location(id, location);
    }
}

/// Deterministic seed derived from graph shape, so stochastic layouts give
/// the same answer for the same graph.
pub(crate) fn layout_seed(graph: &Graph) -> u64 {
    let mut hasher = DefaultHasher::new();
    graph.vertex_count().hash(&mut hasher);
    let mut edge_keys: Vec<(usize, usize)> = graph
        .edge_ids()
        .filter_map(|e| graph.endpoints(e).ok())
        .map(|(a, b)| (a.index(), b.index()))
        .collect();
    edge_keys.sort();
    for (a, b) in edge_keys {
        a.hash(&mut hasher);
        b.hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn registry_covers_every_kind() {
        let kinds = [
            LayoutKind::Circle,
            LayoutKind::Spiral,
            LayoutKind::SinusoidHorizontal,
            LayoutKind::SinusoidVertical,
            LayoutKind::FruchtermanReingold,
            LayoutKind::Grid,
            LayoutKind::Random,
            LayoutKind::Sugiyama,
            LayoutKind::Null,
            LayoutKind::Polar,
            LayoutKind::PolarAbsolute,
            LayoutKind::HarelKorenFastMultiscale,
        ];
        assert_eq!(LAYOUT_REGISTRY.len(), kinds.len());
        for kind in kinds {
            let _ = kind.create();
            assert!(!kind.label().is_empty());
        }
    }

    #[test]
    fn registry_rows_are_unique() {
        for (i, row) in LAYOUT_REGISTRY.iter().enumerate() {
            for other in &LAYOUT_REGISTRY[i + 1..] {
                assert_ne!(row.kind, other.kind);
                assert_ne!(row.label, other.label);
            }
        }
    }

    #[test]
    fn selecting_current_kind_is_silent() {
        let mut manager = LayoutManager::new(LayoutKind::Circle);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        manager.subscribe(move |kind| sink.borrow_mut().push(kind));

        manager.set_current(LayoutKind::Circle);
        assert!(seen.borrow().is_empty());

        manager.set_current(LayoutKind::Grid);
        assert_eq!(*seen.borrow(), vec![LayoutKind::Grid]);
        assert_eq!(manager.current(), LayoutKind::Grid);
    }

    #[test]
    fn subscribers_observe_the_updated_field() {
        // The field flips before notification; a handler consulting a shared
        // copy of the new value must agree with it.
        let mut manager = LayoutManager::default();
        let observed = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&observed);
        manager.subscribe(move |kind| *sink.borrow_mut() = Some(kind));
        manager.set_current(LayoutKind::Sugiyama);
        assert_eq!(*observed.borrow(), Some(LayoutKind::Sugiyama));
    }

    #[test]
    fn layout_seed_is_shape_stable() {
        let make = || {
            let mut g = Graph::new();
            let a = g.add_vertex();
            let b = g.add_vertex();
            g.add_edge(a, b, true).unwrap();
            g
        };
        assert_eq!(layout_seed(&make()), layout_seed(&make()));

        let mut bigger = make();
        bigger.add_vertex();
        assert_ne!(layout_seed(&make()), layout_seed(&bigger));
    }
}
