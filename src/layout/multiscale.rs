use std::collections::VecDeque;

use hashbrown::{HashMap, HashSet};
use priority_queue::PriorityQueue;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::geometry::Point;
use crate::graph::{Graph, VertexId};

use super::force_directed::FruchtermanReingoldLayout;
use super::{layout_seed, place, Flow, Layout, LayoutContext, LayoutError};

/// Harel-Koren style fast multiscale layout: order vertices farthest-first by
/// graph distance, lay out progressively larger center subsets with a local
/// force pass, seed each finer scale by interpolating cluster members around
/// their center, then polish the full graph.
///
/// The farthest-first prefix property makes the scales nested, so extending
/// from k to k' centers reuses the k already-placed ones.
#[derive(Debug)]
pub struct HarelKorenFastMultiscaleLayout {
    pub min_scale: usize,
    pub scale_ratio: f64,
    pub coarse_iterations: usize,
    pub fine_iterations: usize,
}

impl Default for HarelKorenFastMultiscaleLayout {
    fn default() -> Self {
        HarelKorenFastMultiscaleLayout {
            min_scale: 10,
            scale_ratio: 3.0,
            coarse_iterations: 30,
            fine_iterations: 30,
        }
    }
}

impl Layout for HarelKorenFastMultiscaleLayout {
    fn lay_out_observed(
        &mut self,
        graph: &mut Graph,
        ctx: &LayoutContext,
        observer: &mut dyn FnMut(&Graph, usize) -> Flow,
    ) -> Result<(), LayoutError> {
        let ids: Vec<VertexId> = graph.vertex_ids().collect();
        if ids.is_empty() {
            return Ok(());
        }
        let inner = ctx.inner_bounds();
        if inner.is_degenerate() {
            let origin = inner.clamp_point(inner.center());
            for id in &ids {
                place(graph, *id, origin);
            }
            return Ok(());
        }

        let mut fine = FruchtermanReingoldLayout {
            iterations: self.fine_iterations,
            ..Default::default()
        };
        if ids.len() <= self.min_scale {
            return fine.lay_out_observed(graph, ctx, observer);
        }

        let order = farthest_first_order(graph, &ids);
        let mut rng = StdRng::seed_from_u64(layout_seed(graph) ^ 0x9e37_79b9);
        let mut tick = 0usize;

        let mut scale = self.min_scale.max(1);
        while scale < ids.len() {
            let centers = &order[..scale];
            debug!(scale, vertices = ids.len(), "multiscale coarsening step");
            self.lay_out_scale(graph, ctx, centers, &mut rng)?;
            if observer(graph, tick) == Flow::Stop {
                return Ok(());
            }
            tick += 1;
            // Always grow, even with a ratio of 1.0 or below.
            scale = (((scale as f64) * self.scale_ratio).ceil() as usize).max(scale + 1);
        }

        // Full-graph polish; forward its ticks after the per-scale ones.
        fine.lay_out_observed(graph, ctx, &mut |g, _| {
            let flow = observer(g, tick);
            tick += 1;
            flow
        })
    }
}

impl HarelKorenFastMultiscaleLayout {
    /// Lay out one center subset on a coarse graph, then seed every cluster
    /// member near its center.
    fn lay_out_scale(
        &mut self,
        graph: &mut Graph,
        ctx: &LayoutContext,
        centers: &[VertexId],
        rng: &mut StdRng,
    ) -> Result<(), LayoutError> {
        let assignment = assign_to_nearest_center(graph, centers);

        // Coarse graph: one vertex per center, one edge per connected cluster
        // pair, seeded with the centers' current locations.
        let mut coarse = Graph::new();
        let mut coarse_ids: HashMap<VertexId, VertexId> = HashMap::new();
        for center in centers {
            let location = graph.location(*center).unwrap_or_default();
            coarse_ids.insert(*center, coarse.add_vertex_at(location));
        }
        let mut linked: HashSet<(VertexId, VertexId)> = HashSet::new();
        for edge in graph.edge_ids().collect::<Vec<_>>() {
            let (u, v) = graph.endpoints(edge)?;
            let (Some(cu), Some(cv)) = (assignment.get(&u), assignment.get(&v)) else {
                continue;
            };
            if cu == cv {
                continue;
            }
            let key = if cu < cv { (*cu, *cv) } else { (*cv, *cu) };
            if linked.insert(key) {
                coarse.add_edge(coarse_ids[cu], coarse_ids[cv], false)?;
            }
        }

        // Fresh context: coarse passes must not disturb the caller's
        // temperature continuity slot.
        let coarse_ctx = LayoutContext::new(ctx.bounds).with_margin(ctx.margin);
        FruchtermanReingoldLayout {
            iterations: self.coarse_iterations,
            ..Default::default()
        }
        .lay_out(&mut coarse, &coarse_ctx)?;

        let inner = ctx.inner_bounds();
        let local = (inner.width * inner.height / centers.len() as f64).sqrt();
        for center in centers {
            if let Some(location) = coarse.location(coarse_ids[center]) {
                place(graph, *center, location);
            }
        }
        for id in graph.vertex_ids().collect::<Vec<_>>() {
            let Some(center) = assignment.get(&id) else {
                continue;
            };
            if center == &id {
                continue;
            }
            let Some(anchor) = graph.location(*center) else {
                continue;
            };
            let jitter = Point::new(
                (rng.gen::<f64>() - 0.5) * local,
                (rng.gen::<f64>() - 0.5) * local,
            );
            place(graph, id, inner.clamp_point(anchor + jitter));
        }
        Ok(())
    }
}

/// Vertices ordered so each one maximizes the hop distance to all previously
/// chosen ones. Unreachable vertices rank as infinitely far, which pulls one
/// representative out of every component early.
fn farthest_first_order(graph: &Graph, ids: &[VertexId]) -> Vec<VertexId> {
    let mut order = Vec::with_capacity(ids.len());
    let mut queue: PriorityQueue<VertexId, usize> = PriorityQueue::new();
    for id in ids {
        queue.push(*id, usize::MAX);
    }

    let mut current = ids[0];
    queue.remove(&current);
    loop {
        order.push(current);

        // BFS from the new center, tightening every distance it improves.
        let mut frontier = VecDeque::new();
        let mut visited: HashSet<VertexId> = HashSet::new();
        frontier.push_back((current, 0usize));
        visited.insert(current);
        while let Some((vertex, hops)) = frontier.pop_front() {
            for neighbor in graph.neighbors(vertex).collect::<Vec<_>>() {
                if !visited.insert(neighbor) {
                    continue;
                }
                if let Some(&priority) = queue.get_priority(&neighbor) {
                    if hops + 1 < priority {
                        queue.change_priority(&neighbor, hops + 1);
                    }
                }
                frontier.push_back((neighbor, hops + 1));
            }
        }

        match queue.pop() {
            Some((next, _)) => current = next,
            None => break,
        }
    }
    order
}

/// Multi-source BFS: every vertex maps to the center whose wave reaches it
/// first. Vertices no center can reach stay unassigned.
fn assign_to_nearest_center(
    graph: &Graph,
    centers: &[VertexId],
) -> HashMap<VertexId, VertexId> {
    let mut assignment: HashMap<VertexId, VertexId> = HashMap::new();
    let mut frontier = VecDeque::new();
    for center in centers {
        assignment.insert(*center, *center);
        frontier.push_back(*center);
    }
    while let Some(vertex) = frontier.pop_front() {
        let owner = assignment[&vertex];
        for neighbor in graph.neighbors(vertex).collect::<Vec<_>>() {
            if !assignment.contains_key(&neighbor) {
                assignment.insert(neighbor, owner);
                frontier.push_back(neighbor);
            }
        }
    }
    assignment
}
