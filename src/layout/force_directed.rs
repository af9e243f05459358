use hashbrown::HashMap;
use tracing::debug;

use crate::geometry::Point;
use crate::graph::{Graph, VertexId};

use super::geometric::RandomLayout;
use super::{Flow, Layout, LayoutContext, LayoutError, MemorySlot};

/// Fruchterman-Reingold force simulation. Repulsion k²/d between every pair,
/// attraction d²/k along edges, displacement capped by a temperature that
/// cools geometrically each tick.
///
/// The temperature is persisted in the context's memory store, so a follow-up
/// pass over a slightly perturbed graph refines gently instead of reheating
/// and scattering the arrangement.
#[derive(Debug)]
pub struct FruchtermanReingoldLayout {
    pub iterations: usize,
    pub cooling: f64,
}

impl Default for FruchtermanReingoldLayout {
    fn default() -> Self {
        FruchtermanReingoldLayout {
            iterations: 50,
            cooling: 0.95,
        }
    }
}

const MIN_TEMPERATURE: f64 = 0.01;
const MIN_DISTANCE: f64 = 0.01;

impl Layout for FruchtermanReingoldLayout {
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
                super::place(graph, *id, origin);
            }
            return Ok(());
        }

        // Vertices stacked on one point exert no usable forces; scatter first.
        let all_coincident = {
            let locations = graph.locations();
            locations.iter().all(|(_, p)| *p == locations[0].1)
        };
        if all_coincident {
            RandomLayout.lay_out(graph, ctx)?;
        }

        let k = (inner.width * inner.height / ids.len() as f64).sqrt().max(MIN_DISTANCE);
        let k_squared = k * k;
        let mut temperature = ctx
            .recall(MemorySlot::Temperature)
            .unwrap_or(inner.width.min(inner.height) / 10.0)
            .max(MIN_TEMPERATURE);

        debug!(
            vertices = ids.len(),
            iterations = self.iterations,
            temperature,
            "starting force-directed pass"
        );

        let edges: Vec<(VertexId, VertexId)> = graph
            .edge_ids()
            .filter_map(|e| graph.endpoints(e).ok())
            .collect();

        for iteration in 0..self.iterations {
            let mut displacements: HashMap<VertexId, Point> =
                ids.iter().map(|id| (*id, Point::default())).collect();

            // Repulsion between all pairs.
            for i in 0..ids.len() {
                for j in i + 1..ids.len() {
                    let (Some(pos_i), Some(pos_j)) =
                        (graph.location(ids[i]), graph.location(ids[j]))
                    else {
                        continue;
                    };
                    let delta = pos_i - pos_j;
                    let distance = delta.length_as_vector().max(MIN_DISTANCE);
                    let force = k_squared / distance;
                    let push = delta * (force / distance);
                    if let Some(d) = displacements.get_mut(&ids[i]) {
                        *d = *d + push;
                    }
                    if let Some(d) = displacements.get_mut(&ids[j]) {
                        *d = *d - push;
                    }
                }
            }

            // Attraction along edges.
            for (u, v) in &edges {
                let (Some(pos_u), Some(pos_v)) = (graph.location(*u), graph.location(*v)) else {
                    continue;
                };
                let delta = pos_u - pos_v;
                let distance = delta.length_as_vector().max(MIN_DISTANCE);
                let force = distance * distance / k;
                let pull = delta * (force / distance);
                if let Some(d) = displacements.get_mut(u) {
                    *d = *d - pull;
                }
                if let Some(d) = displacements.get_mut(v) {
                    *d = *d + pull;
                }
            }

            // Apply, capped by temperature, clamped to the bounds.
            for id in &ids {
                if graph.is_locked(*id) {
                    continue;
                }
                let (Some(position), Some(displacement)) =
                    (graph.location(*id), displacements.get(id))
                else {
                    continue;
                };
                let magnitude = displacement.length_as_vector().max(MIN_DISTANCE);
                let capped = magnitude.min(temperature);
                let moved = position + *displacement * (capped / magnitude);
                graph.set_location(*id, inner.clamp_point(moved));
            }

            temperature = (temperature * self.cooling).max(MIN_TEMPERATURE);

            if observer(graph, iteration) == Flow::Stop {
                break;
            }
        }

        ctx.memorize(MemorySlot::Temperature, temperature);
        Ok(())
    }
}
