use std::cmp::Ordering;
use std::collections::VecDeque;

use hashbrown::HashMap;

use crate::geometry::Point;
use crate::graph::{Graph, MetadataKey, MetadataValue, VertexId};

use super::{place, Flow, Layout, LayoutContext, LayoutError};

/// Layered layout for directed graphs: longest-path layering, barycenter
/// ordering sweeps to reduce crossings, evenly spread coordinates per layer.
/// Each vertex receives its layer index as `MetadataKey::Layer`.
#[derive(Debug)]
pub struct SugiyamaLayout {
    pub ordering_sweeps: usize,
}

impl Default for SugiyamaLayout {
    fn default() -> Self {
        SugiyamaLayout { ordering_sweeps: 4 }
    }
}

impl Layout for SugiyamaLayout {
    fn lay_out_observed(
        &mut self,
        graph: &mut Graph,
        ctx: &LayoutContext,
        _observer: &mut dyn FnMut(&Graph, usize) -> Flow,
    ) -> Result<(), LayoutError> {
        let ids: Vec<VertexId> = graph.vertex_ids().collect();
        if ids.is_empty() {
            return Ok(());
        }

        let layers = longest_path_layering(graph, &ids);
        let layer_count = layers.values().max().copied().unwrap_or(0) + 1;

        // Group by layer, keeping insertion order as the initial ordering.
        let mut rows: Vec<Vec<VertexId>> = vec![Vec::new(); layer_count];
        for id in &ids {
            rows[layers[id]].push(*id);
        }

        for sweep in 0..self.ordering_sweeps {
            if sweep % 2 == 0 {
                for layer in 1..rows.len() {
                    let reference = slot_index(&rows[layer - 1]);
                    order_by_barycenter(graph, &mut rows[layer], &reference);
                }
            } else {
                for layer in (0..rows.len().saturating_sub(1)).rev() {
                    let reference = slot_index(&rows[layer + 1]);
                    order_by_barycenter(graph, &mut rows[layer], &reference);
                }
            }
        }

        let inner = ctx.inner_bounds();
        let row_height = inner.height / layer_count as f64;
        for (layer, row) in rows.iter().enumerate() {
            let slot_width = inner.width / row.len().max(1) as f64;
            for (slot, id) in row.iter().enumerate() {
                place(
                    graph,
                    *id,
                    Point::new(
                        inner.x + (slot as f64 + 0.5) * slot_width,
                        inner.y + (layer as f64 + 0.5) * row_height,
                    ),
                );
                if let Some(vertex) = graph.vertex_mut(*id) {
                    vertex
                        .metadata
                        .set(MetadataKey::Layer, MetadataValue::Int(layer as i64));
                }
            }
        }
        Ok(())
    }
}

/// Longest-path layering via Kahn's order: a vertex sits one layer below its
/// deepest predecessor. Vertices trapped in cycles never drain and stay on
/// layer zero.
fn longest_path_layering(graph: &Graph, ids: &[VertexId]) -> HashMap<VertexId, usize> {
    let mut remaining: HashMap<VertexId, usize> = ids
        .iter()
        .map(|id| (*id, graph.incoming(*id).count()))
        .collect();
    let mut layers: HashMap<VertexId, usize> = HashMap::new();

    let mut queue: VecDeque<VertexId> = ids
        .iter()
        .filter(|id| remaining[*id] == 0)
        .copied()
        .collect();

    while let Some(id) = queue.pop_front() {
        let layer = graph
            .incoming(id)
            .filter_map(|p| layers.get(&p).map(|l| l + 1))
            .max()
            .unwrap_or(0);
        layers.insert(id, layer);
        for next in graph.outgoing(id).collect::<Vec<_>>() {
            if let Some(count) = remaining.get_mut(&next) {
                *count -= 1;
                if *count == 0 {
                    queue.push_back(next);
                }
            }
        }
    }

    for id in ids {
        layers.entry(*id).or_insert(0);
    }
    layers
}

fn slot_index(row: &[VertexId]) -> HashMap<VertexId, usize> {
    row.iter().enumerate().map(|(i, id)| (*id, i)).collect()
}

/// Stable-sort a row by the mean slot of each vertex's neighbors in the
/// reference row; vertices with no neighbors there keep their slot.
fn order_by_barycenter(
    graph: &Graph,
    row: &mut [VertexId],
    reference: &HashMap<VertexId, usize>,
) {
    let current = slot_index(row);
    let barycenter = |id: VertexId| -> f64 {
        let slots: Vec<usize> = graph
            .neighbors(id)
            .filter_map(|n| reference.get(&n).copied())
            .collect();
        if slots.is_empty() {
            current[&id] as f64
        } else {
            slots.iter().sum::<usize>() as f64 / slots.len() as f64
        }
    };
    row.sort_by(|a, b| {
        barycenter(*a)
            .partial_cmp(&barycenter(*b))
            .unwrap_or(Ordering::Equal)
    });
}
