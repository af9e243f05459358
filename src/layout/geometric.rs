use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geometry::Point;
use crate::graph::{Graph, VertexId};

use super::{layout_seed, place, Flow, Layout, LayoutContext, LayoutError};

/// Vertices evenly spaced on the largest circle that fits the bounds.
#[derive(Debug, Default)]
pub struct CircleLayout;

impl Layout for CircleLayout {
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
        let inner = ctx.inner_bounds();
        let center = inner.center();
        let radius = inner.width.min(inner.height) / 2.0;
        for (i, id) in ids.iter().enumerate() {
            let angle = 2.0 * PI * (i as f64) / (ids.len() as f64);
            place(
                graph,
                *id,
                Point::new(
                    center.x + radius * angle.cos(),
                    center.y + radius * angle.sin(),
                ),
            );
        }
        Ok(())
    }
}

/// Archimedean spiral from the center outward.
#[derive(Debug)]
pub struct SpiralLayout {
    pub turns: f64,
}

impl Default for SpiralLayout {
    fn default() -> Self {
        SpiralLayout { turns: 3.0 }
    }
}

impl Layout for SpiralLayout {
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
        let inner = ctx.inner_bounds();
        let center = inner.center();
        let max_radius = inner.width.min(inner.height) / 2.0;
        let last = (ids.len() - 1).max(1) as f64;
        for (i, id) in ids.iter().enumerate() {
            let t = i as f64 / last;
            let angle = self.turns * 2.0 * PI * t;
            let radius = max_radius * t;
            place(
                graph,
                *id,
                Point::new(
                    center.x + radius * angle.cos(),
                    center.y + radius * angle.sin(),
                ),
            );
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaveAxis {
    Horizontal,
    Vertical,
}

/// Vertices along one full sine period across the bounds.
#[derive(Debug)]
pub struct SinusoidLayout {
    pub axis: WaveAxis,
}

impl SinusoidLayout {
    pub fn new(axis: WaveAxis) -> Self {
        SinusoidLayout { axis }
    }

    pub fn boxed_horizontal() -> Box<dyn Layout> {
        Box::new(SinusoidLayout::new(WaveAxis::Horizontal))
    }

    pub fn boxed_vertical() -> Box<dyn Layout> {
        Box::new(SinusoidLayout::new(WaveAxis::Vertical))
    }
}

impl Layout for SinusoidLayout {
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
        let inner = ctx.inner_bounds();
        let center = inner.center();
        let last = (ids.len() - 1).max(1) as f64;
        for (i, id) in ids.iter().enumerate() {
            let t = i as f64 / last;
            let wave = (2.0 * PI * t).sin();
            let location = match self.axis {
                WaveAxis::Horizontal => Point::new(
                    inner.x + inner.width * t,
                    center.y + (inner.height / 2.0) * wave,
                ),
                WaveAxis::Vertical => Point::new(
                    center.x + (inner.width / 2.0) * wave,
                    inner.y + inner.height * t,
                ),
            };
            place(graph, *id, location);
        }
        Ok(())
    }
}

/// Row-major grid with ceil(sqrt n) columns.
#[derive(Debug, Default)]
pub struct GridLayout;

impl Layout for GridLayout {
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
        let inner = ctx.inner_bounds();
        let cols = (ids.len() as f64).sqrt().ceil() as usize;
        let rows = ids.len().div_ceil(cols);
        let cell_width = inner.width / cols as f64;
        let cell_height = inner.height / rows as f64;
        for (i, id) in ids.iter().enumerate() {
            let col = i % cols;
            let row = i / cols;
            place(
                graph,
                *id,
                Point::new(
                    inner.x + (col as f64 + 0.5) * cell_width,
                    inner.y + (row as f64 + 0.5) * cell_height,
                ),
            );
        }
        Ok(())
    }
}

/// Uniform placement inside the bounds, seeded from graph shape so the same
/// graph always scatters the same way.
#[derive(Debug, Default)]
pub struct RandomLayout;

impl Layout for RandomLayout {
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
        let inner = ctx.inner_bounds();
        let mut rng = StdRng::seed_from_u64(layout_seed(graph));
        for id in ids {
            let x = inner.x + rng.gen::<f64>() * inner.width;
            let y = inner.y + rng.gen::<f64>() * inner.height;
            place(graph, id, Point::new(x, y));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::graph::{MetadataKey, MetadataValue};

    fn path_graph(n: usize) -> Graph {
        let mut graph = Graph::new();
        let ids: Vec<VertexId> = (0..n).map(|_| graph.add_vertex()).collect();
        for pair in ids.windows(2) {
            graph.add_edge(pair[0], pair[1], false).unwrap();
        }
        graph
    }

    fn assert_inside(graph: &Graph, bounds: Rect) {
        for (_, location) in graph.locations() {
            assert!(location.is_finite());
            assert!(bounds.contains(location), "{location:?} outside {bounds:?}");
        }
    }

    #[test]
    fn circle_keeps_vertices_inside_bounds() {
        let mut graph = path_graph(8);
        let ctx = LayoutContext::new(Rect::new(0.0, 0.0, 100.0, 100.0));
        CircleLayout.lay_out(&mut graph, &ctx).unwrap();
        assert_inside(&graph, ctx.bounds);
    }

    #[test]
    fn degenerate_rectangle_collapses_without_panic() {
        let ctx = LayoutContext::new(Rect::new(0.0, 0.0, 0.0, 0.0));
        for kind in [
            super::super::LayoutKind::Circle,
            super::super::LayoutKind::Spiral,
            super::super::LayoutKind::SinusoidHorizontal,
            super::super::LayoutKind::SinusoidVertical,
            super::super::LayoutKind::Grid,
            super::super::LayoutKind::Random,
        ] {
            let mut graph = path_graph(4);
            kind.create().lay_out(&mut graph, &ctx).unwrap();
            let locations = graph.locations();
            let first = locations[0].1;
            for (_, location) in &locations {
                assert_eq!(*location, first);
            }
        }
    }

    #[test]
    fn grid_positions_are_distinct() {
        let mut graph = path_graph(6);
        let ctx = LayoutContext::new(Rect::new(0.0, 0.0, 60.0, 60.0));
        GridLayout.lay_out(&mut graph, &ctx).unwrap();
        let locations = graph.locations();
        for i in 0..locations.len() {
            for j in i + 1..locations.len() {
                assert_ne!(locations[i].1, locations[j].1);
            }
        }
    }

    #[test]
    fn random_is_deterministic_per_graph_shape() {
        let ctx = LayoutContext::new(Rect::new(0.0, 0.0, 50.0, 50.0));
        let mut first = path_graph(5);
        let mut second = path_graph(5);
        RandomLayout.lay_out(&mut first, &ctx).unwrap();
        RandomLayout.lay_out(&mut second, &ctx).unwrap();
        let a: Vec<Point> = first.locations().into_iter().map(|(_, p)| p).collect();
        let b: Vec<Point> = second.locations().into_iter().map(|(_, p)| p).collect();
        assert_eq!(a, b);
        assert_inside(&first, ctx.bounds);
    }

    #[test]
    fn locked_vertices_do_not_move() {
        let mut graph = path_graph(3);
        let pinned = graph.vertex_ids().next().unwrap();
        graph.set_location(pinned, Point::new(-40.0, -40.0));
        graph
            .vertex_mut(pinned)
            .unwrap()
            .metadata
            .set(MetadataKey::Locked, MetadataValue::Bool(true));

        let ctx = LayoutContext::new(Rect::new(0.0, 0.0, 100.0, 100.0));
        CircleLayout.lay_out(&mut graph, &ctx).unwrap();
        assert_eq!(graph.location(pinned).unwrap(), Point::new(-40.0, -40.0));
    }

    #[test]
    fn margin_insets_the_usable_area() {
        let mut graph = path_graph(10);
        let ctx = LayoutContext::new(Rect::new(0.0, 0.0, 100.0, 100.0)).with_margin(10.0);
        GridLayout.lay_out(&mut graph, &ctx).unwrap();
        assert_inside(&graph, Rect::new(10.0, 10.0, 80.0, 80.0));
    }
}
