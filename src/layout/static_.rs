use crate::geometry::Point;
use crate::graph::{Graph, MetadataKey, VertexId};

use super::{place, Flow, Layout, LayoutContext, LayoutError};

/// Leaves every location exactly where it is. Selecting it is how a host
/// freezes a hand-tuned arrangement.
#[derive(Debug, Default)]
pub struct NullLayout;

impl Layout for NullLayout {
    fn lay_out_observed(
        &mut self,
        _graph: &mut Graph,
        _ctx: &LayoutContext,
        _observer: &mut dyn FnMut(&Graph, usize) -> Flow,
    ) -> Result<(), LayoutError> {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolarMode {
    /// R metadata is a fraction of the largest inscribed radius.
    Relative,
    /// R metadata is graph units from the center; may land outside the bounds.
    Absolute,
}

/// Places each vertex from its own polar-coordinate metadata
/// (`MetadataKey::PolarR`, `MetadataKey::PolarAngle` in degrees). Vertices
/// without the metadata default to the center, the same way absent static
/// coordinates default to zero.
#[derive(Debug)]
pub struct PolarLayout {
    pub mode: PolarMode,
}

impl PolarLayout {
    pub fn new(mode: PolarMode) -> Self {
        PolarLayout { mode }
    }

    pub fn boxed_relative() -> Box<dyn Layout> {
        Box::new(PolarLayout::new(PolarMode::Relative))
    }

    pub fn boxed_absolute() -> Box<dyn Layout> {
        Box::new(PolarLayout::new(PolarMode::Absolute))
    }
}

impl Layout for PolarLayout {
    fn lay_out_observed(
        &mut self,
        graph: &mut Graph,
        ctx: &LayoutContext,
        _observer: &mut dyn FnMut(&Graph, usize) -> Flow,
    ) -> Result<(), LayoutError> {
        let inner = ctx.inner_bounds();
        let center = inner.center();
        let max_radius = inner.width.min(inner.height) / 2.0;

        let ids: Vec<VertexId> = graph.vertex_ids().collect();
        for id in ids {
            let (r, angle_degrees) = match graph.vertex(id) {
                Some(vertex) => (
                    vertex.metadata.get_float(MetadataKey::PolarR).unwrap_or(0.0),
                    vertex
                        .metadata
                        .get_float(MetadataKey::PolarAngle)
                        .unwrap_or(0.0),
                ),
                None => continue,
            };
            let radius = match self.mode {
                PolarMode::Relative => r.clamp(0.0, 1.0) * max_radius,
                PolarMode::Absolute => r,
            };
            let angle = angle_degrees.to_radians();
            place(
                graph,
                id,
                Point::new(
                    center.x + radius * angle.cos(),
                    center.y + radius * angle.sin(),
                ),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::graph::MetadataValue;

    fn polar_vertex(graph: &mut Graph, r: f64, angle: f64) -> VertexId {
        let id = graph.add_vertex();
        let vertex = graph.vertex_mut(id).unwrap();
        vertex
            .metadata
            .set(MetadataKey::PolarR, MetadataValue::Float(r));
        vertex
            .metadata
            .set(MetadataKey::PolarAngle, MetadataValue::Float(angle));
        id
    }

    #[test]
    fn null_layout_touches_nothing() {
        let mut graph = Graph::new();
        let v = graph.add_vertex_at(Point::new(12.0, 34.0));
        NullLayout
            .lay_out(&mut graph, &LayoutContext::new(Rect::new(0.0, 0.0, 1.0, 1.0)))
            .unwrap();
        assert_eq!(graph.location(v).unwrap(), Point::new(12.0, 34.0));
    }

    #[test]
    fn relative_mode_maps_fractions_into_bounds() {
        let mut graph = Graph::new();
        let rim = polar_vertex(&mut graph, 1.0, 0.0);
        let origin = polar_vertex(&mut graph, 0.0, 90.0);

        let ctx = LayoutContext::new(Rect::new(0.0, 0.0, 100.0, 100.0));
        PolarLayout::new(PolarMode::Relative)
            .lay_out(&mut graph, &ctx)
            .unwrap();

        assert_eq!(graph.location(rim).unwrap(), Point::new(100.0, 50.0));
        assert_eq!(graph.location(origin).unwrap(), Point::new(50.0, 50.0));
    }

    #[test]
    fn relative_mode_clamps_overshooting_fractions() {
        let mut graph = Graph::new();
        let v = polar_vertex(&mut graph, 4.0, 180.0);
        let ctx = LayoutContext::new(Rect::new(0.0, 0.0, 100.0, 100.0));
        PolarLayout::new(PolarMode::Relative)
            .lay_out(&mut graph, &ctx)
            .unwrap();
        let location = graph.location(v).unwrap();
        assert!((location.x - 0.0).abs() < 1e-9);
        assert!((location.y - 50.0).abs() < 1e-9);
    }

    #[test]
    fn absolute_mode_may_leave_the_bounds() {
        let mut graph = Graph::new();
        let v = polar_vertex(&mut graph, 500.0, 0.0);
        let ctx = LayoutContext::new(Rect::new(0.0, 0.0, 100.0, 100.0));
        PolarLayout::new(PolarMode::Absolute)
            .lay_out(&mut graph, &ctx)
            .unwrap();
        assert_eq!(graph.location(v).unwrap(), Point::new(550.0, 50.0));
    }

    #[test]
    fn missing_polar_metadata_defaults_to_center() {
        let mut graph = Graph::new();
        let bare = graph.add_vertex_at(Point::new(-5.0, -5.0));
        let ctx = LayoutContext::new(Rect::new(0.0, 0.0, 100.0, 100.0));
        PolarLayout::new(PolarMode::Relative)
            .lay_out(&mut graph, &ctx)
            .unwrap();
        assert_eq!(graph.location(bare).unwrap(), Point::new(50.0, 50.0));
    }
}
