use rstar::RTree;
use thiserror::Error;
use tracing::debug;

use crate::geometry::{PlacedVertex, Point, VertexShape};
use crate::graph::{
    next_owner_id, EdgeId, GraphError, MetadataKey, OwnerId, SharedGraph, VertexId,
};
use crate::layout::async_::{AsyncLayout, LayoutEvent, Outcome};
use crate::layout::{Layout, LayoutContext, LayoutError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DrawError {
    #[error("no graph is attached to this drawer")]
    NoGraph,
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b }
    }

    /// Decode 0xRRGGBB, the encoding used by `MetadataKey::Color` entries.
    pub fn from_packed(packed: i64) -> Self {
        Color {
            r: ((packed >> 16) & 0xff) as u8,
            g: ((packed >> 8) & 0xff) as u8,
            b: (packed & 0xff) as u8,
        }
    }
}

/// Two distinct invalidation signals: `Redraw` means the positions are still
/// good and only the visuals changed; `Layout` means the positions themselves
/// are stale. `Layout` subsumes `Redraw`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Invalidation {
    Redraw,
    Layout,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EdgeVisual {
    pub edge: EdgeId,
    pub from: Point,
    pub to: Point,
    pub directed: bool,
    pub color: Color,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VertexVisual {
    pub vertex: VertexId,
    pub location: Point,
    pub shape: VertexShape,
    pub color: Color,
    pub label: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    Edge(EdgeVisual),
    Vertex(VertexVisual),
}

/// Ordered draw list handed to an external renderer. Every edge command
/// precedes every vertex command, so vertex shapes occlude edge endpoints.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
    pub commands: Vec<DrawCommand>,
}

impl Scene {
    pub fn edges(&self) -> impl Iterator<Item = &EdgeVisual> {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Edge(edge) => Some(edge),
            DrawCommand::Vertex(_) => None,
        })
    }

    pub fn vertices(&self) -> impl Iterator<Item = &VertexVisual> {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Vertex(vertex) => Some(vertex),
            DrawCommand::Edge(_) => None,
        })
    }
}

/// Composes a graph with per-element visual resolution. Attaching a graph
/// takes its exclusive claim; two drawers can never share one graph instance,
/// only a deep clone of it.
pub struct GraphDrawer {
    owner: OwnerId,
    graph: Option<SharedGraph>,
    default_vertex_color: Color,
    default_edge_color: Color,
    default_vertex_shape: VertexShape,
    hit_index: Option<RTree<PlacedVertex>>,
    pending: Option<Invalidation>,
}

impl GraphDrawer {
    pub fn new() -> Self {
        GraphDrawer {
            owner: next_owner_id(),
            graph: None,
            default_vertex_color: Color::rgb(0, 0, 0),
            default_edge_color: Color::rgb(128, 128, 128),
            default_vertex_shape: VertexShape::default_circle(),
            hit_index: None,
            pending: None,
        }
    }

    /// Attach a graph, claiming it. Fails with `AlreadyOwned` if another
    /// drawer or layout holds it; the previous graph, if any, is released
    /// only once the new claim succeeded.
    pub fn set_graph(&mut self, graph: SharedGraph) -> Result<(), GraphError> {
        graph.claim(self.owner)?;
        if let Some(previous) = self.graph.take() {
            let _ = previous.release(self.owner);
        }
        self.graph = Some(graph);
        self.hit_index = None;
        self.invalidate(Invalidation::Layout);
        Ok(())
    }

    pub fn graph(&self) -> Option<&SharedGraph> {
        self.graph.as_ref()
    }

    pub fn set_default_vertex_color(&mut self, color: Color) {
        self.default_vertex_color = color;
        self.invalidate(Invalidation::Redraw);
    }

    pub fn set_default_edge_color(&mut self, color: Color) {
        self.default_edge_color = color;
        self.invalidate(Invalidation::Redraw);
    }

    pub fn set_default_vertex_shape(&mut self, shape: VertexShape) {
        self.default_vertex_shape = shape;
        self.invalidate(Invalidation::Redraw);
    }

    /// Run a synchronous layout pass over the attached graph.
    pub fn lay_out(
        &mut self,
        layout: &mut dyn Layout,
        ctx: &LayoutContext,
    ) -> Result<(), DrawError> {
        let graph = self.graph.as_ref().ok_or(DrawError::NoGraph)?;
        let mut guard = graph.lock();
        layout.lay_out(&mut guard, ctx)?;
        Ok(())
    }

    /// Resolve metadata into a draw list and rebuild the hit-test index.
    /// Drawing before any layout simply shows the current locations.
    pub fn draw(&mut self) -> Result<Scene, DrawError> {
        let graph = self.graph.as_ref().ok_or(DrawError::NoGraph)?;
        let guard = graph.lock();

        let mut commands = Vec::with_capacity(guard.edge_count() + guard.vertex_count());
        for edge in guard.edge_ids() {
            let (a, b) = guard.endpoints(edge)?;
            let (Some(from), Some(to)) = (guard.location(a), guard.location(b)) else {
                continue;
            };
            let attrs = guard.edge(edge).ok_or(GraphError::MissingEdge)?;
            let color = attrs
                .metadata
                .get_int(MetadataKey::Color)
                .map(Color::from_packed)
                .unwrap_or(self.default_edge_color);
            commands.push(DrawCommand::Edge(EdgeVisual {
                edge,
                from,
                to,
                directed: attrs.directed,
                color,
            }));
        }

        let mut placed = Vec::with_capacity(guard.vertex_count());
        for id in guard.vertex_ids() {
            let Some(vertex) = guard.vertex(id) else {
                continue;
            };
            let shape = vertex.shape.unwrap_or_else(|| {
                vertex
                    .metadata
                    .get_float(MetadataKey::Radius)
                    .map(|radius| VertexShape::Circle { radius })
                    .unwrap_or(self.default_vertex_shape)
            });
            let color = vertex
                .metadata
                .get_int(MetadataKey::Color)
                .map(Color::from_packed)
                .unwrap_or(self.default_vertex_color);
            let label = vertex
                .metadata
                .get_text(MetadataKey::Label)
                .map(str::to_string);
            commands.push(DrawCommand::Vertex(VertexVisual {
                vertex: id,
                location: vertex.location,
                shape,
                color,
                label,
            }));
            placed.push(PlacedVertex {
                id,
                center: vertex.location,
                shape,
            });
        }
        drop(guard);

        debug!(commands = commands.len(), "rebuilt draw scene");
        self.hit_index = Some(RTree::bulk_load(placed));
        Ok(Scene { commands })
    }

    /// Which vertex shape, if any, contains the point. `None` before the
    /// first draw; the index reflects the most recently drawn scene.
    pub fn vertex_from_point(&self, point: Point) -> Option<VertexId> {
        let tree = self.hit_index.as_ref()?;
        tree.nearest_neighbor(&point)
            .filter(|placed| placed.contains(point))
            .map(|placed| placed.id)
    }

    /// Coordinate-pair overload; behaves identically to
    /// [`vertex_from_point`](GraphDrawer::vertex_from_point).
    pub fn vertex_from_xy(&self, x: f64, y: f64) -> Option<VertexId> {
        self.vertex_from_point(Point::new(x, y))
    }

    /// Drain the strongest pending invalidation signal.
    pub fn take_invalidation(&mut self) -> Option<Invalidation> {
        self.pending.take()
    }

    fn invalidate(&mut self, level: Invalidation) {
        self.pending = match (self.pending, level) {
            (Some(Invalidation::Layout), _) | (_, Invalidation::Layout) => {
                Some(Invalidation::Layout)
            }
            _ => Some(Invalidation::Redraw),
        };
    }
}

impl Default for GraphDrawer {
    fn default() -> Self {
        GraphDrawer::new()
    }
}

impl Drop for GraphDrawer {
    fn drop(&mut self) {
        if let Some(graph) = self.graph.take() {
            let _ = graph.release(self.owner);
        }
    }
}

/// Event stream of an asynchronous draw: forwarded layout iterations, then
/// one terminal event carrying the outcome and, unless the pass failed, the
/// scene rebuilt from the final (or last intermediate) positions.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawEvent {
    IterationCompleted {
        iteration: usize,
        locations: Vec<(VertexId, Point)>,
    },
    Completed {
        outcome: Outcome,
        scene: Option<Scene>,
    },
}

/// A [`GraphDrawer`] paired with an [`AsyncLayout`] sharing its claim: start
/// a pass, drain events on the calling thread, receive the redrawn scene with
/// the terminal event.
pub struct AsyncGraphDrawer {
    drawer: GraphDrawer,
    engine: AsyncLayout,
}

impl AsyncGraphDrawer {
    pub fn new(layout: Box<dyn Layout>) -> Self {
        let drawer = GraphDrawer::new();
        let engine = AsyncLayout::with_owner(layout, drawer.owner);
        AsyncGraphDrawer { drawer, engine }
    }

    pub fn set_graph(&mut self, graph: SharedGraph) -> Result<(), DrawError> {
        if self.engine.is_busy() {
            return Err(LayoutError::Busy.into());
        }
        self.drawer.set_graph(graph)?;
        Ok(())
    }

    pub fn set_layout(&mut self, layout: Box<dyn Layout>) -> Result<(), DrawError> {
        let _ = self.engine.set_layout(layout)?;
        self.drawer.invalidate(Invalidation::Layout);
        Ok(())
    }

    pub fn is_busy(&self) -> bool {
        self.engine.is_busy()
    }

    /// Begin layout-then-draw asynchronously; returns immediately.
    pub fn draw_async(&mut self, ctx: LayoutContext) -> Result<(), DrawError> {
        let graph = self.drawer.graph.clone().ok_or(DrawError::NoGraph)?;
        self.engine.start(graph, ctx)?;
        Ok(())
    }

    /// Cooperative cancellation; the terminal event still fires.
    pub fn draw_async_cancel(&self) {
        self.engine.cancel();
    }

    pub fn poll_event(&mut self) -> Option<DrawEvent> {
        let event = self.engine.poll_event()?;
        Some(self.translate(event))
    }

    pub fn wait_event(&mut self) -> Option<DrawEvent> {
        let event = self.engine.wait_event()?;
        Some(self.translate(event))
    }

    pub fn vertex_from_point(&self, point: Point) -> Option<VertexId> {
        self.drawer.vertex_from_point(point)
    }

    pub fn vertex_from_xy(&self, x: f64, y: f64) -> Option<VertexId> {
        self.drawer.vertex_from_xy(x, y)
    }

    pub fn take_invalidation(&mut self) -> Option<Invalidation> {
        self.drawer.take_invalidation()
    }

    fn translate(&mut self, event: LayoutEvent) -> DrawEvent {
        match event {
            LayoutEvent::IterationCompleted {
                iteration,
                locations,
            } => DrawEvent::IterationCompleted {
                iteration,
                locations,
            },
            LayoutEvent::Completed { outcome } => {
                let scene = if outcome.is_failed() {
                    None
                } else {
                    self.drawer.draw().ok()
                };
                DrawEvent::Completed { outcome, scene }
            }
        }
    }
}
