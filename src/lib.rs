//! Asynchronous iterative graph layout.
//!
//! The crate positions the vertices of a [`Graph`] inside a rectangle using a
//! selectable algorithm, either synchronously through the [`Layout`] trait or
//! on a worker thread through [`AsyncLayout`], which delivers per-iteration
//! position snapshots and a tri-state completion outcome on the calling
//! thread and supports cooperative cancellation. [`GraphDrawer`] composes a
//! graph with per-element visual metadata into an ordered draw list and
//! answers point hit-tests; [`AsyncGraphDrawer`] couples a drawer to an async
//! layout pass.
//!
//! ```
//! use netlay::{Graph, GraphDrawer, LayoutContext, LayoutKind, Rect, SharedGraph};
//!
//! let mut graph = Graph::new();
//! let a = graph.add_vertex();
//! let b = graph.add_vertex();
//! graph.add_edge(a, b, false).unwrap();
//!
//! let shared = SharedGraph::new(graph);
//! let mut drawer = GraphDrawer::new();
//! drawer.set_graph(shared).unwrap();
//!
//! let ctx = LayoutContext::new(Rect::new(0.0, 0.0, 100.0, 100.0));
//! let mut layout = LayoutKind::Circle.create();
//! drawer.lay_out(layout.as_mut(), &ctx).unwrap();
//! let scene = drawer.draw().unwrap();
//! assert_eq!(scene.vertices().count(), 2);
//! ```

pub mod drawer;
pub mod geometry;
pub mod graph;
pub mod layout;
pub mod trace;

pub use drawer::{
    AsyncGraphDrawer, Color, DrawCommand, DrawError, DrawEvent, EdgeVisual, GraphDrawer,
    Invalidation, Scene, VertexVisual,
};
pub use geometry::{Point, Rect, Size, VertexShape};
pub use graph::{
    EdgeId, Graph, GraphError, Metadata, MetadataKey, MetadataValue, SharedGraph, VertexId,
};
pub use layout::async_::{AsyncLayout, LayoutEvent, Outcome};
pub use layout::{
    Flow, Layout, LayoutContext, LayoutError, LayoutKind, LayoutManager, LayoutMemory,
    MemorySlot, LAYOUT_REGISTRY,
};
