use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, MutexGuard};
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use thiserror::Error;

use crate::geometry::{Point, VertexShape};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("graph is already attached to another drawer or layout")]
    AlreadyOwned,
    #[error("caller does not hold the claim on this graph")]
    NotOwner,
    #[error("both endpoint vertices must exist")]
    MissingVertex,
    #[error("edge does not exist")]
    MissingEdge,
}

/// Identity of a claim holder. Each drawer or async layout instance gets its
/// own id; the graph records at most one at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OwnerId(u64);

static NEXT_OWNER_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_owner_id() -> OwnerId {
    OwnerId(NEXT_OWNER_ID.fetch_add(1, Ordering::Relaxed))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(NodeIndex);

impl VertexId {
    pub fn from_index(index: usize) -> Self {
        VertexId(NodeIndex::new(index))
    }

    pub fn index(&self) -> usize {
        self.0.index()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EdgeId(EdgeIndex);

impl EdgeId {
    pub fn index(&self) -> usize {
        self.0.index()
    }
}

/// Closed set of per-element annotation keys. Visual overrides and geometry
/// hints travel through these rather than a stringly-typed bag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MetadataKey {
    Label,
    Color,
    Radius,
    Layer,
    PolarR,
    PolarAngle,
    Locked,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Location(Point),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Metadata {
    entries: IndexMap<MetadataKey, MetadataValue>,
}

impl Metadata {
    pub fn set(&mut self, key: MetadataKey, value: MetadataValue) {
        self.entries.insert(key, value);
    }

    pub fn get(&self, key: MetadataKey) -> Option<&MetadataValue> {
        self.entries.get(&key)
    }

    pub fn remove(&mut self, key: MetadataKey) -> Option<MetadataValue> {
        self.entries.shift_remove(&key)
    }

    pub fn get_float(&self, key: MetadataKey) -> Option<f64> {
        match self.entries.get(&key) {
            Some(MetadataValue::Float(value)) => Some(*value),
            Some(MetadataValue::Int(value)) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: MetadataKey) -> Option<bool> {
        match self.entries.get(&key) {
            Some(MetadataValue::Bool(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn get_int(&self, key: MetadataKey) -> Option<i64> {
        match self.entries.get(&key) {
            Some(MetadataValue::Int(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn get_text(&self, key: MetadataKey) -> Option<&str> {
        match self.entries.get(&key) {
            Some(MetadataValue::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Vertex {
    pub location: Point,
    pub shape: Option<VertexShape>,
    pub metadata: Metadata,
}

#[derive(Clone, Debug)]
pub struct EdgeAttrs {
    pub directed: bool,
    pub metadata: Metadata,
}

/// Mutable vertex/edge collection over a petgraph backbone. Element identity
/// is the stable petgraph index, so ids stay valid across removals and the
/// cross-references the layout algorithms need are plain index lookups.
#[derive(Debug, Default)]
pub struct Graph {
    graph: StableDiGraph<Vertex, EdgeAttrs>,
    owner: Option<OwnerId>,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    pub fn add_vertex(&mut self) -> VertexId {
        VertexId(self.graph.add_node(Vertex::default()))
    }

    pub fn add_vertex_at(&mut self, location: Point) -> VertexId {
        VertexId(self.graph.add_node(Vertex {
            location,
            ..Vertex::default()
        }))
    }

    pub fn add_edge(
        &mut self,
        a: VertexId,
        b: VertexId,
        directed: bool,
    ) -> Result<EdgeId, GraphError> {
        if !self.graph.contains_node(a.0) || !self.graph.contains_node(b.0) {
            return Err(GraphError::MissingVertex);
        }
        let index = self.graph.add_edge(
            a.0,
            b.0,
            EdgeAttrs {
                directed,
                metadata: Metadata::default(),
            },
        );
        Ok(EdgeId(index))
    }

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.graph.node_weight(id.0)
    }

    pub fn vertex_mut(&mut self, id: VertexId) -> Option<&mut Vertex> {
        self.graph.node_weight_mut(id.0)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&EdgeAttrs> {
        self.graph.edge_weight(id.0)
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> Option<&mut EdgeAttrs> {
        self.graph.edge_weight_mut(id.0)
    }

    pub fn endpoints(&self, id: EdgeId) -> Result<(VertexId, VertexId), GraphError> {
        self.graph
            .edge_endpoints(id.0)
            .map(|(a, b)| (VertexId(a), VertexId(b)))
            .ok_or(GraphError::MissingEdge)
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.graph.node_indices().map(VertexId)
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.graph.edge_indices().map(EdgeId)
    }

    /// Neighbors along both edge directions; layout algorithms treat the
    /// directed flag as a drawing attribute, not a connectivity one.
    pub fn neighbors(&self, id: VertexId) -> impl Iterator<Item = VertexId> + '_ {
        self.graph
            .neighbors_undirected(id.0)
            .map(VertexId)
    }

    /// Sources of edges pointing at this vertex.
    pub fn incoming(&self, id: VertexId) -> impl Iterator<Item = VertexId> + '_ {
        self.graph
            .neighbors_directed(id.0, petgraph::Direction::Incoming)
            .map(VertexId)
    }

    /// Targets of edges leaving this vertex.
    pub fn outgoing(&self, id: VertexId) -> impl Iterator<Item = VertexId> + '_ {
        self.graph
            .neighbors_directed(id.0, petgraph::Direction::Outgoing)
            .map(VertexId)
    }

    pub fn location(&self, id: VertexId) -> Option<Point> {
        self.graph.node_weight(id.0).map(|v| v.location)
    }

    pub fn set_location(&mut self, id: VertexId, location: Point) {
        if let Some(vertex) = self.graph.node_weight_mut(id.0) {
            vertex.location = location;
        }
    }

    pub fn is_locked(&self, id: VertexId) -> bool {
        self.graph
            .node_weight(id.0)
            .and_then(|v| v.metadata.get_bool(MetadataKey::Locked))
            .unwrap_or(false)
    }

    /// Copy of every vertex location, in vertex-id order. The unit handed to
    /// iteration observers so hosts can read positions without the graph lock.
    pub fn locations(&self) -> Vec<(VertexId, Point)> {
        self.graph
            .node_indices()
            .filter_map(|n| self.graph.node_weight(n).map(|v| (VertexId(n), v.location)))
            .collect()
    }

    pub fn is_owned(&self) -> bool {
        self.owner.is_some()
    }

    /// Take the exclusive claim. Returns whether the claim is newly taken;
    /// re-claiming with the same id is a no-op so a drawer and the async
    /// layout it drives share one claim.
    pub fn claim(&mut self, owner: OwnerId) -> Result<bool, GraphError> {
        match self.owner {
            None => {
                self.owner = Some(owner);
                Ok(true)
            }
            Some(current) if current == owner => Ok(false),
            Some(_) => Err(GraphError::AlreadyOwned),
        }
    }

    pub fn release(&mut self, owner: OwnerId) -> Result<(), GraphError> {
        match self.owner {
            Some(current) if current == owner => {
                self.owner = None;
                Ok(())
            }
            _ => Err(GraphError::NotOwner),
        }
    }

    /// Independent copy with no claim attached. The way to draw the same
    /// logical graph in two places at once.
    pub fn deep_clone(&self) -> Graph {
        Graph {
            graph: self.graph.clone(),
            owner: None,
        }
    }
}

/// Shared handle to a graph. The mutex satisfies the borrow checker across
/// the worker boundary; mutual exclusion between drawers is the claim, at
/// whole-graph granularity.
#[derive(Clone, Debug)]
pub struct SharedGraph {
    inner: Arc<Mutex<Graph>>,
}

impl SharedGraph {
    pub fn new(graph: Graph) -> Self {
        SharedGraph {
            inner: Arc::new(Mutex::new(graph)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Graph> {
        self.inner.lock()
    }

    pub fn claim(&self, owner: OwnerId) -> Result<bool, GraphError> {
        self.inner.lock().claim(owner)
    }

    pub fn release(&self, owner: OwnerId) -> Result<(), GraphError> {
        self.inner.lock().release(owner)
    }

    pub fn deep_clone(&self) -> SharedGraph {
        SharedGraph::new(self.inner.lock().deep_clone())
    }
}

impl Default for SharedGraph {
    fn default() -> Self {
        SharedGraph::new(Graph::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Graph {
        let mut graph = Graph::new();
        let a = graph.add_vertex();
        let b = graph.add_vertex();
        let c = graph.add_vertex();
        graph.add_edge(a, b, true).unwrap();
        graph.add_edge(b, c, true).unwrap();
        graph.add_edge(c, a, false).unwrap();
        graph
    }

    #[test]
    fn add_edge_requires_existing_endpoints() {
        let mut graph = Graph::new();
        let a = graph.add_vertex();
        let ghost = VertexId::from_index(17);
        assert_eq!(graph.add_edge(a, ghost, true), Err(GraphError::MissingVertex));
    }

    #[test]
    fn claim_is_exclusive() {
        let mut graph = triangle();
        let first = next_owner_id();
        let second = next_owner_id();

        assert_eq!(graph.claim(first), Ok(true));
        assert_eq!(graph.claim(first), Ok(false));
        assert_eq!(graph.claim(second), Err(GraphError::AlreadyOwned));

        graph.release(first).unwrap();
        assert_eq!(graph.claim(second), Ok(true));
    }

    #[test]
    fn release_requires_claim_holder() {
        let mut graph = triangle();
        let owner = next_owner_id();
        let stranger = next_owner_id();
        graph.claim(owner).unwrap();
        assert_eq!(graph.release(stranger), Err(GraphError::NotOwner));
    }

    #[test]
    fn deep_clone_drops_the_claim() {
        let mut graph = triangle();
        graph.claim(next_owner_id()).unwrap();
        let copy = graph.deep_clone();
        assert!(!copy.is_owned());
        assert_eq!(copy.vertex_count(), 3);
        assert_eq!(copy.edge_count(), 3);
    }

    #[test]
    fn metadata_typed_accessors() {
        let mut graph = Graph::new();
        let v = graph.add_vertex();
        let vertex = graph.vertex_mut(v).unwrap();
        vertex
            .metadata
            .set(MetadataKey::Radius, MetadataValue::Float(7.5));
        vertex
            .metadata
            .set(MetadataKey::Label, MetadataValue::Text("hub".into()));
        vertex
            .metadata
            .set(MetadataKey::Locked, MetadataValue::Bool(true));

        let vertex = graph.vertex(v).unwrap();
        assert_eq!(vertex.metadata.get_float(MetadataKey::Radius), Some(7.5));
        assert_eq!(vertex.metadata.get_text(MetadataKey::Label), Some("hub"));
        assert!(graph.is_locked(v));
    }

    #[test]
    fn locations_snapshot_reflects_updates() {
        let mut graph = triangle();
        let ids: Vec<VertexId> = graph.vertex_ids().collect();
        graph.set_location(ids[1], Point::new(3.0, 4.0));
        let snapshot = graph.locations();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[1].1, Point::new(3.0, 4.0));
    }
}
