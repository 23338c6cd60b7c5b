//! # Graph Engine
//!
//! The shared content graph every subsystem reads and writes.
//!
//! This module defines the `GraphStore` trait (the store contract) and the
//! in-memory `Graph` implementation. All data structures use `BTreeMap` for
//! deterministic ordering.

use crate::{Edge, LoomError, Node};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// GRAPHSTORE TRAIT
// =============================================================================

/// The GraphStore trait defines the store contract.
///
/// All fallible operations return `Result<T, LoomError>` so in-memory and
/// persistent backends are used uniformly.
pub trait GraphStore {
    /// Insert or replace a node by id. Atomic per call.
    ///
    /// Returns `LoomError::InvalidNode` if the node fails validation.
    fn upsert(&mut self, node: Node) -> Result<(), LoomError>;

    /// Insert or replace a batch of nodes.
    ///
    /// The default loops over `upsert`; backends with transactions override
    /// this to commit once.
    fn upsert_many(&mut self, nodes: Vec<Node>) -> Result<usize, LoomError> {
        let count = nodes.len();
        for node in nodes {
            self.upsert(node)?;
        }
        Ok(count)
    }

    /// Lookup a node by id.
    fn try_get(&self, id: &str) -> Result<Option<Node>, LoomError>;

    /// All nodes with the given type id, ordered by node id.
    fn get_nodes_by_type(&self, type_id: &str) -> Result<Vec<Node>, LoomError>;

    /// Every node in the store, ordered by node id.
    fn all_nodes(&self) -> Result<Vec<Node>, LoomError>;

    /// Insert or replace an edge keyed by `(from_id, role, to_id)`.
    ///
    /// Returns `LoomError::NodeNotFound` if either endpoint is missing.
    fn upsert_edge(&mut self, edge: Edge) -> Result<(), LoomError>;

    /// Outgoing edges of a node.
    fn get_edges_from(&self, id: &str) -> Result<Vec<Edge>, LoomError>;

    /// Incoming edges of a node.
    fn get_edges_to(&self, id: &str) -> Result<Vec<Edge>, LoomError>;

    /// Get the total number of nodes.
    fn node_count(&self) -> Result<usize, LoomError>;

    /// Get the total number of edges.
    fn edge_count(&self) -> Result<usize, LoomError>;

    /// Check if a node exists.
    fn contains_node(&self, id: &str) -> Result<bool, LoomError> {
        Ok(self.try_get(id)?.is_some())
    }
}

// =============================================================================
// GRAPH IMPLEMENTATION
// =============================================================================

/// In-memory content graph.
///
/// Uses `BTreeMap` exclusively for deterministic ordering.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Node storage: id -> Node
    nodes: BTreeMap<String, Node>,

    /// Type index: type_id -> {node ids}
    type_index: BTreeMap<String, BTreeSet<String>>,

    /// Outgoing adjacency: from -> (role, to) -> Edge
    edges_out: BTreeMap<String, BTreeMap<(String, String), Edge>>,

    /// Incoming adjacency: to -> {(from, role)}
    edges_in: BTreeMap<String, BTreeSet<(String, String)>>,
}

impl Graph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all nodes in deterministic order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all edges in deterministic order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges_out.values().flat_map(BTreeMap::values)
    }

    /// Borrowing lookup (no clone).
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    fn unindex(&mut self, node: &Node) {
        if let Some(ids) = self.type_index.get_mut(&node.type_id) {
            ids.remove(&node.id);
            if ids.is_empty() {
                self.type_index.remove(&node.type_id);
            }
        }
    }
}

impl GraphStore for Graph {
    fn upsert(&mut self, node: Node) -> Result<(), LoomError> {
        node.validate()?;

        if let Some(previous) = self.nodes.remove(&node.id) {
            self.unindex(&previous);
        }
        self.type_index
            .entry(node.type_id.clone())
            .or_default()
            .insert(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    fn try_get(&self, id: &str) -> Result<Option<Node>, LoomError> {
        Ok(self.nodes.get(id).cloned())
    }

    fn get_nodes_by_type(&self, type_id: &str) -> Result<Vec<Node>, LoomError> {
        Ok(self
            .type_index
            .get(type_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.nodes.get(id).cloned())
            .collect())
    }

    fn all_nodes(&self) -> Result<Vec<Node>, LoomError> {
        Ok(self.nodes.values().cloned().collect())
    }

    fn upsert_edge(&mut self, edge: Edge) -> Result<(), LoomError> {
        edge.validate()?;
        for endpoint in [&edge.from_id, &edge.to_id] {
            if !self.nodes.contains_key(endpoint) {
                return Err(LoomError::NodeNotFound(endpoint.clone()));
            }
        }

        self.edges_in
            .entry(edge.to_id.clone())
            .or_default()
            .insert((edge.from_id.clone(), edge.role.clone()));
        self.edges_out
            .entry(edge.from_id.clone())
            .or_default()
            .insert((edge.role.clone(), edge.to_id.clone()), edge);
        Ok(())
    }

    fn get_edges_from(&self, id: &str) -> Result<Vec<Edge>, LoomError> {
        Ok(self
            .edges_out
            .get(id)
            .into_iter()
            .flat_map(|targets| targets.values().cloned())
            .collect())
    }

    fn get_edges_to(&self, id: &str) -> Result<Vec<Edge>, LoomError> {
        Ok(self
            .edges_in
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|(from, role)| {
                self.edges_out
                    .get(from)?
                    .get(&(role.clone(), id.to_string()))
                    .cloned()
            })
            .collect())
    }

    fn node_count(&self) -> Result<usize, LoomError> {
        Ok(self.nodes.len())
    }

    fn edge_count(&self) -> Result<usize, LoomError> {
        Ok(self.edges_out.values().map(BTreeMap::len).sum())
    }

    fn contains_node(&self, id: &str) -> Result<bool, LoomError> {
        Ok(self.nodes.contains_key(id))
    }
}

// =============================================================================
// SERIALIZATION SUPPORT
// =============================================================================

/// Serializable representation of a graph for persistence and export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl From<&Graph> for GraphSnapshot {
    fn from(graph: &Graph) -> Self {
        Self {
            nodes: graph.nodes().cloned().collect(),
            edges: graph.edges().cloned().collect(),
        }
    }
}

impl TryFrom<GraphSnapshot> for Graph {
    type Error = LoomError;

    /// Rebuild a graph. Nodes are validated; edges must reference nodes
    /// present in the snapshot.
    fn try_from(snapshot: GraphSnapshot) -> Result<Self, Self::Error> {
        let mut graph = Graph::new();
        for node in snapshot.nodes {
            graph.upsert(node)?;
        }
        for edge in snapshot.edges {
            graph.upsert_edge(edge)?;
        }
        Ok(graph)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContentState, EdgeWeight};

    #[test]
    fn upsert_and_get_node() {
        let mut graph = Graph::new();
        graph.upsert(Node::new("n1", "app.note")).expect("upsert");

        let node = graph.try_get("n1").expect("get");
        assert_eq!(node.map(|n| n.type_id), Some("app.note".to_string()));
        assert_eq!(graph.try_get("missing").expect("get"), None);
    }

    #[test]
    fn upsert_replaces_by_id() {
        let mut graph = Graph::new();
        graph.upsert(Node::new("n1", "app.note")).expect("upsert");
        graph
            .upsert(Node::new("n1", "app.note").with_title("second"))
            .expect("upsert");

        assert_eq!(graph.node_count().expect("count"), 1);
        assert_eq!(graph.get("n1").map(|n| n.title.as_str()), Some("second"));
    }

    #[test]
    fn upsert_is_idempotent() {
        let mut graph = Graph::new();
        let node = Node::new("n1", "app.note").with_state(ContentState::Ice);
        graph.upsert(node.clone()).expect("upsert");
        graph.upsert(node.clone()).expect("upsert");

        assert_eq!(graph.node_count().expect("count"), 1);
        assert_eq!(graph.get_nodes_by_type("app.note").expect("by type"), vec![node]);
    }

    #[test]
    fn upsert_rejects_invalid_node() {
        let mut graph = Graph::new();
        let result = graph.upsert(Node::new("", "app.note"));
        assert!(matches!(result, Err(LoomError::InvalidNode(_))));
        assert_eq!(graph.node_count().expect("count"), 0);
    }

    #[test]
    fn type_change_moves_type_index() {
        let mut graph = Graph::new();
        graph.upsert(Node::new("n1", "app.note")).expect("upsert");
        graph.upsert(Node::new("n1", "app.task")).expect("upsert");

        assert!(graph.get_nodes_by_type("app.note").expect("by type").is_empty());
        assert_eq!(graph.get_nodes_by_type("app.task").expect("by type").len(), 1);
    }

    #[test]
    fn nodes_by_type_in_id_order() {
        let mut graph = Graph::new();
        graph.upsert(Node::new("c", "app.note")).expect("upsert");
        graph.upsert(Node::new("a", "app.note")).expect("upsert");
        graph.upsert(Node::new("b", "app.other")).expect("upsert");

        let ids: Vec<_> = graph
            .get_nodes_by_type("app.note")
            .expect("by type")
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(graph.all_nodes().expect("all").len(), 3);
    }

    #[test]
    fn edges_from_and_to() {
        let mut graph = Graph::new();
        for id in ["a", "b", "c"] {
            graph.upsert(Node::new(id, "app.note")).expect("upsert");
        }
        graph.upsert_edge(Edge::new("a", "b", "links")).expect("edge");
        graph.upsert_edge(Edge::new("c", "b", "links")).expect("edge");
        graph.upsert_edge(Edge::new("a", "c", "cites")).expect("edge");

        assert_eq!(graph.get_edges_from("a").expect("from").len(), 2);
        let incoming: Vec<_> = graph
            .get_edges_to("b")
            .expect("to")
            .into_iter()
            .map(|e| e.from_id)
            .collect();
        assert_eq!(incoming, vec!["a", "c"]);
        assert_eq!(graph.edge_count().expect("count"), 3);
    }

    #[test]
    fn upsert_edge_replaces_same_key() {
        let mut graph = Graph::new();
        graph.upsert(Node::new("a", "app.note")).expect("upsert");
        graph.upsert(Node::new("b", "app.note")).expect("upsert");

        graph.upsert_edge(Edge::new("a", "b", "links")).expect("edge");
        graph
            .upsert_edge(Edge::new("a", "b", "links").with_weight(EdgeWeight::new(7)))
            .expect("edge");

        let edges = graph.get_edges_from("a").expect("from");
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].weight, EdgeWeight::new(7));
        assert_eq!(graph.get_edges_to("b").expect("to").len(), 1);
    }

    #[test]
    fn upsert_edge_rejects_dangling_endpoint() {
        let mut graph = Graph::new();
        graph.upsert(Node::new("a", "app.note")).expect("upsert");

        let result = graph.upsert_edge(Edge::new("a", "missing", "links"));
        assert!(matches!(result, Err(LoomError::NodeNotFound(id)) if id == "missing"));
        assert_eq!(graph.edge_count().expect("count"), 0);
    }

    #[test]
    fn snapshot_roundtrip() {
        let mut graph = Graph::new();
        graph.upsert(Node::new("a", "app.note").with_meta("k", "v")).expect("upsert");
        graph.upsert(Node::new("b", "app.note")).expect("upsert");
        graph.upsert_edge(Edge::new("a", "b", "links")).expect("edge");

        let snapshot = GraphSnapshot::from(&graph);
        let restored = Graph::try_from(snapshot.clone()).expect("restore");

        assert_eq!(GraphSnapshot::from(&restored), snapshot);
        assert_eq!(restored.get("a").and_then(|n| n.meta_str("k")), Some("v"));
    }

    #[test]
    fn snapshot_with_dangling_edge_fails() {
        let snapshot = GraphSnapshot {
            nodes: vec![Node::new("a", "app.note")],
            edges: vec![Edge::new("a", "ghost", "links")],
        };
        assert!(Graph::try_from(snapshot).is_err());
    }
}
