//! # redb-backed Graph Storage
//!
//! A disk-backed content graph using the redb embedded database.
//!
//! - ACID transactions, one per mutating call
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! Nodes and edges are stored as JSON bytes so arbitrary `meta` values survive
//! a round trip. Secondary indexes are composite-key tables scanned by prefix.

use crate::graph::{GraphSnapshot, GraphStore};
use crate::{Edge, LoomError, Node};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, Table, TableDefinition,
};
use std::path::Path;

/// Table for nodes: node id -> JSON Node
const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");

/// Table for the type index: (type_id, node id) -> ()
const TYPE_INDEX: TableDefinition<(&str, &str), ()> = TableDefinition::new("type_index");

/// Table for outgoing edges: (from, role, to) -> JSON Edge
const EDGES_OUT: TableDefinition<(&str, &str, &str), &[u8]> = TableDefinition::new("edges_out");

/// Table for incoming edges: (to, from, role) -> ()
const EDGES_IN: TableDefinition<(&str, &str, &str), ()> = TableDefinition::new("edges_in");

type NodesTable<'txn> = Table<'txn, &'static str, &'static [u8]>;
type TypeIndexTable<'txn> = Table<'txn, (&'static str, &'static str), ()>;

fn io_error(e: impl std::fmt::Display) -> LoomError {
    LoomError::IoError(e.to_string())
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, LoomError> {
    serde_json::to_vec(value).map_err(|e| LoomError::SerializationError(e.to_string()))
}

/// A disk-backed graph store using redb.
pub struct RedbGraph {
    db: Database,
}

impl std::fmt::Debug for RedbGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbGraph").finish_non_exhaustive()
    }
}

impl RedbGraph {
    /// Open or create a graph database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LoomError> {
        let db = Database::create(path.as_ref()).map_err(io_error)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io_error)?;
            let _ = write_txn.open_table(NODES).map_err(io_error)?;
            let _ = write_txn.open_table(TYPE_INDEX).map_err(io_error)?;
            let _ = write_txn.open_table(EDGES_OUT).map_err(io_error)?;
            let _ = write_txn.open_table(EDGES_IN).map_err(io_error)?;
            write_txn.commit().map_err(io_error)?;
        }

        tracing::debug!(path = %path.as_ref().display(), "Opened redb graph");
        Ok(Self { db })
    }

    /// Get all edges in deterministic `(from, role, to)` order.
    pub fn edges(&self) -> Result<Vec<Edge>, LoomError> {
        let read_txn = self.db.begin_read().map_err(io_error)?;
        let table = read_txn.open_table(EDGES_OUT).map_err(io_error)?;

        let mut edges = Vec::new();
        for entry in table.iter().map_err(io_error)? {
            let (_, value) = entry.map_err(io_error)?;
            edges.push(serde_json::from_slice(value.value())?);
        }
        Ok(edges)
    }

    /// Copy the whole store into a serializable snapshot.
    pub fn snapshot(&self) -> Result<GraphSnapshot, LoomError> {
        Ok(GraphSnapshot {
            nodes: self.all_nodes()?,
            edges: self.edges()?,
        })
    }

    /// Write one node and keep the type index in step.
    fn write_node(
        nodes: &mut NodesTable<'_>,
        type_index: &mut TypeIndexTable<'_>,
        node: &Node,
    ) -> Result<(), LoomError> {
        let previous: Option<Node> = nodes
            .get(node.id.as_str())
            .map_err(io_error)?
            .map(|data| serde_json::from_slice(data.value()))
            .transpose()?;

        if let Some(previous) = previous
            && previous.type_id != node.type_id
        {
            type_index
                .remove((previous.type_id.as_str(), node.id.as_str()))
                .map_err(io_error)?;
        }

        let bytes = encode(node)?;
        nodes
            .insert(node.id.as_str(), bytes.as_slice())
            .map_err(io_error)?;
        type_index
            .insert((node.type_id.as_str(), node.id.as_str()), ())
            .map_err(io_error)?;
        Ok(())
    }
}

// =============================================================================
// GRAPHSTORE TRAIT IMPLEMENTATION
// =============================================================================

impl GraphStore for RedbGraph {
    fn upsert(&mut self, node: Node) -> Result<(), LoomError> {
        node.validate()?;

        let write_txn = self.db.begin_write().map_err(io_error)?;
        {
            let mut nodes = write_txn.open_table(NODES).map_err(io_error)?;
            let mut type_index = write_txn.open_table(TYPE_INDEX).map_err(io_error)?;
            Self::write_node(&mut nodes, &mut type_index, &node)?;
        }
        write_txn.commit().map_err(io_error)?;
        Ok(())
    }

    /// Single ACID transaction for the whole batch.
    ///
    /// Every node is validated before the transaction opens, so an invalid
    /// node rejects the batch without touching the database.
    fn upsert_many(&mut self, batch: Vec<Node>) -> Result<usize, LoomError> {
        if batch.is_empty() {
            return Ok(0);
        }
        for node in &batch {
            node.validate()?;
        }

        let write_txn = self.db.begin_write().map_err(io_error)?;
        {
            let mut nodes = write_txn.open_table(NODES).map_err(io_error)?;
            let mut type_index = write_txn.open_table(TYPE_INDEX).map_err(io_error)?;
            for node in &batch {
                Self::write_node(&mut nodes, &mut type_index, node)?;
            }
        }
        write_txn.commit().map_err(io_error)?;

        tracing::debug!(count = batch.len(), "Committed node batch");
        Ok(batch.len())
    }

    fn try_get(&self, id: &str) -> Result<Option<Node>, LoomError> {
        let read_txn = self.db.begin_read().map_err(io_error)?;
        let table = read_txn.open_table(NODES).map_err(io_error)?;

        match table.get(id).map_err(io_error)? {
            Some(data) => Ok(Some(serde_json::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    fn get_nodes_by_type(&self, type_id: &str) -> Result<Vec<Node>, LoomError> {
        let read_txn = self.db.begin_read().map_err(io_error)?;
        let index = read_txn.open_table(TYPE_INDEX).map_err(io_error)?;
        let nodes = read_txn.open_table(NODES).map_err(io_error)?;

        let mut result = Vec::new();
        for entry in index.range((type_id, "")..).map_err(io_error)? {
            let (key, _) = entry.map_err(io_error)?;
            let (indexed_type, node_id) = key.value();
            if indexed_type != type_id {
                break;
            }
            if let Some(data) = nodes.get(node_id).map_err(io_error)? {
                result.push(serde_json::from_slice(data.value())?);
            }
        }
        Ok(result)
    }

    fn all_nodes(&self) -> Result<Vec<Node>, LoomError> {
        let read_txn = self.db.begin_read().map_err(io_error)?;
        let table = read_txn.open_table(NODES).map_err(io_error)?;

        let mut nodes = Vec::new();
        for entry in table.iter().map_err(io_error)? {
            let (_, value) = entry.map_err(io_error)?;
            nodes.push(serde_json::from_slice(value.value())?);
        }
        Ok(nodes)
    }

    fn upsert_edge(&mut self, edge: Edge) -> Result<(), LoomError> {
        edge.validate()?;

        let write_txn = self.db.begin_write().map_err(io_error)?;
        {
            let nodes = write_txn.open_table(NODES).map_err(io_error)?;
            for endpoint in [&edge.from_id, &edge.to_id] {
                if nodes.get(endpoint.as_str()).map_err(io_error)?.is_none() {
                    return Err(LoomError::NodeNotFound(endpoint.clone()));
                }
            }

            let bytes = encode(&edge)?;
            let mut out = write_txn.open_table(EDGES_OUT).map_err(io_error)?;
            out.insert(
                (edge.from_id.as_str(), edge.role.as_str(), edge.to_id.as_str()),
                bytes.as_slice(),
            )
            .map_err(io_error)?;

            let mut incoming = write_txn.open_table(EDGES_IN).map_err(io_error)?;
            incoming
                .insert(
                    (edge.to_id.as_str(), edge.from_id.as_str(), edge.role.as_str()),
                    (),
                )
                .map_err(io_error)?;
        }
        write_txn.commit().map_err(io_error)?;
        Ok(())
    }

    fn get_edges_from(&self, id: &str) -> Result<Vec<Edge>, LoomError> {
        let read_txn = self.db.begin_read().map_err(io_error)?;
        let table = read_txn.open_table(EDGES_OUT).map_err(io_error)?;

        let mut edges = Vec::new();
        for entry in table.range((id, "", "")..).map_err(io_error)? {
            let (key, value) = entry.map_err(io_error)?;
            if key.value().0 != id {
                break;
            }
            edges.push(serde_json::from_slice(value.value())?);
        }
        Ok(edges)
    }

    fn get_edges_to(&self, id: &str) -> Result<Vec<Edge>, LoomError> {
        let read_txn = self.db.begin_read().map_err(io_error)?;
        let incoming = read_txn.open_table(EDGES_IN).map_err(io_error)?;
        let out = read_txn.open_table(EDGES_OUT).map_err(io_error)?;

        let mut edges = Vec::new();
        for entry in incoming.range((id, "", "")..).map_err(io_error)? {
            let (key, _) = entry.map_err(io_error)?;
            let (to, from, role) = key.value();
            if to != id {
                break;
            }
            if let Some(data) = out.get((from, role, to)).map_err(io_error)? {
                edges.push(serde_json::from_slice(data.value())?);
            }
        }
        Ok(edges)
    }

    fn node_count(&self) -> Result<usize, LoomError> {
        let read_txn = self.db.begin_read().map_err(io_error)?;
        let table = read_txn.open_table(NODES).map_err(io_error)?;
        let count = table.len().map_err(io_error)?;
        Ok(count as usize)
    }

    fn edge_count(&self) -> Result<usize, LoomError> {
        let read_txn = self.db.begin_read().map_err(io_error)?;
        let table = read_txn.open_table(EDGES_OUT).map_err(io_error)?;
        let count = table.len().map_err(io_error)?;
        Ok(count as usize)
    }

    fn contains_node(&self, id: &str) -> Result<bool, LoomError> {
        let read_txn = self.db.begin_read().map_err(io_error)?;
        let table = read_txn.open_table(NODES).map_err(io_error)?;
        Ok(table.get(id).map_err(io_error)?.is_some())
    }
}

// =============================================================================
// TESTS
// =============================================================================
