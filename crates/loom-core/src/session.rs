//! # Session Module
//!
//! Session management around the shared content graph.
//!
//! The session owns the store and runs the reflection engine against it:
//! locating spec-holder nodes, persisting reflected nodes and registering
//! new specs. The transforms themselves stay pure in `reflector` and
//! `ingestor`.
//!
//! ## Storage Backends
//!
//! - `InMemory`: Uses in-memory `Graph` (fast, volatile unless explicitly saved)
//! - `Persistent`: Uses `RedbGraph` for disk-backed ACID storage

use crate::graph::{Graph, GraphSnapshot, GraphStore};
use crate::primitives::{API_TYPE_ID, META_MODULE_ID, META_SPEC_ID, MODULE_TYPE_ID};
use crate::reflector::Reflector;
use crate::spec::{ApiSpec, ModuleSpec};
use crate::storage::RedbGraph;
use crate::{ContentRef, ContentState, Edge, LoomError, Node};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Storage backend for a Session.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory graph (fast, volatile).
    InMemory(Graph),
    /// Disk-backed graph using redb (ACID, persistent).
    Persistent(RedbGraph),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(Graph::new())
    }
}

/// Result of reflecting a stored spec.
#[derive(Debug, Clone)]
pub struct ReflectOutcome {
    /// Id of the spec-holder node that was reflected.
    pub spec_id: String,
    /// The generated nodes, in emission order.
    pub meta_nodes: Vec<Node>,
}

/// One declared API as read back from a stored api node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRoute {
    pub module_id: String,
    pub api_name: String,
    pub verb: String,
    pub route: String,
    /// Id of the api node the entry was read from.
    pub node_id: String,
}

/// A Session wraps one graph store.
///
/// Note: Session does NOT implement Clone; a redb handle cannot be shared
/// that way. Wrap it in `Arc<RwLock<_>>` to share across tasks.
#[derive(Debug, Default)]
pub struct Session {
    backend: StorageBackend,
}

impl Session {
    /// Create a new empty session with in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session with an existing in-memory graph.
    #[must_use]
    pub fn with_graph(graph: Graph) -> Self {
        Self {
            backend: StorageBackend::InMemory(graph),
        }
    }

    /// Create a session with persistent redb storage.
    ///
    /// Opens or creates a redb database at the given path. All changes are
    /// persisted as they are made.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, LoomError> {
        Ok(Self {
            backend: StorageBackend::Persistent(RedbGraph::open(path)?),
        })
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    /// Short backend name for status output.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            StorageBackend::InMemory(_) => "memory",
            StorageBackend::Persistent(_) => "redb",
        }
    }

    fn store(&self) -> &dyn GraphStore {
        match &self.backend {
            StorageBackend::InMemory(graph) => graph,
            StorageBackend::Persistent(redb) => redb,
        }
    }

    fn store_mut(&mut self) -> &mut dyn GraphStore {
        match &mut self.backend {
            StorageBackend::InMemory(graph) => graph,
            StorageBackend::Persistent(redb) => redb,
        }
    }

    // =========================================================================
    // STORE ACCESS
    // =========================================================================

    pub fn upsert(&mut self, node: Node) -> Result<(), LoomError> {
        self.store_mut().upsert(node)
    }

    pub fn upsert_many(&mut self, nodes: Vec<Node>) -> Result<usize, LoomError> {
        self.store_mut().upsert_many(nodes)
    }

    pub fn try_get(&self, id: &str) -> Result<Option<Node>, LoomError> {
        self.store().try_get(id)
    }

    /// Lookup that treats a missing node as an error.
    pub fn get(&self, id: &str) -> Result<Node, LoomError> {
        self.try_get(id)?
            .ok_or_else(|| LoomError::NodeNotFound(id.to_string()))
    }

    pub fn get_nodes_by_type(&self, type_id: &str) -> Result<Vec<Node>, LoomError> {
        self.store().get_nodes_by_type(type_id)
    }

    pub fn all_nodes(&self) -> Result<Vec<Node>, LoomError> {
        self.store().all_nodes()
    }

    pub fn upsert_edge(&mut self, edge: Edge) -> Result<(), LoomError> {
        self.store_mut().upsert_edge(edge)
    }

    pub fn get_edges_from(&self, id: &str) -> Result<Vec<Edge>, LoomError> {
        self.store().get_edges_from(id)
    }

    pub fn get_edges_to(&self, id: &str) -> Result<Vec<Edge>, LoomError> {
        self.store().get_edges_to(id)
    }

    pub fn node_count(&self) -> Result<usize, LoomError> {
        self.store().node_count()
    }

    pub fn edge_count(&self) -> Result<usize, LoomError> {
        self.store().edge_count()
    }

    /// Node counts per type id, ordered by type id.
    pub fn type_counts(&self) -> Result<BTreeMap<String, usize>, LoomError> {
        let mut counts = BTreeMap::new();
        for node in self.all_nodes()? {
            *counts.entry(node.type_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    // =========================================================================
    // SPEC REFLECTION
    // =========================================================================

    /// All module-typed nodes: spec holders and reflected module nodes alike.
    pub fn list_modules(&self) -> Result<Vec<Node>, LoomError> {
        self.get_nodes_by_type(MODULE_TYPE_ID)
    }

    /// Store `spec` as a `Water` spec-holder node whose id is the spec id.
    ///
    /// Re-registering the same id replaces the holder.
    pub fn register_spec(&mut self, spec: &ModuleSpec) -> Result<Node, LoomError> {
        if spec.id.trim().is_empty() {
            return Err(LoomError::InvalidNode(
                "spec id must not be empty".to_string(),
            ));
        }

        let node = Node::new(spec.id.as_str(), MODULE_TYPE_ID)
            .with_state(ContentState::Water)
            .with_title(spec.title.clone().unwrap_or_else(|| spec.name.clone()))
            .with_description(spec.description.clone().unwrap_or_default())
            .with_content(ContentRef::json(spec)?)
            .with_meta(META_MODULE_ID, spec.id.as_str());

        self.upsert(node.clone())?;
        tracing::info!(event = "spec_registered", spec_id = %node.id, "Registered spec");
        Ok(node)
    }

    /// Find the node holding the spec identified by `id`.
    ///
    /// Resolution order:
    /// 1. a module-typed node whose id is `id`
    /// 2. a module-typed node whose `meta.specId` or `meta.moduleId` is `id`
    /// 3. any node whose `meta.specId` or `meta.moduleId` is `id`
    ///
    /// Returns `LoomError::SpecNotFound` when nothing matches.
    pub fn find_spec_holder(&self, id: &str) -> Result<Node, LoomError> {
        if let Some(node) = self.try_get(id)?
            && node.type_id == MODULE_TYPE_ID
        {
            return Ok(node);
        }

        let tagged = |node: &Node| {
            node.meta_str(META_SPEC_ID) == Some(id) || node.meta_str(META_MODULE_ID) == Some(id)
        };

        if let Some(node) = self.list_modules()?.into_iter().find(|n| tagged(n)) {
            return Ok(node);
        }
        self.all_nodes()?
            .into_iter()
            .find(|n| tagged(n))
            .ok_or_else(|| LoomError::SpecNotFound(id.to_string()))
    }

    /// Reflect the spec identified by `id`, optionally persisting the result.
    ///
    /// Reflection itself is tolerant; only the holder lookup and the store
    /// write can fail.
    pub fn reflect_spec(&mut self, id: &str, persist: bool) -> Result<ReflectOutcome, LoomError> {
        let holder = self.find_spec_holder(id)?;
        let meta_nodes = Reflector::reflect(&holder);
        self.record_reflection(holder.id, meta_nodes, persist)
    }

    /// Finish a reflection run: store the nodes if asked and log the run.
    ///
    /// Split from `reflect_spec` so callers can reflect without holding the
    /// session.
    pub fn record_reflection(
        &mut self,
        spec_id: String,
        meta_nodes: Vec<Node>,
        persist: bool,
    ) -> Result<ReflectOutcome, LoomError> {
        if persist && !meta_nodes.is_empty() {
            self.upsert_many(meta_nodes.clone())?;
        }

        tracing::info!(
            event = "spec_reflected",
            spec_id = %spec_id,
            node_count = meta_nodes.len(),
            persisted = persist,
            "Reflected spec"
        );
        Ok(ReflectOutcome {
            spec_id,
            meta_nodes,
        })
    }

    /// Every declared API found among stored api nodes, in node id order.
    ///
    /// Api nodes whose content does not decode are skipped with a warning.
    pub fn list_routes(&self) -> Result<Vec<ApiRoute>, LoomError> {
        let mut routes = Vec::new();
        for node in self.get_nodes_by_type(API_TYPE_ID)? {
            match node.decode_content::<ApiSpec>() {
                Ok(api) => routes.push(ApiRoute {
                    module_id: node.meta_str(META_MODULE_ID).unwrap_or_default().to_string(),
                    api_name: api.name,
                    verb: api.verb,
                    route: api.route,
                    node_id: node.id,
                }),
                Err(e) => {
                    tracing::warn!(event = "route_skipped", node_id = %node.id, "{}", e);
                }
            }
        }
        Ok(routes)
    }

    // =========================================================================
    // SNAPSHOTS
    // =========================================================================

    /// Copy the whole store into a serializable snapshot.
    pub fn snapshot(&self) -> Result<GraphSnapshot, LoomError> {
        match &self.backend {
            StorageBackend::InMemory(graph) => Ok(GraphSnapshot::from(graph)),
            StorageBackend::Persistent(redb) => redb.snapshot(),
        }
    }

    /// Merge a snapshot into the current store. Nodes go first so edges can
    /// resolve their endpoints.
    ///
    /// Returns `(nodes, edges)` imported.
    pub fn import_snapshot(&mut self, snapshot: GraphSnapshot) -> Result<(usize, usize), LoomError> {
        let nodes = self.upsert_many(snapshot.nodes)?;
        let edges = snapshot.edges.len();
        for edge in snapshot.edges {
            self.upsert_edge(edge)?;
        }
        Ok((nodes, edges))
    }
}

// =============================================================================
// TESTS
// =============================================================================
