//! # loom-core
//!
//! The content graph and spec-reflection engine for Loom.
//!
//! Every subsystem of a Loom server publishes and consumes data through one
//! shared, generically-typed content graph. This crate holds:
//! - the node/edge/content vocabulary (`types`)
//! - the store contract and its in-memory and redb implementations
//! - the reflection engine, which flattens a nested module spec into
//!   independent nodes (`Reflector`) and rebuilds it from them (`Ingestor`)
//! - `Session`, which runs the engine against a store
//!
//! ## Architectural Constraints
//!
//! - Synchronous, NO async, NO network dependencies
//! - Reflection nodes are linked by duplicated meta strings, never by edges
//! - Deterministic ordering: `BTreeMap` everywhere

// =============================================================================
// MODULES
// =============================================================================

pub mod formats;
pub mod graph;
pub mod ingestor;
pub mod primitives;
pub mod reflector;
pub mod session;
pub mod spec;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    ContentBody, ContentRef, ContentState, Edge, EdgeWeight, JSON_MEDIA_TYPE, LoomError, Meta,
    Node,
};

// =============================================================================
// RE-EXPORTS: Graph Engine
// =============================================================================

pub use graph::{Graph, GraphSnapshot, GraphStore};
pub use ingestor::Ingestor;
pub use reflector::Reflector;
pub use session::{ApiRoute, ReflectOutcome, Session, StorageBackend};
pub use spec::{ApiSpec, FieldSpec, ModuleHeader, ModuleSpec, ParameterSpec, TypeHeader, TypeSpec};
pub use storage::RedbGraph;

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{
    PersistenceHeader, graph_from_bytes, graph_to_bytes, snapshot_from_bytes, snapshot_to_bytes,
};
