//! # Formats
//!
//! On-disk representations of the content graph.

pub mod persistence;

pub use persistence::{
    MAX_PERSISTENCE_PAYLOAD_SIZE, PersistenceHeader, graph_from_bytes, graph_to_bytes,
    snapshot_from_bytes, snapshot_to_bytes,
};
