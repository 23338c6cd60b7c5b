//! # Storage Backends
//!
//! Disk-backed implementations of [`GraphStore`](crate::graph::GraphStore).

pub mod redb_graph;

pub use redb_graph::RedbGraph;
