//! # loom
//!
//! HTTP server, CLI and configuration for the Loom content graph.

pub mod api;
pub mod cli;
pub mod config;
