//! # Loom CLI Module
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `status` - Show graph status
//! - `init` - Initialize a new database
//! - `register` - Store a module spec from a JSON file
//! - `reflect` - Reflect a stored spec into schema nodes
//! - `ingest` - Rebuild a spec from a file of schema nodes
//! - `export` - Write the graph to a snapshot file
//! - `import` - Merge a snapshot file into the graph

mod commands;

use crate::config::{Backend, LoomConfig};
use clap::{Parser, Subcommand};
use loom_core::LoomError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Loom - content graph and spec reflection server
///
/// Stores content nodes in a typed graph and turns module specs into
/// schema nodes and back.
#[derive(Parser, Debug)]
#[command(name = "loom")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the graph database (overrides the config file)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend (overrides the config file)
    #[arg(short = 'B', long, global = true, value_enum)]
    pub backend: Option<Backend>,

    /// Path to a TOML config file (default: ./loom.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides the config file)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show graph status
    Status,

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Store a module spec (JSON) as a spec-holder node
    Register {
        /// Path to the spec file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Reflect a stored spec into schema nodes
    Reflect {
        /// Spec holder id or module id
        #[arg(short, long)]
        id: String,

        /// Store the generated nodes
        #[arg(long)]
        persist: bool,
    },

    /// Rebuild a module spec from a file of schema nodes
    Ingest {
        /// JSON file: `{"metaNodes": [...]}` or a bare node array
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Export graph to a snapshot file
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Merge a snapshot file into the graph
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), LoomError> {
    let config = LoomConfig::load(cli.config.as_deref())?
        .with_storage_overrides(cli.database, cli.backend);
    let storage = &config.storage;
    let json_mode = cli.json_mode;

    if cli.verbose {
        tracing::info!(
            backend = %storage.backend,
            database = %storage.database.display(),
            "Using storage"
        );
    }

    match cli.command {
        Some(Commands::Server { host, port }) => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            cmd_server(storage, &host, port).await
        }
        Some(Commands::Status) | None => cmd_status(storage, json_mode),
        Some(Commands::Init { force }) => cmd_init(storage, force),
        Some(Commands::Register { file }) => cmd_register(storage, json_mode, &file),
        Some(Commands::Reflect { id, persist }) => cmd_reflect(storage, json_mode, &id, persist),
        Some(Commands::Ingest { file }) => cmd_ingest(json_mode, &file),
        Some(Commands::Export { output }) => cmd_export(storage, &output),
        Some(Commands::Import { input }) => cmd_import(storage, &input),
    }
}

// =============================================================================
// TESTS
// =============================================================================
