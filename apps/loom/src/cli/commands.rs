//! # CLI Command Implementations
//!
//! Every command opens the configured store, does its work, and saves the
//! session back when the backend needs an explicit write.

use crate::api::{self, AppState, IngestResponse};
use crate::config::{Backend, StorageConfig};
use loom_core::{
    Ingestor, LoomError, ModuleSpec, Node, Session,
    formats::{snapshot_from_bytes, snapshot_to_bytes},
    primitives::MAX_META_NODES,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a spec or node file (100 MB).
const MAX_INPUT_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum size of a snapshot file (500 MB).
const MAX_IMPORT_FILE_SIZE: u64 = 500 * 1024 * 1024;

fn validate_file_size(path: &Path, max_size: u64) -> Result<(), LoomError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| LoomError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(LoomError::IoError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve `..` and symlinks and require an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, LoomError> {
    let canonical = path.canonicalize().map_err(|e| {
        LoomError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(LoomError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Require the parent directory of an output file to exist.
fn validate_output_path(path: &Path) -> Result<PathBuf, LoomError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        LoomError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(LoomError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| LoomError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

/// Read a bounded input file after validating its path.
fn read_input(path: &Path, max_size: u64) -> Result<Vec<u8>, LoomError> {
    let validated = validate_file_path(path)?;
    validate_file_size(&validated, max_size)?;
    std::fs::read(&validated)
        .map_err(|e| LoomError::IoError(format!("Read file '{}': {}", path.display(), e)))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), LoomError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server. The file backend is saved on shutdown.
pub async fn cmd_server(storage: &StorageConfig, host: &str, port: u16) -> Result<(), LoomError> {
    let session = load_or_create_session(storage)?;

    println!("Loom Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    println!("  Backend:  {}", storage.backend);
    println!("  Database: {}", storage.database.display());
    println!();
    println!("Endpoints:");
    println!("  GET  /health              - Health check");
    println!("  GET  /status              - Graph status");
    println!("  POST /nodes               - Upsert a node");
    println!("  POST /edges               - Upsert an edge");
    println!("  POST /spec/register       - Store a module spec");
    println!("  GET  /reflect/spec/{{id}}   - Reflect a spec");
    println!("  POST /ingest/spec         - Rebuild a spec from nodes");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let state = AppState::new(session);
    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, state.clone()).await?;

    save_session(&*state.session.read().await, storage)
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusOutput<'a> {
    database: String,
    backend: &'a str,
    node_count: usize,
    edge_count: usize,
    module_count: usize,
    type_counts: std::collections::BTreeMap<String, usize>,
}

/// Show graph status.
pub fn cmd_status(storage: &StorageConfig, json_mode: bool) -> Result<(), LoomError> {
    let session = load_or_create_session(storage)?;
    let backend = storage.backend.to_string();
    let status = StatusOutput {
        database: storage.database.display().to_string(),
        backend: &backend,
        node_count: session.node_count()?,
        edge_count: session.edge_count()?,
        module_count: session.list_modules()?.len(),
        type_counts: session.type_counts()?,
    };

    if json_mode {
        return print_json(&status);
    }

    println!("Loom Graph Status");
    println!("=================");
    println!("Database: {}", status.database);
    println!("Backend:  {}", status.backend);
    println!();
    println!("Nodes:    {}", status.node_count);
    println!("Edges:    {}", status.edge_count);
    println!("Modules:  {}", status.module_count);
    if !status.type_counts.is_empty() {
        println!();
        println!("By type:");
        for (type_id, count) in &status.type_counts {
            println!("  {:<28} {}", type_id, count);
        }
    }

    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new empty database.
pub fn cmd_init(storage: &StorageConfig, force: bool) -> Result<(), LoomError> {
    let db_path = &storage.database;

    if storage.backend == Backend::Memory {
        println!("Memory backend keeps nothing on disk; nothing to initialize");
        return Ok(());
    }

    if db_path.exists() {
        if !force {
            return Err(LoomError::IoError(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(db_path)
            .map_err(|e| LoomError::IoError(format!("Remove existing database: {}", e)))?;
    }

    match storage.backend {
        Backend::Redb => {
            Session::with_redb(db_path)?;
            println!("Initialized new redb database at {}", db_path.display());
        }
        Backend::File | Backend::Memory => {
            save_session(&Session::new(), storage)?;
            println!("Initialized new snapshot file at {}", db_path.display());
        }
    }

    Ok(())
}

// =============================================================================
// REGISTER COMMAND
// =============================================================================

/// Store a module spec file as a spec-holder node.
pub fn cmd_register(storage: &StorageConfig, json_mode: bool, file: &Path) -> Result<(), LoomError> {
    let data = read_input(file, MAX_INPUT_FILE_SIZE)?;
    let spec: ModuleSpec = serde_json::from_slice(&data)
        .map_err(|e| LoomError::DeserializationError(format!("Invalid module spec: {}", e)))?;

    let mut session = load_or_create_session(storage)?;
    let node = session.register_spec(&spec)?;
    save_session(&session, storage)?;

    if json_mode {
        return print_json(&node);
    }

    println!(
        "Registered spec '{}' ({} types, {} apis)",
        node.id,
        spec.types.len(),
        spec.apis.len()
    );
    Ok(())
}

// =============================================================================
// REFLECT COMMAND
// =============================================================================

/// Reflect a stored spec. Without `--persist` the store is left untouched.
pub fn cmd_reflect(
    storage: &StorageConfig,
    json_mode: bool,
    id: &str,
    persist: bool,
) -> Result<(), LoomError> {
    let mut session = load_or_create_session(storage)?;
    let outcome = session.reflect_spec(id, persist)?;
    if persist {
        save_session(&session, storage)?;
    }

    if json_mode {
        return print_json(&serde_json::json!({
            "specId": outcome.spec_id,
            "metaNodes": outcome.meta_nodes,
        }));
    }

    println!(
        "Reflected spec '{}' into {} nodes{}",
        outcome.spec_id,
        outcome.meta_nodes.len(),
        if persist { " (stored)" } else { "" }
    );
    for node in &outcome.meta_nodes {
        println!(
            "  {:<24} {:<44} {}",
            node.type_id,
            node.id,
            node.title
        );
    }
    Ok(())
}

// =============================================================================
// INGEST COMMAND
// =============================================================================

/// Node files are either the HTTP request body or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum NodeFile {
    Wrapped {
        #[serde(rename = "metaNodes")]
        meta_nodes: Vec<Node>,
    },
    Bare(Vec<Node>),
}

impl NodeFile {
    fn into_nodes(self) -> Vec<Node> {
        match self {
            Self::Wrapped { meta_nodes } => meta_nodes,
            Self::Bare(nodes) => nodes,
        }
    }
}

/// Rebuild a module spec from a file of schema nodes. Reads no store.
pub fn cmd_ingest(json_mode: bool, file: &Path) -> Result<(), LoomError> {
    let data = read_input(file, MAX_INPUT_FILE_SIZE)?;
    let nodes = serde_json::from_slice::<NodeFile>(&data)
        .map_err(|e| LoomError::DeserializationError(format!("Invalid node file: {}", e)))?
        .into_nodes();

    if nodes.len() > MAX_META_NODES {
        return Err(LoomError::InvalidNode(format!(
            "Too many nodes: {} (maximum {})",
            nodes.len(),
            MAX_META_NODES
        )));
    }

    let node_count = nodes.len();
    let spec = Ingestor::ingest(&nodes)?;

    if json_mode {
        return print_json(&IngestResponse::success(spec, node_count));
    }

    println!(
        "Ingested module '{}' from {} nodes: {} types, {} apis",
        spec.id,
        node_count,
        spec.types.len(),
        spec.apis.len()
    );
    print_json(&spec)
}

// =============================================================================
// EXPORT / IMPORT COMMANDS
// =============================================================================

/// Write the whole graph to a snapshot file.
pub fn cmd_export(storage: &StorageConfig, output: &Path) -> Result<(), LoomError> {
    let validated_output = validate_output_path(output)?;

    let session = load_or_create_session(storage)?;
    let data = snapshot_to_bytes(&session.snapshot()?)?;

    std::fs::write(&validated_output, &data)
        .map_err(|e| LoomError::IoError(format!("Write file: {}", e)))?;

    println!("Exported {} bytes to {}", data.len(), validated_output.display());
    Ok(())
}

/// Merge a snapshot file into the configured store.
pub fn cmd_import(storage: &StorageConfig, input: &Path) -> Result<(), LoomError> {
    let data = read_input(input, MAX_IMPORT_FILE_SIZE)?;
    let snapshot = snapshot_from_bytes(&data)?;

    let mut session = load_or_create_session(storage)?;
    let (nodes, edges) = session.import_snapshot(snapshot)?;
    save_session(&session, storage)?;

    println!("Imported graph: {} nodes, {} edges", nodes, edges);
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the configured store. A missing snapshot file is an empty graph.
pub fn load_or_create_session(storage: &StorageConfig) -> Result<Session, LoomError> {
    let db_path = &storage.database;
    match storage.backend {
        Backend::Memory => Ok(Session::new()),
        Backend::Redb => Session::with_redb(db_path),
        Backend::File => {
            if !db_path.exists() {
                return Ok(Session::new());
            }
            let data = read_input(db_path, MAX_IMPORT_FILE_SIZE)?;
            let snapshot = snapshot_from_bytes(&data)?;
            let mut session = Session::new();
            session.import_snapshot(snapshot)?;
            tracing::debug!(path = %db_path.display(), "Loaded snapshot");
            Ok(session)
        }
    }
}

/// Write the session back if the backend needs it.
///
/// redb commits per operation and the memory backend never writes, so only
/// the file backend does any work here.
pub fn save_session(session: &Session, storage: &StorageConfig) -> Result<(), LoomError> {
    match storage.backend {
        Backend::Redb => Ok(()),
        Backend::Memory => {
            tracing::debug!("Memory backend: changes are discarded on exit");
            Ok(())
        }
        Backend::File => {
            let data = snapshot_to_bytes(&session.snapshot()?)?;
            std::fs::write(&storage.database, &data)
                .map_err(|e| LoomError::IoError(format!("Write db: {}", e)))?;
            tracing::debug!(
                path = %storage.database.display(),
                bytes = data.len(),
                "Saved snapshot"
            );
            Ok(())
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use loom_core::{ApiSpec, FieldSpec, TypeSpec};

    fn storage(dir: &Path, backend: Backend, name: &str) -> StorageConfig {
        StorageConfig {
            backend,
            database: dir.join(name),
        }
    }

    fn greeter() -> ModuleSpec {
        ModuleSpec {
            id: "greeter".to_string(),
            name: "Greeter".to_string(),
            version: "1.0.0".to_string(),
            types: vec![TypeSpec {
                name: "Greeting".to_string(),
                description: None,
                fields: vec![FieldSpec::new("text", "string", true)],
            }],
            apis: vec![ApiSpec {
                name: "greet".to_string(),
                verb: "GET".to_string(),
                route: "/greet".to_string(),
                description: None,
                parameters: vec![],
            }],
            ..ModuleSpec::default()
        }
    }

    #[test]
    fn file_backend_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path(), Backend::File, "graph.loom");

        let spec_path = dir.path().join("greeter.json");
        std::fs::write(&spec_path, serde_json::to_vec(&greeter()).unwrap()).unwrap();

        cmd_register(&storage, false, &spec_path).unwrap();
        cmd_reflect(&storage, false, "greeter", true).unwrap();

        let session = load_or_create_session(&storage).unwrap();
        // holder + module + type + property + api
        assert_eq!(session.node_count().unwrap(), 5);
    }

    #[test]
    fn reflect_without_persist_leaves_store_alone() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path(), Backend::File, "graph.loom");

        let mut session = Session::new();
        session.register_spec(&greeter()).unwrap();
        save_session(&session, &storage).unwrap();

        cmd_reflect(&storage, true, "greeter", false).unwrap();
        assert_eq!(load_or_create_session(&storage).unwrap().node_count().unwrap(), 1);
    }

    #[test]
    fn export_then_import_into_redb() {
        let dir = tempfile::tempdir().unwrap();
        let file = storage(dir.path(), Backend::File, "graph.loom");
        let redb = storage(dir.path(), Backend::Redb, "graph.db");

        let mut session = Session::new();
        session.register_spec(&greeter()).unwrap();
        session.reflect_spec("greeter", true).unwrap();
        save_session(&session, &file).unwrap();

        let exported = dir.path().join("export.loom");
        cmd_export(&file, &exported).unwrap();
        cmd_import(&redb, &exported).unwrap();

        let imported = load_or_create_session(&redb).unwrap();
        assert_eq!(imported.node_count().unwrap(), 5);
        assert_eq!(imported.list_modules().unwrap().len(), 2);
    }

    #[test]
    fn ingest_accepts_wrapped_and_bare_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new();
        session.register_spec(&greeter()).unwrap();
        let nodes = session.reflect_spec("greeter", false).unwrap().meta_nodes;

        let wrapped = dir.path().join("wrapped.json");
        std::fs::write(&wrapped, serde_json::to_vec(&serde_json::json!({ "metaNodes": nodes })).unwrap())
            .unwrap();
        let bare = dir.path().join("bare.json");
        std::fs::write(&bare, serde_json::to_vec(&nodes).unwrap()).unwrap();

        cmd_ingest(true, &wrapped).unwrap();
        cmd_ingest(false, &bare).unwrap();
    }

    #[test]
    fn ingest_without_module_node_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        std::fs::write(&path, "[]").unwrap();
        assert!(cmd_ingest(false, &path).is_err());
    }

    #[test]
    fn init_refuses_existing_database_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path(), Backend::File, "graph.loom");

        cmd_init(&storage, false).unwrap();
        assert!(cmd_init(&storage, false).is_err());
        cmd_init(&storage, true).unwrap();
    }

    #[test]
    fn import_rejects_foreign_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path(), Backend::Memory, "unused");
        let path = dir.path().join("foreign.bin");
        std::fs::write(&path, b"NOPE{}").unwrap();
        assert!(cmd_import(&storage, &path).is_err());
    }

    #[test]
    fn output_path_requires_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_output_path(&dir.path().join("missing").join("out.loom")).is_err());
        assert!(validate_output_path(&dir.path().join("out.loom")).is_ok());
    }
}
