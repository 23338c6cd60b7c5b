//! # Configuration
//!
//! Optional `loom.toml` file with server and storage settings.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 9090
//!
//! [storage]
//! backend = "redb"      # memory | file | redb
//! database = "loom.db"
//! ```
//!
//! Precedence: CLI flags, then the config file, then built-in defaults.
//! Security middleware is configured from `LOOM_*` environment variables,
//! not from this file.

use clap::ValueEnum;
use loom_core::LoomError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "loom.toml";

/// Maximum config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// Where the graph lives between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Volatile in-memory graph, nothing is written.
    Memory,
    /// In-memory graph loaded from and saved to a snapshot file.
    File,
    /// redb database with ACID transactions.
    #[default]
    Redb,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Memory => "memory",
            Self::File => "file",
            Self::Redb => "redb",
        };
        f.write_str(name)
    }
}

// =============================================================================
// CONFIG SECTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: Backend,
    pub database: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            database: PathBuf::from("loom.db"),
        }
    }
}

/// Full configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoomConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
}

impl LoomConfig {
    /// Parse a config from TOML text. Missing keys take their defaults;
    /// unknown keys are rejected.
    pub fn from_toml(text: &str) -> Result<Self, LoomError> {
        toml::from_str(text)
            .map_err(|e| LoomError::DeserializationError(format!("Invalid config: {}", e)))
    }

    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, `loom.toml` in the working
    /// directory is used if present, else the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, LoomError> {
        let path = match path {
            Some(p) => p,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let metadata = std::fs::metadata(path).map_err(|e| {
            LoomError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(LoomError::IoError(format!(
                "Config file size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let text = std::fs::read_to_string(path).map_err(|e| {
            LoomError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        let config = Self::from_toml(&text)?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Apply storage flags given on the command line.
    #[must_use]
    pub fn with_storage_overrides(mut self, database: Option<PathBuf>, backend: Option<Backend>) -> Self {
        if let Some(database) = database {
            self.storage.database = database;
        }
        if let Some(backend) = backend {
            self.storage.backend = backend;
        }
        self
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(LoomConfig::from_toml("").unwrap(), LoomConfig::default());
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let config = LoomConfig::from_toml("[server]\nport = 9090\n").unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.storage.backend, Backend::Redb);
    }

    #[test]
    fn backend_parses_lowercase() {
        let config = LoomConfig::from_toml("[storage]\nbackend = \"file\"\ndatabase = \"g.loom\"\n").unwrap();
        assert_eq!(config.storage.backend, Backend::File);
        assert_eq!(config.storage.database, PathBuf::from("g.loom"));
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(LoomConfig::from_toml("[server]\nhots = \"x\"\n").is_err());
        assert!(LoomConfig::from_toml("[storage]\nbackend = \"sqlite\"\n").is_err());
    }

    #[test]
    fn cli_flags_override_file() {
        let config = LoomConfig::from_toml("[storage]\nbackend = \"file\"\n")
            .unwrap()
            .with_storage_overrides(Some(PathBuf::from("x.db")), Some(Backend::Memory));
        assert_eq!(config.storage.backend, Backend::Memory);
        assert_eq!(config.storage.database, PathBuf::from("x.db"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LoomConfig::load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loom.toml");
        std::fs::write(&path, "[server]\nhost = \"0.0.0.0\"\n").unwrap();
        assert_eq!(LoomConfig::load(Some(&path)).unwrap().server.host, "0.0.0.0");
    }
}
