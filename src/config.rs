use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::MemoryError;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExocortexConfig {
    pub storage: StorageConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub identity: IdentityConfig,
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub batch_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub context_token_budget: usize,
    pub identity_results: usize,
    pub project_results: usize,
    pub conversation_results: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IdentityConfig {
    pub facts_path: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Canonical project document ingested on first start, if set.
    pub project_document: Option<String>,
}

impl Default for ExocortexConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            identity: IdentityConfig::default(),
            bootstrap: BootstrapConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_exocortex_dir()
            .join("memory.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            batch_size: 100,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            context_token_budget: 2000,
            identity_results: 3,
            project_results: 5,
            conversation_results: 5,
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        let facts_path = default_exocortex_dir()
            .join("identity_facts.json")
            .to_string_lossy()
            .into_owned();
        Self { facts_path }
    }
}

/// Returns `~/.exocortex/`
pub fn default_exocortex_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".exocortex")
}

/// Returns the default config file path: `~/.exocortex/config.toml`
pub fn default_config_path() -> PathBuf {
    default_exocortex_dir().join("config.toml")
}

impl ExocortexConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self, MemoryError> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|source| MemoryError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            toml::from_str(&contents).map_err(|source| MemoryError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            info!("no config file at {}, using defaults", path.display());
            ExocortexConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (EXOCORTEX_DB, EXOCORTEX_FACTS).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("EXOCORTEX_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("EXOCORTEX_FACTS") {
            self.identity.facts_path = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    /// Resolve the identity facts path, expanding `~` if needed.
    pub fn resolved_facts_path(&self) -> PathBuf {
        expand_tilde(&self.identity.facts_path)
    }

    /// Resolve the bootstrap project document, if one is configured.
    pub fn resolved_project_document(&self) -> Option<PathBuf> {
        self.bootstrap
            .project_document
            .as_deref()
            .map(expand_tilde)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
