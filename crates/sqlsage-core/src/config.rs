//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Paths to all SQLSage data locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// SQLite database directory (`data/db/`).
    pub database: PathBuf,
    /// LLM configuration (`data/llm-config.json`).
    pub llm_config_file: PathBuf,
    /// Embedding model files (`data/models/`).
    pub models: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            database: root.join("db"),
            llm_config_file: root.join("llm-config.json"),
            models: root.join("models"),
            root,
        };
        paths.ensure_dirs()?;
        Ok(paths)
    }

    fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.database)?;
        std::fs::create_dir_all(&self.models)?;
        Ok(())
    }
}

/// Top-level SQLSage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlSageConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Embedding dimension (384 for all-MiniLM-L6-v2).
    pub embedding_dim: usize,
    /// Per-category retrieval limits.
    pub n_results_sql: usize,
    pub n_results_ddl: usize,
    pub n_results_documentation: usize,
    /// Timeout for LLM generation calls, in seconds.
    pub llm_timeout_secs: u64,
}

impl SqlSageConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8000);

        let n_results = env_usize("SQLSAGE_N_RESULTS", 10);

        let data_paths = DataPaths::new(data_dir)?;

        Ok(Self {
            port,
            data_paths,
            embedding_dim: 384,
            n_results_sql: env_usize("SQLSAGE_N_RESULTS_SQL", n_results),
            n_results_ddl: env_usize("SQLSAGE_N_RESULTS_DDL", n_results),
            n_results_documentation: env_usize("SQLSAGE_N_RESULTS_DOCUMENTATION", n_results),
            llm_timeout_secs: env_usize("SQLSAGE_LLM_TIMEOUT_SECS", 60) as u64,
        })
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
