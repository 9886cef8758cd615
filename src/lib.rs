//! Question-answer benchmarking backend.
//!
//! Manages questions, question sets, API presets and test results in SQLite,
//! asks an OpenAI-compatible model to answer and grade questions, and
//! aggregates the grades into run statistics.
//!
//! # Architecture
//!
//! - `commands`: Controller functions driven by the CLI
//! - `db`: Database layer with SQLite
//! - `cache`: Memoized entity lists
//! - `import`: CSV/JSON import and export
//! - `model`: LLM API client, prompts and model catalog
//! - `core`: Run payload types and statistics
//! - `config`: Environment configuration

pub mod cache;
pub mod commands;
pub mod config;
pub mod core;
pub mod db;
pub mod import;
pub mod model;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use serde::Serialize;

use cache::EntityCache;
use config::AppConfig;
use db::Database;
use import::ImportError;
use model::ModelError;

// ---------------------------------------------------------------------------
// Shared error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Upstream(#[from] ModelError),
    #[error("{0}")]
    Db(#[from] db::DbError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ImportError> for AppError {
    fn from(value: ImportError) -> Self {
        match value {
            ImportError::Io(e) => AppError::Io(e),
            other => AppError::Validation(other.to_string()),
        }
    }
}

impl Serialize for AppError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct AppState {
    pub db: Arc<Database>,
    pub cache: EntityCache,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(db: Arc<Database>, config: AppConfig) -> Self {
        Self {
            db,
            cache: EntityCache::new(),
            config,
        }
    }

    /// Opens the database named by `config`, creating its directory first.
    pub fn open(config: AppConfig) -> Result<Self, AppError> {
        let db_path = config.ensure_db_path()?;
        let db = Database::open(&db_path)?;
        tracing::info!("database opened at {}", db_path.display());
        Ok(Self::new(Arc::new(db), config))
    }
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Installs the global fmt subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config::DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
