//! Environment-driven configuration.

use std::path::PathBuf;

use crate::model::types::{ClientConfig, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE};

pub const DEFAULT_LOG_FILTER: &str = "qabench=debug,info";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    /// Used when no preset is given for a run or connection test.
    pub default_client: ClientConfig,
}

impl AppConfig {
    /// Reads `.env` (if present) and the process environment.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let data_dir = non_empty("QABENCH_DATA_DIR")
            .map(PathBuf::from)
            .or_else(|| non_empty("HOME").map(|home| PathBuf::from(home).join(".qabench")))
            .or_else(|| non_empty("USERPROFILE").map(|home| PathBuf::from(home).join(".qabench")))
            .unwrap_or_else(|| PathBuf::from(".qabench"));
        let db_path = non_empty("QABENCH_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("qabench.db"));

        let default_client = ClientConfig {
            api_key: non_empty("OPENAI_API_KEY").unwrap_or_default(),
            endpoint: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        };

        Self {
            data_dir,
            db_path,
            default_client,
        }
    }

    /// Creates the database's parent directory and returns its path.
    pub fn ensure_db_path(&self) -> std::io::Result<PathBuf> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    std::io::Error::new(
                        e.kind(),
                        format!("failed to create data directory {}: {e}", parent.display()),
                    )
                })?;
            }
        }
        Ok(self.db_path.clone())
    }
}
