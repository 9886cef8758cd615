//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use qabench::config::AppConfig;
use qabench::db::Database;
use qabench::AppState;

/// Empty in-memory store; configuration never touches the real environment.
pub fn fresh_state() -> AppState {
    let db = Database::open_in_memory().expect("in-memory database");
    let config = AppConfig::from_lookup(|key: &str| match key {
        "QABENCH_DATA_DIR" => Some(std::env::temp_dir().join("qabench-it").display().to_string()),
        _ => None,
    });
    AppState::new(Arc::new(db), config)
}

pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write fixture");
    path
}

/// Chat-completion body whose only choice carries `content`.
pub fn chat_reply(content: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    })
}
