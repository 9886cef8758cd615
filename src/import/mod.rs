//! File import and export for questions, question sets and test results.
//!
//! Parsing turns a CSV or JSON payload into plain records without touching the
//! store; the `persist_*` functions then merge those records into the store,
//! skipping duplicates and collecting warnings.

pub mod export;
pub mod parse;
pub mod question_sets;
pub mod questions;
pub mod results;

use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("unsupported file format: {0}. Use a .csv or .json file")]
    UnsupportedFormat(String),
    #[error("invalid CSV file: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid JSON file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Invalid(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Json,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Result<Self, ImportError> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "csv" => Ok(FileFormat::Csv),
            "json" => Ok(FileFormat::Json),
            other => Err(ImportError::UnsupportedFormat(format!(".{other}"))),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ImportError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ImportError::UnsupportedFormat(path.display().to_string()))?;
        Self::from_extension(ext)
    }
}

/// Reads a file and detects its format from the extension.
pub fn read_source(path: &Path) -> Result<(FileFormat, String), ImportError> {
    let format = FileFormat::from_path(path)?;
    let content = std::fs::read_to_string(path)?;
    Ok((format, content))
}
