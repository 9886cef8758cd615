//! Controller functions. Each takes the shared [`AppState`](crate::AppState),
//! writes through `db::queries`, and invalidates the affected cache slots.

pub mod models;
pub mod presets;
pub mod question_sets;
pub mod questions;
pub mod results;
pub mod test_runs;

use serde::Serialize;

/// Outcome of a row-level import (questions or test results).
#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub imported: usize,
    pub skipped: usize,
    pub message: String,
}
