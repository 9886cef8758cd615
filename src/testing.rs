//! Shared helpers for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::config::AppConfig;
use crate::db::queries::{self, TestResultRow};
use crate::db::Database;
use crate::model::{AnswerGrader, AnswerModel, Evaluation, ModelError};
use crate::AppState;

/// Fresh in-memory store with a config that never reads the environment.
pub fn test_state() -> AppState {
    let db = Database::open_in_memory().expect("in-memory DB");
    let config = AppConfig::from_lookup(|key| match key {
        "QABENCH_DATA_DIR" => Some("/tmp/qabench-test".to_string()),
        _ => None,
    });
    AppState::new(Arc::new(db), config)
}

/// Stores a result row whose payload is `payload`.
pub fn insert_result(state: &AppState, id: &str, set_id: &str, payload: serde_json::Value) {
    let row = TestResultRow {
        id: id.to_string(),
        set_id: set_id.to_string(),
        timestamp: "2024-01-01 00:00:00".to_string(),
        avg_score: payload["avg_score"].as_f64().unwrap_or(0.0),
        method: "LLM".to_string(),
        results_json: payload.to_string(),
    };
    queries::insert_test_result(&state.db, &row).expect("insert result");
    state.cache.invalidate(crate::cache::EntityKind::TestResults);
}

/// Answer model replaying a fixed script, one entry per call.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, ModelError>>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<String, ModelError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
        }
    }
}

impl AnswerModel for ScriptedModel {
    fn model_id(&self) -> String {
        "scripted-gen".to_string()
    }

    async fn generate_answer(&self, _question: &str) -> Result<String, ModelError> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::InvalidResponse("script exhausted".to_string())))
    }
}

pub struct ScriptedGrader {
    replies: Mutex<VecDeque<Result<Evaluation, ModelError>>>,
}

impl ScriptedGrader {
    pub fn new(replies: Vec<Result<Evaluation, ModelError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
        }
    }
}

impl AnswerGrader for ScriptedGrader {
    fn model_id(&self) -> String {
        "scripted-eval".to_string()
    }

    async fn evaluate_answer(
        &self,
        _question: &str,
        _expected_answer: &str,
        _actual_answer: &str,
    ) -> Result<Evaluation, ModelError> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::InvalidResponse("script exhausted".to_string())))
    }
}
