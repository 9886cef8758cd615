use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::cache::EntityKind;
use crate::commands::questions::{load_questions, NO_CATEGORY};
use crate::db::queries::{self, QuestionSetRow};
use crate::db::DbError;
use crate::import::question_sets::{persist_sets, SetImportReport};
use crate::import::{export, parse, read_source};
use crate::{AppError, AppState};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionDetail {
    pub id: String,
    pub text: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SetImportOutcome {
    #[serde(flatten)]
    pub report: SetImportReport,
    pub success: bool,
    pub message: String,
}

pub fn load_question_sets(state: &AppState) -> Result<Arc<Vec<QuestionSetRow>>, AppError> {
    Ok(state
        .cache
        .question_sets(|| queries::list_question_sets(&state.db))?)
}

pub fn refresh_question_sets(state: &AppState) -> Result<Arc<Vec<QuestionSetRow>>, AppError> {
    state.cache.invalidate(EntityKind::QuestionSets);
    load_question_sets(state)
}

/// Unknown question ids are dropped; the stored set is returned.
pub fn create_set(
    state: &AppState,
    name: &str,
    question_ids: &[String],
) -> Result<QuestionSetRow, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("set name cannot be empty".to_string()));
    }
    let set_id = Uuid::new_v4().to_string();
    let stored = queries::insert_question_set(&state.db, &set_id, name, question_ids)?;
    state.cache.invalidate(EntityKind::QuestionSets);
    tracing::info!("created question set '{}' with {} questions", name, stored.question_ids.len());
    Ok(stored)
}

pub fn update_set(
    state: &AppState,
    set_id: &str,
    name: Option<&str>,
    question_ids: Option<&[String]>,
) -> Result<(), AppError> {
    if matches!(name, Some(n) if n.trim().is_empty()) {
        return Err(AppError::Validation("set name cannot be empty".to_string()));
    }
    match queries::update_question_set(&state.db, set_id, name.map(str::trim), question_ids) {
        Ok(()) => {}
        Err(DbError::NotFound(_)) => return Err(AppError::NotFound(format!("question set {set_id}"))),
        Err(e) => return Err(e.into()),
    }
    state.cache.invalidate(EntityKind::QuestionSets);
    Ok(())
}

pub fn delete_set(state: &AppState, set_id: &str) -> Result<(), AppError> {
    if !queries::delete_question_set(&state.db, set_id)? {
        return Err(AppError::NotFound(format!("question set {set_id}")));
    }
    state.cache.invalidate(EntityKind::QuestionSets);
    Ok(())
}

/// Expands a set's ids into display details. Ids with no stored question get
/// empty text and the "N/A" category.
pub fn set_question_details(
    state: &AppState,
    set_id: &str,
) -> Result<Vec<QuestionDetail>, AppError> {
    let sets = load_question_sets(state)?;
    let set = sets
        .iter()
        .find(|s| s.id == set_id)
        .ok_or_else(|| AppError::NotFound(format!("question set {set_id}")))?;
    let questions = load_questions(state)?;
    let by_id: HashMap<&str, _> = questions.iter().map(|q| (q.id.as_str(), q)).collect();

    Ok(set
        .question_ids
        .iter()
        .map(|id| match by_id.get(id.as_str()) {
            Some(q) => QuestionDetail {
                id: id.clone(),
                text: q.text.clone(),
                category: if q.category.trim().is_empty() {
                    NO_CATEGORY.to_string()
                } else {
                    q.category.clone()
                },
            },
            None => QuestionDetail {
                id: id.clone(),
                text: String::new(),
                category: NO_CATEGORY.to_string(),
            },
        })
        .collect())
}

/// Parse failures are returned as errors before anything is written.
pub fn import_question_sets(state: &AppState, path: &Path) -> Result<SetImportOutcome, AppError> {
    let (format, content) = read_source(path)?;
    let candidates = parse::parse_question_sets(format, &content)?;
    let report = persist_sets(&state.db, &candidates)?;
    state.cache.invalidate(EntityKind::Questions);
    state.cache.invalidate(EntityKind::QuestionSets);

    for warning in &report.warnings {
        tracing::warn!("set import: {}", warning);
    }
    Ok(SetImportOutcome {
        success: report.success(),
        message: report.summary(),
        report,
    })
}

pub fn export_question_sets(state: &AppState, path: &Path) -> Result<usize, AppError> {
    let sets = load_question_sets(state)?;
    let questions = load_questions(state)?;
    export::export_question_sets(path, &sets, &questions)?;
    Ok(sets.len())
}
