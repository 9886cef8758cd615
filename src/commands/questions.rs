use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::cache::EntityKind;
use crate::commands::ImportOutcome;
use crate::db::queries::{self, QuestionRow};
use crate::import::{export, parse, questions::persist_questions, read_source};
use crate::{AppError, AppState};

pub const NO_CATEGORY: &str = "N/A";

#[derive(Debug, Clone, Serialize)]
pub struct CategoryFilter {
    pub questions: Vec<QuestionRow>,
    pub categories: Vec<String>,
}

pub fn load_questions(state: &AppState) -> Result<Arc<Vec<QuestionRow>>, AppError> {
    Ok(state
        .cache
        .questions(|| queries::list_questions(&state.db))?)
}

pub fn refresh_questions(state: &AppState) -> Result<Arc<Vec<QuestionRow>>, AppError> {
    state.cache.invalidate(EntityKind::Questions);
    load_questions(state)
}

pub fn get_question(state: &AppState, id: &str) -> Result<QuestionRow, AppError> {
    queries::get_question(&state.db, id)?
        .ok_or_else(|| AppError::NotFound(format!("question {id}")))
}

pub fn add_question(
    state: &AppState,
    text: &str,
    expected_answer: &str,
    category: Option<&str>,
    id: Option<&str>,
) -> Result<String, AppError> {
    if text.trim().is_empty() || expected_answer.trim().is_empty() {
        return Err(AppError::Validation(
            "question text and expected answer are required".to_string(),
        ));
    }
    let id = match id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => id.to_string(),
        None => Uuid::new_v4().to_string(),
    };
    let row = QuestionRow {
        id: id.clone(),
        text: text.trim().to_string(),
        expected_answer: expected_answer.trim().to_string(),
        category: category.unwrap_or_default().trim().to_string(),
    };
    if !queries::insert_question_if_absent(&state.db, &row)? {
        return Err(AppError::Conflict(format!("a question with id '{id}' already exists")));
    }
    state.cache.invalidate(EntityKind::Questions);
    Ok(id)
}

/// Returns `false` when no question has `id`.
pub fn update_question(
    state: &AppState,
    id: &str,
    text: Option<&str>,
    expected_answer: Option<&str>,
    category: Option<&str>,
) -> Result<bool, AppError> {
    let updated = queries::update_question(&state.db, id, text, expected_answer, category)?;
    state.cache.invalidate(EntityKind::Questions);
    Ok(updated)
}

/// Deletion also drops the question from every set.
pub fn delete_question(state: &AppState, id: &str) -> Result<(), AppError> {
    if !queries::delete_question(&state.db, id)? {
        return Err(AppError::NotFound(format!("question {id}")));
    }
    state.cache.invalidate(EntityKind::Questions);
    state.cache.invalidate(EntityKind::QuestionSets);
    Ok(())
}

/// Questions in `category` (all when `None` or blank), plus the sorted list of
/// every category. Blank categories are reported as "N/A".
pub fn filter_by_category(
    state: &AppState,
    category: Option<&str>,
) -> Result<CategoryFilter, AppError> {
    let all = load_questions(state)?;
    let label = |row: &QuestionRow| {
        if row.category.trim().is_empty() {
            NO_CATEGORY.to_string()
        } else {
            row.category.clone()
        }
    };

    let mut categories: Vec<String> = all.iter().map(label).collect();
    categories.sort();
    categories.dedup();

    let questions = match category.map(str::trim).filter(|c| !c.is_empty()) {
        Some(wanted) => all.iter().filter(|q| label(*q) == wanted).cloned().collect(),
        None => all.to_vec(),
    };

    Ok(CategoryFilter {
        questions,
        categories,
    })
}

pub fn import_questions(state: &AppState, path: &Path) -> Result<ImportOutcome, AppError> {
    let (format, content) = read_source(path)?;
    let rows = parse::parse_questions(format, &content)?;
    let report = persist_questions(&state.db, &rows)?;
    state.cache.invalidate(EntityKind::Questions);
    Ok(ImportOutcome {
        imported: report.imported,
        skipped: report.skipped,
        message: format!(
            "Imported {} questions ({} skipped).",
            report.imported, report.skipped
        ),
    })
}

pub fn export_questions(state: &AppState, path: &Path) -> Result<usize, AppError> {
    let questions = load_questions(state)?;
    export::export_questions(path, &questions)?;
    Ok(questions.len())
}
