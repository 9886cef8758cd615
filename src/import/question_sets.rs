//! Merges parsed question sets into the store.

use std::collections::HashSet;

use serde::Serialize;
use uuid::Uuid;

use crate::db::queries::{self, QuestionRow};
use crate::db::{Database, DbError};
use crate::import::parse::{QuestionRef, SetCandidate};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SetImportReport {
    pub sets_imported: usize,
    pub new_questions: usize,
    pub existing_questions: usize,
    pub warnings: Vec<String>,
}

impl SetImportReport {
    pub fn success(&self) -> bool {
        self.sets_imported > 0
    }

    /// Human-readable summary, empty when nothing was imported.
    pub fn summary(&self) -> String {
        if !self.success() {
            return String::new();
        }
        let mut parts = vec![format!("{} sets imported", self.sets_imported)];
        if self.new_questions > 0 {
            parts.push(format!("{} new questions added", self.new_questions));
        }
        if self.existing_questions > 0 {
            parts.push(format!(
                "{} existing questions referenced",
                self.existing_questions
            ));
        }
        format!("{}.", parts.join(". "))
    }
}

/// Question ids resolved for one set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub question_ids: Vec<String>,
    pub new_questions: usize,
    pub existing_questions: usize,
    pub warnings: Vec<String>,
}

/// Resolves the references of one set against `known` ids, creating questions
/// that carry full details and are not known yet.
///
/// `known` grows with every question created here, so later references in the
/// same import see them as existing.
pub fn resolve_question_ids(
    db: &Database,
    refs: &[QuestionRef],
    known: &mut HashSet<String>,
) -> Result<Resolution, DbError> {
    let mut out = Resolution::default();

    for (idx, question) in refs.iter().enumerate() {
        let position = idx + 1;
        if question.id.is_empty() {
            out.warnings
                .push(format!("Question #{position} has no ID (skipped)."));
            continue;
        }

        if known.contains(&question.id) {
            out.existing_questions += 1;
            out.question_ids.push(question.id.clone());
            continue;
        }

        if !question.has_details() {
            out.warnings.push(format!(
                "Question #{position} with ID {} not found and has no details; skipped.",
                question.id
            ));
            continue;
        }

        let row = QuestionRow {
            id: question.id.clone(),
            text: question.text.clone(),
            expected_answer: question.expected_answer.clone(),
            category: question.category.clone(),
        };
        if queries::insert_question_if_absent(db, &row)? {
            out.new_questions += 1;
        } else {
            out.existing_questions += 1;
        }
        known.insert(question.id.clone());
        out.question_ids.push(question.id.clone());
    }

    Ok(out)
}

/// Creates every valid candidate set. Problems with individual sets or
/// questions become warnings; only store failures abort the import.
pub fn persist_sets(
    db: &Database,
    candidates: &[SetCandidate],
) -> Result<SetImportReport, DbError> {
    let mut report = SetImportReport::default();
    let mut known: HashSet<String> = queries::list_questions(db)?
        .into_iter()
        .map(|q| q.id)
        .collect();

    for (idx, candidate) in candidates.iter().enumerate() {
        let position = idx + 1;
        let SetCandidate::Set { name, questions } = candidate else {
            report.warnings.push(format!(
                "Element #{position} in the list is not a valid set (skipped)."
            ));
            continue;
        };
        let Some(name) = name else {
            report.warnings.push(format!(
                "Set #{position} has a missing or invalid name (skipped)."
            ));
            continue;
        };
        let Some(refs) = questions else {
            report.warnings.push(format!(
                "Missing or invalid question data for set '{name}' (skipped)."
            ));
            continue;
        };
        if queries::question_set_name_exists(db, name)? {
            report.warnings.push(format!(
                "A set named '{name}' already exists. Skipped to avoid duplicates."
            ));
            continue;
        }

        let resolution = resolve_question_ids(db, refs, &mut known)?;
        report.warnings.extend(resolution.warnings);
        report.new_questions += resolution.new_questions;
        report.existing_questions += resolution.existing_questions;

        if resolution.question_ids.is_empty() && !refs.is_empty() {
            report.warnings.push(format!(
                "Set '{name}' was not created because it contained no valid questions."
            ));
            continue;
        }

        let set_id = Uuid::new_v4().to_string();
        match queries::insert_question_set(db, &set_id, name, &resolution.question_ids) {
            Ok(_) => report.sets_imported += 1,
            Err(e) => {
                tracing::warn!("Failed to create imported set '{}': {}", name, e);
                report
                    .warnings
                    .push(format!("Error creating set '{name}': {e}"));
            }
        }
    }

    tracing::info!(
        "Question set import: {} sets, {} new questions, {} existing, {} warnings",
        report.sets_imported,
        report.new_questions,
        report.existing_questions,
        report.warnings.len()
    );
    Ok(report)
}
