//! Merges parsed questions into the store.

use std::collections::HashSet;

use serde::Serialize;

use crate::db::queries::{self, QuestionRow};
use crate::db::{Database, DbError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RowImportReport {
    pub imported: usize,
    pub skipped: usize,
}

/// Inserts questions whose id is not stored yet. Ids repeated within
/// `rows` are imported once.
pub fn persist_questions(db: &Database, rows: &[QuestionRow]) -> Result<RowImportReport, DbError> {
    let mut report = RowImportReport::default();
    let mut seen = HashSet::new();

    for row in rows {
        if !seen.insert(row.id.as_str()) {
            report.skipped += 1;
            continue;
        }
        if queries::insert_question_if_absent(db, row)? {
            report.imported += 1;
        } else {
            report.skipped += 1;
        }
    }

    tracing::info!(
        "Question import: {} imported, {} skipped",
        report.imported,
        report.skipped
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str) -> QuestionRow {
        QuestionRow {
            id: id.to_string(),
            text: format!("Q {id}"),
            expected_answer: "A".to_string(),
            category: String::new(),
        }
    }

    #[test]
    fn test_existing_and_repeated_ids_are_skipped() {
        let db = Database::open_in_memory().unwrap();
        queries::insert_question(&db, &row("q1")).unwrap();

        let report = persist_questions(&db, &[row("q1"), row("q2"), row("q2"), row("q3")]).unwrap();
        assert_eq!(report, RowImportReport { imported: 2, skipped: 2 });
        assert_eq!(queries::list_questions(&db).unwrap().len(), 3);
    }
}
