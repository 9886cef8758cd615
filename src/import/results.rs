//! Merges parsed test results into the store.

use std::collections::HashSet;

use crate::db::queries::{self, TestResultRow};
use crate::db::{Database, DbError};
use crate::import::parse::ImportedResult;
use crate::import::questions::RowImportReport;

impl ImportedResult {
    /// Lifts `avg_score` and `method` out of the payload into row columns.
    pub fn to_row(&self) -> Result<TestResultRow, DbError> {
        let avg_score = self
            .results
            .get("avg_score")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        let method = self
            .results
            .get("method")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        Ok(TestResultRow {
            id: self.id.clone(),
            set_id: self.set_id.clone(),
            timestamp: self.timestamp.clone(),
            avg_score,
            method,
            results_json: serde_json::to_string(&self.results)?,
        })
    }
}

/// Inserts results whose id is not stored yet.
pub fn persist_results(
    db: &Database,
    results: &[ImportedResult],
) -> Result<RowImportReport, DbError> {
    let mut known: HashSet<String> = queries::list_test_results(db)?
        .into_iter()
        .map(|r| r.id)
        .collect();
    let mut report = RowImportReport::default();

    for result in results {
        if !known.insert(result.id.clone()) {
            report.skipped += 1;
            continue;
        }
        queries::insert_test_result(db, &result.to_row()?)?;
        report.imported += 1;
    }

    tracing::info!(
        "Test result import: {} imported, {} skipped",
        report.imported,
        report.skipped
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn imported(id: &str, payload: serde_json::Value) -> ImportedResult {
        ImportedResult {
            id: id.to_string(),
            set_id: "s1".to_string(),
            timestamp: "2024-05-01 12:00:00".to_string(),
            results: payload.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_payload_columns_and_duplicate_skip() {
        let db = Database::open_in_memory().unwrap();
        let batch = vec![
            imported("r1", json!({"avg_score": 42.5, "method": "LLM"})),
            imported("r1", json!({"avg_score": 1})),
            imported("r2", json!({})),
        ];

        let report = persist_results(&db, &batch).unwrap();
        assert_eq!(report, RowImportReport { imported: 2, skipped: 1 });

        let r1 = queries::get_test_result(&db, "r1").unwrap().unwrap();
        assert_eq!(r1.avg_score, 42.5);
        assert_eq!(r1.method, "LLM");
        let r2 = queries::get_test_result(&db, "r2").unwrap().unwrap();
        assert_eq!(r2.avg_score, 0.0);
        assert_eq!(r2.results_json, "{}");

        let again = persist_results(&db, &batch[2..]).unwrap();
        assert_eq!(again, RowImportReport { imported: 0, skipped: 1 });
    }
}
