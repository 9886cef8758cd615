//! Writes questions, sets and results to CSV or JSON files.
//!
//! Every layout here is accepted by the matching importer.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::db::queries::{QuestionRow, QuestionSetRow, TestResultRow};
use crate::import::{FileFormat, ImportError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: String,
    #[serde(rename = "domanda")]
    pub text: String,
    #[serde(rename = "risposta_attesa")]
    pub expected_answer: String,
    #[serde(rename = "categoria")]
    pub category: String,
}

impl From<&QuestionRow> for QuestionRecord {
    fn from(row: &QuestionRow) -> Self {
        Self {
            id: row.id.clone(),
            text: row.text.clone(),
            expected_answer: row.expected_answer.clone(),
            category: row.category.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct SetMemberRecord<'a> {
    name: &'a str,
    id: &'a str,
    domanda: &'a str,
    risposta_attesa: &'a str,
    categoria: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetRecord {
    pub id: String,
    pub name: String,
    pub questions: Vec<QuestionRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct ResultCsvRecord<'a> {
    id: &'a str,
    set_id: &'a str,
    timestamp: &'a str,
    results: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    pub id: String,
    pub set_id: String,
    pub timestamp: String,
    pub results: serde_json::Value,
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ImportError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

fn write_csv<T: Serialize>(
    path: &Path,
    headers: &[&str],
    records: impl IntoIterator<Item = T>,
) -> Result<(), ImportError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(headers)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn export_questions(path: &Path, questions: &[QuestionRow]) -> Result<(), ImportError> {
    let records: Vec<QuestionRecord> = questions.iter().map(QuestionRecord::from).collect();
    match FileFormat::from_path(path)? {
        FileFormat::Json => write_json(path, &records),
        FileFormat::Csv => write_csv(
            path,
            &["id", "domanda", "risposta_attesa", "categoria"],
            records,
        ),
    }
}

/// Expands each set's ids into question records. Ids with no stored
/// question are left out.
pub fn set_records(sets: &[QuestionSetRow], questions: &[QuestionRow]) -> Vec<SetRecord> {
    let by_id: HashMap<&str, &QuestionRow> =
        questions.iter().map(|q| (q.id.as_str(), q)).collect();
    sets.iter()
        .map(|set| SetRecord {
            id: set.id.clone(),
            name: set.name.clone(),
            questions: set
                .question_ids
                .iter()
                .filter_map(|id| by_id.get(id.as_str()))
                .map(|q| QuestionRecord::from(*q))
                .collect(),
        })
        .collect()
}

pub fn export_question_sets(
    path: &Path,
    sets: &[QuestionSetRow],
    questions: &[QuestionRow],
) -> Result<(), ImportError> {
    let records = set_records(sets, questions);
    match FileFormat::from_path(path)? {
        FileFormat::Json => write_json(path, &records),
        FileFormat::Csv => {
            let rows = records.iter().flat_map(|set| {
                set.questions.iter().map(move |q| SetMemberRecord {
                    name: &set.name,
                    id: &q.id,
                    domanda: &q.text,
                    risposta_attesa: &q.expected_answer,
                    categoria: &q.category,
                })
            });
            write_csv(
                path,
                &["name", "id", "domanda", "risposta_attesa", "categoria"],
                rows,
            )
        }
    }
}

pub fn export_results(path: &Path, results: &[TestResultRow]) -> Result<(), ImportError> {
    match FileFormat::from_path(path)? {
        FileFormat::Json => {
            let records = results
                .iter()
                .map(|r| {
                    Ok(ResultRecord {
                        id: r.id.clone(),
                        set_id: r.set_id.clone(),
                        timestamp: r.timestamp.clone(),
                        results: serde_json::from_str(&r.results_json)?,
                    })
                })
                .collect::<Result<Vec<_>, serde_json::Error>>()?;
            write_json(path, &records)
        }
        FileFormat::Csv => write_csv(
            path,
            &["id", "set_id", "timestamp", "results"],
            results.iter().map(|r| ResultCsvRecord {
                id: &r.id,
                set_id: &r.set_id,
                timestamp: &r.timestamp,
                results: &r.results_json,
            }),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::parse::{self, SetCandidate};
    use pretty_assertions::assert_eq;

    fn question(id: &str, text: &str) -> QuestionRow {
        QuestionRow {
            id: id.to_string(),
            text: text.to_string(),
            expected_answer: format!("answer, with comma {id}"),
            category: "cat".to_string(),
        }
    }

    #[test]
    fn test_questions_csv_reimports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("questions.csv");
        let rows = vec![question("q1", "First?"), question("q2", "Second \"quoted\"?")];

        export_questions(&path, &rows).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("id,domanda,risposta_attesa,categoria\n"));

        let back = parse::parse_questions(FileFormat::Csv, &content).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn test_sets_json_and_csv_reimport() {
        let dir = tempfile::tempdir().unwrap();
        let questions = vec![question("q1", "One"), question("q2", "Two")];
        let sets = vec![QuestionSetRow {
            id: "s1".to_string(),
            name: "Both".to_string(),
            question_ids: vec!["q2".to_string(), "missing".to_string(), "q1".to_string()],
        }];

        let json_path = dir.path().join("sets.json");
        export_question_sets(&json_path, &sets, &questions).unwrap();
        let json = std::fs::read_to_string(&json_path).unwrap();
        let parsed = parse::parse_question_sets(FileFormat::Json, &json).unwrap();
        let SetCandidate::Set { name, questions: Some(refs) } = &parsed[0] else {
            panic!("expected set");
        };
        assert_eq!(name.as_deref(), Some("Both"));
        let ids: Vec<&str> = refs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["q2", "q1"]);
        assert!(refs[0].has_details());

        let csv_path = dir.path().join("sets.csv");
        export_question_sets(&csv_path, &sets, &questions).unwrap();
        let csv = std::fs::read_to_string(&csv_path).unwrap();
        let parsed_csv = parse::parse_question_sets(FileFormat::Csv, &csv).unwrap();
        assert_eq!(parsed_csv, parsed);
    }

    #[test]
    fn test_results_csv_keeps_payload_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let rows = vec![TestResultRow {
            id: "r1".to_string(),
            set_id: "s1".to_string(),
            timestamp: "2024-01-01 00:00:00".to_string(),
            avg_score: 10.0,
            method: "LLM".to_string(),
            results_json: r#"{"avg_score":10.0,"method":"LLM"}"#.to_string(),
        }];

        export_results(&path, &rows).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let back = parse::parse_test_results(FileFormat::Csv, &content).unwrap();
        assert_eq!(back[0].id, "r1");
        assert_eq!(back[0].results.get("method"), Some(&serde_json::json!("LLM")));
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = export_questions(&dir.path().join("q.txt"), &[]).unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFormat(_)));
    }
}
