//! CSV/JSON parsing into import records. Nothing here touches the store.

use chrono::Local;
use csv::{ReaderBuilder, StringRecord, Trim};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::db::queries::QuestionRow;
use crate::import::{FileFormat, ImportError};

pub const SET_COLUMNS: [&str; 5] = ["name", "id", "domanda", "risposta_attesa", "categoria"];
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const ID_KEYS: &[&str] = &["id"];
const TEXT_KEYS: &[&str] = &["domanda", "question"];
const ANSWER_KEYS: &[&str] = &["risposta_attesa", "expected_answer"];
const CATEGORY_KEYS: &[&str] = &["categoria", "category"];

const EMPTY_FILE: &str = "The imported file is empty or contains no valid data.";

/// A question as referenced from a set file. Id-only references have empty
/// text and answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionRef {
    pub id: String,
    pub text: String,
    pub expected_answer: String,
    pub category: String,
}

impl QuestionRef {
    pub fn id_only(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn has_details(&self) -> bool {
        !self.text.is_empty() && !self.expected_answer.is_empty()
    }
}

/// One element of a question-set file, before validation.
#[derive(Debug, Clone, PartialEq)]
pub enum SetCandidate {
    /// The element was not an object.
    NotAnObject,
    Set {
        /// `None` when missing, blank or not a string.
        name: Option<String>,
        /// `None` when `questions` is present but not a list.
        questions: Option<Vec<QuestionRef>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedResult {
    pub id: String,
    pub set_id: String,
    pub timestamp: String,
    pub results: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct CsvTable {
    headers: StringRecord,
    rows: Vec<StringRecord>,
}

impl CsvTable {
    fn read(content: &str) -> Result<Self, ImportError> {
        let mut reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(content.as_bytes());
        let headers = reader.headers()?.clone();
        let rows = reader.records().collect::<Result<Vec<_>, _>>()?;
        Ok(Self { headers, rows })
    }

    /// Index of the first header matching one of `names`, in priority order.
    fn column(&self, names: &[&str]) -> Option<usize> {
        names
            .iter()
            .find_map(|name| self.headers.iter().position(|h| h == *name))
    }

    fn cell(row: &StringRecord, index: Option<usize>) -> String {
        index
            .and_then(|i| row.get(i))
            .unwrap_or_default()
            .to_string()
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn field(object: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| object.get(*key).and_then(scalar_to_string))
        .unwrap_or_default()
}

fn has_any_key(objects: &[&Map<String, Value>], keys: &[&str]) -> bool {
    objects
        .iter()
        .any(|obj| keys.iter().any(|key| obj.contains_key(*key)))
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn now_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

// ---------------------------------------------------------------------------
// Question sets
// ---------------------------------------------------------------------------

pub fn parse_question_sets(
    format: FileFormat,
    content: &str,
) -> Result<Vec<SetCandidate>, ImportError> {
    match format {
        FileFormat::Csv => parse_question_sets_csv(content),
        FileFormat::Json => parse_question_sets_json(content),
    }
}

fn parse_question_sets_csv(content: &str) -> Result<Vec<SetCandidate>, ImportError> {
    let table = CsvTable::read(content)?;
    let name_col = table.column(&["name"]);
    let id_col = table.column(ID_KEYS);
    let text_col = table.column(TEXT_KEYS);
    let answer_col = table.column(ANSWER_KEYS);
    let category_col = table.column(CATEGORY_KEYS);

    if [name_col, id_col, text_col, answer_col, category_col]
        .iter()
        .any(Option::is_none)
    {
        return Err(ImportError::Invalid(format!(
            "The CSV file must contain the columns {}",
            SET_COLUMNS.join(", ")
        )));
    }

    let mut grouped: IndexMap<String, Vec<QuestionRef>> = IndexMap::new();
    for row in &table.rows {
        let name = CsvTable::cell(row, name_col);
        if name.is_empty() {
            continue;
        }
        grouped.entry(name).or_default().push(QuestionRef {
            id: CsvTable::cell(row, id_col),
            text: CsvTable::cell(row, text_col),
            expected_answer: CsvTable::cell(row, answer_col),
            category: CsvTable::cell(row, category_col),
        });
    }

    Ok(grouped
        .into_iter()
        .map(|(name, questions)| SetCandidate::Set {
            name: Some(name),
            questions: Some(questions),
        })
        .collect())
}

fn parse_question_sets_json(content: &str) -> Result<Vec<SetCandidate>, ImportError> {
    let data: Value = serde_json::from_str(content)?;
    let Value::Array(items) = data else {
        return Err(ImportError::Invalid(
            "Invalid JSON format. The file must contain a list (array) of sets.".to_string(),
        ));
    };

    Ok(items.iter().map(set_candidate_from_json).collect())
}

fn set_candidate_from_json(item: &Value) -> SetCandidate {
    let Value::Object(object) = item else {
        return SetCandidate::NotAnObject;
    };

    let name = match object.get("name") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    };
    let questions = match object.get("questions") {
        None => Some(Vec::new()),
        Some(Value::Array(refs)) => Some(refs.iter().map(question_ref_from_json).collect()),
        Some(_) => None,
    };

    SetCandidate::Set { name, questions }
}

fn question_ref_from_json(value: &Value) -> QuestionRef {
    match value {
        Value::Object(object) => QuestionRef {
            id: field(object, ID_KEYS),
            text: field(object, TEXT_KEYS),
            expected_answer: field(object, ANSWER_KEYS),
            category: field(object, CATEGORY_KEYS),
        },
        other => QuestionRef::id_only(scalar_to_string(other).unwrap_or_default()),
    }
}

// ---------------------------------------------------------------------------
// Questions
// ---------------------------------------------------------------------------

/// Parses a question file. Blank ids get a fresh UUID; a missing category
/// becomes the empty string.
pub fn parse_questions(format: FileFormat, content: &str) -> Result<Vec<QuestionRow>, ImportError> {
    let missing_columns = || {
        ImportError::Invalid(
            "The imported file must contain the columns 'domanda' and 'risposta_attesa'."
                .to_string(),
        )
    };

    let rows: Vec<QuestionRow> = match format {
        FileFormat::Csv => {
            let table = CsvTable::read(content)?;
            if table.rows.is_empty() {
                return Err(ImportError::Invalid(EMPTY_FILE.to_string()));
            }
            let id_col = table.column(ID_KEYS);
            let text_col = table.column(TEXT_KEYS).ok_or_else(missing_columns)?;
            let answer_col = table.column(ANSWER_KEYS).ok_or_else(missing_columns)?;
            let category_col = table.column(CATEGORY_KEYS);

            table
                .rows
                .iter()
                .map(|row| QuestionRow {
                    id: CsvTable::cell(row, id_col),
                    text: CsvTable::cell(row, Some(text_col)),
                    expected_answer: CsvTable::cell(row, Some(answer_col)),
                    category: CsvTable::cell(row, category_col),
                })
                .collect()
        }
        FileFormat::Json => {
            let data: Value = serde_json::from_str(content)?;
            let items = match data {
                Value::Array(items) => items,
                Value::Object(mut object) => match object.remove("questions") {
                    Some(Value::Array(items)) => items,
                    _ => return Err(questions_shape_error()),
                },
                _ => return Err(questions_shape_error()),
            };
            if items.is_empty() {
                return Err(ImportError::Invalid(EMPTY_FILE.to_string()));
            }

            let objects = items
                .iter()
                .map(|item| item.as_object().ok_or_else(questions_shape_error))
                .collect::<Result<Vec<_>, _>>()?;
            if !has_any_key(&objects, TEXT_KEYS) || !has_any_key(&objects, ANSWER_KEYS) {
                return Err(missing_columns());
            }

            objects
                .into_iter()
                .map(|object| QuestionRow {
                    id: field(object, ID_KEYS),
                    text: field(object, TEXT_KEYS),
                    expected_answer: field(object, ANSWER_KEYS),
                    category: field(object, CATEGORY_KEYS),
                })
                .collect()
        }
    };

    Ok(rows
        .into_iter()
        .map(|mut row| {
            if row.id.is_empty() {
                row.id = new_id();
            }
            row
        })
        .collect())
}

fn questions_shape_error() -> ImportError {
    ImportError::Invalid(
        "The JSON file must be a list of questions or contain the key 'questions'.".to_string(),
    )
}

// ---------------------------------------------------------------------------
// Test results
// ---------------------------------------------------------------------------

pub fn parse_test_results(
    format: FileFormat,
    content: &str,
) -> Result<Vec<ImportedResult>, ImportError> {
    let parsed: Vec<ImportedResult> = match format {
        FileFormat::Csv => {
            let table = CsvTable::read(content)?;
            let id_col = table.column(&["id"]);
            let set_col = table.column(&["set_id"]);
            let ts_col = table.column(&["timestamp"]);
            let results_col = table.column(&["results"]);

            table
                .rows
                .iter()
                .map(|row| ImportedResult {
                    id: CsvTable::cell(row, id_col),
                    set_id: CsvTable::cell(row, set_col),
                    timestamp: CsvTable::cell(row, ts_col),
                    results: results_from_text(&CsvTable::cell(row, results_col)),
                })
                .collect()
        }
        FileFormat::Json => {
            let data: Value = serde_json::from_str(content)?;
            let items = match data {
                Value::Array(items) => items,
                object @ Value::Object(_) => vec![object],
                _ => {
                    return Err(ImportError::Invalid(
                        "The JSON file must contain an object or a list of results.".to_string(),
                    ))
                }
            };
            items
                .iter()
                .map(|item| {
                    let object = item.as_object().ok_or_else(|| {
                        ImportError::Invalid("Every result must be a JSON object.".to_string())
                    })?;
                    let results = match object.get("results") {
                        Some(Value::Object(map)) => map.clone(),
                        Some(Value::String(text)) => results_from_text(text),
                        _ => Map::new(),
                    };
                    Ok(ImportedResult {
                        id: field(object, &["id"]),
                        set_id: field(object, &["set_id"]),
                        timestamp: field(object, &["timestamp"]),
                        results,
                    })
                })
                .collect::<Result<Vec<_>, ImportError>>()?
        }
    };

    if parsed.is_empty() {
        return Err(ImportError::Invalid(EMPTY_FILE.to_string()));
    }

    Ok(parsed
        .into_iter()
        .map(|mut result| {
            if result.id.is_empty() {
                result.id = new_id();
            }
            if result.timestamp.is_empty() {
                result.timestamp = now_timestamp();
            }
            result
        })
        .collect())
}

fn results_from_text(text: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_set_csv_groups_rows_by_name_in_order() {
        let csv = "name,id,domanda,risposta_attesa,categoria\n\
                   Geo, q1 ,Capital of Italy?,Rome,geo\n\
                   Math,m1,2+2?,4,math\n\
                   ,x,ignored,row,\n\
                   Geo,q2,Capital of France?,Paris,\n";
        let sets = parse_question_sets(FileFormat::Csv, csv).unwrap();
        assert_eq!(sets.len(), 2);

        let SetCandidate::Set { name, questions } = &sets[0] else {
            panic!("expected a set");
        };
        assert_eq!(name.as_deref(), Some("Geo"));
        let questions = questions.as_ref().unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].id, "q1");
        assert_eq!(questions[1].category, "");
    }

    #[test]
    fn test_set_csv_accepts_english_headers() {
        let csv = "name,id,question,expected_answer,category\nS,q1,Q?,A,c\n";
        let sets = parse_question_sets(FileFormat::Csv, csv).unwrap();
        let SetCandidate::Set { questions, .. } = &sets[0] else {
            panic!("expected a set");
        };
        assert_eq!(
            questions.as_ref().unwrap()[0],
            QuestionRef {
                id: "q1".to_string(),
                text: "Q?".to_string(),
                expected_answer: "A".to_string(),
                category: "c".to_string(),
            }
        );
    }

    #[test]
    fn test_set_csv_missing_column_is_rejected() {
        let err = parse_question_sets(FileFormat::Csv, "name,id,domanda\nS,q1,Q\n").unwrap_err();
        assert!(err.to_string().contains("name, id, domanda, risposta_attesa, categoria"));
    }

    #[test]
    fn test_set_json_candidates() {
        let json = r#"[
            "not a set",
            {"name": "  ", "questions": []},
            {"name": "Bad", "questions": "q1"},
            {"name": "Empty"},
            {"name": "Refs", "questions": ["q1", 7, {"id": null, "domanda": "x"}]}
        ]"#;
        let sets = parse_question_sets(FileFormat::Json, json).unwrap();
        assert_eq!(sets[0], SetCandidate::NotAnObject);
        assert_eq!(
            sets[1],
            SetCandidate::Set { name: None, questions: Some(vec![]) }
        );
        assert_eq!(
            sets[2],
            SetCandidate::Set { name: Some("Bad".to_string()), questions: None }
        );
        assert_eq!(
            sets[3],
            SetCandidate::Set { name: Some("Empty".to_string()), questions: Some(vec![]) }
        );
        let SetCandidate::Set { questions: Some(refs), .. } = &sets[4] else {
            panic!("expected refs");
        };
        assert_eq!(refs[0], QuestionRef::id_only("q1"));
        assert_eq!(refs[1], QuestionRef::id_only("7"));
        assert_eq!(refs[2].id, "");
        assert_eq!(refs[2].text, "x");
    }

    #[test]
    fn test_set_json_top_level_must_be_list() {
        assert!(matches!(
            parse_question_sets(FileFormat::Json, r#"{"name": "x"}"#),
            Err(ImportError::Invalid(_))
        ));
        assert!(matches!(
            parse_question_sets(FileFormat::Json, "{oops"),
            Err(ImportError::Json(_))
        ));
    }

    #[test]
    fn test_questions_csv_fills_ids_and_categories() {
        let csv = "question,expected_answer\nWhat is 2+2?,4\n";
        let rows = parse_questions(FileFormat::Csv, csv).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text, "What is 2+2?");
        assert_eq!(rows[0].category, "");
        assert!(Uuid::parse_str(&rows[0].id).is_ok());
    }

    #[test]
    fn test_questions_json_wrapped_and_validated() {
        let json = r#"{"questions": [{"id": 5, "domanda": "Q", "risposta_attesa": "A", "categoria": "c"}]}"#;
        let rows = parse_questions(FileFormat::Json, json).unwrap();
        assert_eq!(rows[0].id, "5");
        assert_eq!(rows[0].category, "c");

        assert!(parse_questions(FileFormat::Json, "[]").is_err());
        assert!(parse_questions(FileFormat::Json, r#"[{"domanda": "Q"}]"#).is_err());
        assert!(parse_questions(FileFormat::Csv, "domanda,risposta_attesa\n").is_err());
    }

    #[test]
    fn test_results_json_defaults() {
        let json = r#"{"set_id": "s1", "results": "{\"avg_score\": 50}"}"#;
        let results = parse_test_results(FileFormat::Json, json).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].set_id, "s1");
        assert_eq!(results[0].results.get("avg_score"), Some(&serde_json::json!(50)));
        assert!(Uuid::parse_str(&results[0].id).is_ok());
        assert!(chrono::NaiveDateTime::parse_from_str(&results[0].timestamp, TIMESTAMP_FORMAT).is_ok());
    }

    #[test]
    fn test_results_csv_with_bad_payload_gets_empty_map() {
        let csv = "id,set_id,timestamp,results\nr1,s1,2024-01-01 10:00:00,not json\n";
        let results = parse_test_results(FileFormat::Csv, csv).unwrap();
        assert_eq!(results[0].id, "r1");
        assert_eq!(results[0].timestamp, "2024-01-01 10:00:00");
        assert!(results[0].results.is_empty());
    }
}
