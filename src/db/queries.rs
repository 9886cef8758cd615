use std::collections::{HashMap, HashSet};

use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{Database, DbError};

// ---------------------------------------------------------------------------
// Row types, one flat struct per table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRow {
    pub id: String,
    pub text: String,
    pub expected_answer: String,
    pub category: String,
}

/// A question set with its ordered member ids, assembled from the join table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSetRow {
    pub id: String,
    pub name: String,
    pub question_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResultRow {
    pub id: String,
    pub set_id: String,
    pub timestamp: String,
    pub avg_score: f64,
    pub method: String,
    pub results_json: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiPresetRow {
    pub id: String,
    pub name: String,
    pub provider_name: String,
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: i64,
}

fn map_question(row: &rusqlite::Row<'_>) -> rusqlite::Result<QuestionRow> {
    Ok(QuestionRow {
        id: row.get(0)?,
        text: row.get(1)?,
        expected_answer: row.get(2)?,
        category: row.get(3)?,
    })
}

fn map_test_result(row: &rusqlite::Row<'_>) -> rusqlite::Result<TestResultRow> {
    Ok(TestResultRow {
        id: row.get(0)?,
        set_id: row.get(1)?,
        timestamp: row.get(2)?,
        avg_score: row.get(3)?,
        method: row.get(4)?,
        results_json: row.get(5)?,
    })
}

fn map_api_preset(row: &rusqlite::Row<'_>) -> rusqlite::Result<ApiPresetRow> {
    Ok(ApiPresetRow {
        id: row.get(0)?,
        name: row.get(1)?,
        provider_name: row.get(2)?,
        endpoint: row.get(3)?,
        api_key: row.get(4)?,
        model: row.get(5)?,
        temperature: row.get(6)?,
        max_tokens: row.get(7)?,
    })
}

// ---------------------------------------------------------------------------
// Question queries
// ---------------------------------------------------------------------------

pub fn list_questions(db: &Database) -> Result<Vec<QuestionRow>, DbError> {
    let conn = db.conn();
    let mut stmt = conn.prepare(
        "SELECT id, text, expected_answer, category FROM questions ORDER BY rowid ASC",
    )?;
    let rows = stmt
        .query_map([], map_question)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_question(db: &Database, id: &str) -> Result<Option<QuestionRow>, DbError> {
    let conn = db.conn();
    let row = conn
        .query_row(
            "SELECT id, text, expected_answer, category FROM questions WHERE id = ?1",
            params![id],
            map_question,
        )
        .optional()?;
    Ok(row)
}

pub fn insert_question(db: &Database, row: &QuestionRow) -> Result<(), DbError> {
    let conn = db.conn();
    conn.execute(
        "INSERT INTO questions (id, text, expected_answer, category) VALUES (?1, ?2, ?3, ?4)",
        params![row.id, row.text, row.expected_answer, row.category],
    )?;
    Ok(())
}

/// Insert `row` unless a question with the same id exists.
/// Returns whether a row was written.
pub fn insert_question_if_absent(db: &Database, row: &QuestionRow) -> Result<bool, DbError> {
    let conn = db.conn();
    let changed = conn.execute(
        "INSERT OR IGNORE INTO questions (id, text, expected_answer, category) VALUES (?1, ?2, ?3, ?4)",
        params![row.id, row.text, row.expected_answer, row.category],
    )?;
    Ok(changed == 1)
}

/// Patch the given fields of a question. Returns `false` when the id is unknown.
pub fn update_question(
    db: &Database,
    id: &str,
    text: Option<&str>,
    expected_answer: Option<&str>,
    category: Option<&str>,
) -> Result<bool, DbError> {
    let conn = db.conn();
    let changed = conn.execute(
        "UPDATE questions
         SET text = COALESCE(?1, text),
             expected_answer = COALESCE(?2, expected_answer),
             category = COALESCE(?3, category)
         WHERE id = ?4",
        params![text, expected_answer, category, id],
    )?;
    Ok(changed > 0)
}

/// Delete a question. Its set memberships go with it through the join table cascade.
pub fn delete_question(db: &Database, id: &str) -> Result<bool, DbError> {
    let conn = db.conn();
    let changed = conn.execute("DELETE FROM questions WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

// ---------------------------------------------------------------------------
// Question set queries
// ---------------------------------------------------------------------------

pub fn list_question_sets(db: &Database) -> Result<Vec<QuestionSetRow>, DbError> {
    let conn = db.conn();
    let mut stmt = conn.prepare("SELECT id, name FROM question_sets ORDER BY rowid ASC")?;
    let mut sets = stmt
        .query_map([], |row| {
            Ok(QuestionSetRow {
                id: row.get(0)?,
                name: row.get(1)?,
                question_ids: Vec::new(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT set_id, question_id FROM question_set_questions ORDER BY set_id, position ASC",
    )?;
    let mut members: HashMap<String, Vec<String>> = HashMap::new();
    let links = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
    for link in links {
        let (set_id, question_id) = link?;
        members.entry(set_id).or_default().push(question_id);
    }

    for set in &mut sets {
        if let Some(ids) = members.remove(&set.id) {
            set.question_ids = ids;
        }
    }
    Ok(sets)
}

pub fn get_question_set(db: &Database, id: &str) -> Result<Option<QuestionSetRow>, DbError> {
    let conn = db.conn();
    let Some(name) = conn
        .query_row(
            "SELECT name FROM question_sets WHERE id = ?1",
            params![id],
            |row| row.get::<_, String>(0),
        )
        .optional()?
    else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT question_id FROM question_set_questions WHERE set_id = ?1 ORDER BY position ASC",
    )?;
    let question_ids = stmt
        .query_map(params![id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;

    Ok(Some(QuestionSetRow {
        id: id.to_string(),
        name,
        question_ids,
    }))
}

pub fn question_set_name_exists(db: &Database, name: &str) -> Result<bool, DbError> {
    let conn = db.conn();
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM question_sets WHERE name = ?1 LIMIT 1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Write the ordered member list of a set inside an open transaction.
/// Unknown question ids are dropped and repeated ids keep their first position.
fn write_set_members(
    tx: &rusqlite::Transaction<'_>,
    set_id: &str,
    question_ids: &[String],
) -> Result<Vec<String>, DbError> {
    tx.execute(
        "DELETE FROM question_set_questions WHERE set_id = ?1",
        params![set_id],
    )?;

    let mut seen = HashSet::new();
    let mut stored = Vec::with_capacity(question_ids.len());
    for question_id in question_ids {
        if !seen.insert(question_id.as_str()) {
            continue;
        }
        let exists: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM questions WHERE id = ?1",
                params![question_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            tracing::warn!("dropping unknown question {question_id} from set {set_id}");
            continue;
        }
        tx.execute(
            "INSERT INTO question_set_questions (set_id, question_id, position) VALUES (?1, ?2, ?3)",
            params![set_id, question_id, stored.len() as i64],
        )?;
        stored.push(question_id.clone());
    }
    Ok(stored)
}

/// Insert a set and its members in one transaction. Returns the stored set.
pub fn insert_question_set(
    db: &Database,
    id: &str,
    name: &str,
    question_ids: &[String],
) -> Result<QuestionSetRow, DbError> {
    let mut conn = db.conn();
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO question_sets (id, name) VALUES (?1, ?2)",
        params![id, name],
    )?;
    let stored = write_set_members(&tx, id, question_ids)?;
    tx.commit()?;
    Ok(QuestionSetRow {
        id: id.to_string(),
        name: name.to_string(),
        question_ids: stored,
    })
}

pub fn update_question_set(
    db: &Database,
    id: &str,
    name: Option<&str>,
    question_ids: Option<&[String]>,
) -> Result<(), DbError> {
    let mut conn = db.conn();
    let tx = conn.transaction()?;
    let exists: Option<i64> = tx
        .query_row(
            "SELECT 1 FROM question_sets WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    if exists.is_none() {
        return Err(DbError::NotFound(format!("question set {id}")));
    }
    if let Some(name) = name {
        tx.execute(
            "UPDATE question_sets SET name = ?1 WHERE id = ?2",
            params![name, id],
        )?;
    }
    if let Some(question_ids) = question_ids {
        write_set_members(&tx, id, question_ids)?;
    }
    tx.commit()?;
    Ok(())
}

pub fn delete_question_set(db: &Database, id: &str) -> Result<bool, DbError> {
    let conn = db.conn();
    let changed = conn.execute("DELETE FROM question_sets WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

// ---------------------------------------------------------------------------
// Test result queries
// ---------------------------------------------------------------------------

pub fn list_test_results(db: &Database) -> Result<Vec<TestResultRow>, DbError> {
    let conn = db.conn();
    let mut stmt = conn.prepare(
        "SELECT id, set_id, timestamp, avg_score, method, results_json
         FROM test_results
         ORDER BY rowid ASC",
    )?;
    let rows = stmt
        .query_map([], map_test_result)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_test_result(db: &Database, id: &str) -> Result<Option<TestResultRow>, DbError> {
    let conn = db.conn();
    let row = conn
        .query_row(
            "SELECT id, set_id, timestamp, avg_score, method, results_json
             FROM test_results WHERE id = ?1",
            params![id],
            map_test_result,
        )
        .optional()?;
    Ok(row)
}

pub fn insert_test_result(db: &Database, row: &TestResultRow) -> Result<(), DbError> {
    let conn = db.conn();
    conn.execute(
        "INSERT INTO test_results (id, set_id, timestamp, avg_score, method, results_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            row.id,
            row.set_id,
            row.timestamp,
            row.avg_score,
            row.method,
            row.results_json,
        ],
    )?;
    Ok(())
}

pub fn delete_test_result(db: &Database, id: &str) -> Result<bool, DbError> {
    let conn = db.conn();
    let changed = conn.execute("DELETE FROM test_results WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

// ---------------------------------------------------------------------------
// API preset queries
// ---------------------------------------------------------------------------

pub fn list_api_presets(db: &Database) -> Result<Vec<ApiPresetRow>, DbError> {
    let conn = db.conn();
    let mut stmt = conn.prepare(
        "SELECT id, name, provider_name, endpoint, api_key, model, temperature, max_tokens
         FROM api_presets
         ORDER BY name ASC",
    )?;
    let rows = stmt
        .query_map([], map_api_preset)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_api_preset(db: &Database, id: &str) -> Result<Option<ApiPresetRow>, DbError> {
    let conn = db.conn();
    let row = conn
        .query_row(
            "SELECT id, name, provider_name, endpoint, api_key, model, temperature, max_tokens
             FROM api_presets WHERE id = ?1",
            params![id],
            map_api_preset,
        )
        .optional()?;
    Ok(row)
}

pub fn get_api_preset_by_name(db: &Database, name: &str) -> Result<Option<ApiPresetRow>, DbError> {
    let conn = db.conn();
    let row = conn
        .query_row(
            "SELECT id, name, provider_name, endpoint, api_key, model, temperature, max_tokens
             FROM api_presets WHERE name = ?1",
            params![name],
            map_api_preset,
        )
        .optional()?;
    Ok(row)
}

pub fn upsert_api_preset(db: &Database, row: &ApiPresetRow) -> Result<(), DbError> {
    let conn = db.conn();
    conn.execute(
        "INSERT INTO api_presets (id, name, provider_name, endpoint, api_key, model, temperature, max_tokens)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(id) DO UPDATE SET
             name = excluded.name,
             provider_name = excluded.provider_name,
             endpoint = excluded.endpoint,
             api_key = excluded.api_key,
             model = excluded.model,
             temperature = excluded.temperature,
             max_tokens = excluded.max_tokens",
        params![
            row.id,
            row.name,
            row.provider_name,
            row.endpoint,
            row.api_key,
            row.model,
            row.temperature,
            row.max_tokens,
        ],
    )?;
    Ok(())
}

pub fn delete_api_preset(db: &Database, id: &str) -> Result<bool, DbError> {
    let conn = db.conn();
    let changed = conn.execute("DELETE FROM api_presets WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}
