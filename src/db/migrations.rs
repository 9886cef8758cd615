use rusqlite::Connection;

use super::DbError;

struct Migration {
    version: i64,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: r#"
CREATE TABLE questions (
    id               TEXT PRIMARY KEY,
    text             TEXT NOT NULL,
    expected_answer  TEXT NOT NULL,
    category         TEXT NOT NULL DEFAULT ''
);

CREATE TABLE question_sets (
    id    TEXT PRIMARY KEY,
    name  TEXT NOT NULL
);

CREATE TABLE question_set_questions (
    set_id       TEXT NOT NULL REFERENCES question_sets(id) ON DELETE CASCADE,
    question_id  TEXT NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
    position     INTEGER NOT NULL,
    PRIMARY KEY (set_id, question_id)
);

CREATE TABLE test_results (
    id            TEXT PRIMARY KEY,
    set_id        TEXT NOT NULL DEFAULT '',
    timestamp     TEXT NOT NULL,
    avg_score     REAL NOT NULL DEFAULT 0,
    method        TEXT NOT NULL DEFAULT '',
    results_json  TEXT NOT NULL
);

CREATE TABLE api_presets (
    id             TEXT PRIMARY KEY,
    name           TEXT NOT NULL UNIQUE,
    provider_name  TEXT NOT NULL DEFAULT '',
    endpoint       TEXT NOT NULL,
    api_key        TEXT NOT NULL,
    model          TEXT NOT NULL,
    temperature    REAL NOT NULL,
    max_tokens     INTEGER NOT NULL
);
"#,
    },
    Migration {
        version: 2,
        sql: r#"
CREATE INDEX idx_question_set_questions_order ON question_set_questions(set_id, position);
CREATE INDEX idx_question_set_questions_question ON question_set_questions(question_id);
CREATE INDEX idx_question_sets_name ON question_sets(name);
CREATE INDEX idx_questions_category ON questions(category);
CREATE INDEX idx_test_results_set ON test_results(set_id, timestamp);
"#,
    },
];

pub(super) fn run_migrations(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version     INTEGER PRIMARY KEY,
            applied_at  TEXT NOT NULL
        );",
    )?;

    let applied: Vec<i64> = {
        let mut stmt = conn.prepare("SELECT version FROM _migrations ORDER BY version")?;
        let result = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        result
    };

    for migration in MIGRATIONS {
        if applied.contains(&migration.version) {
            continue;
        }

        tracing::info!("applying migration v{}", migration.version);

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(migration.sql)
            .map_err(|e| DbError::Migration(format!("v{}: {e}", migration.version)))?;
        tx.execute(
            "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
            rusqlite::params![migration.version],
        )?;
        tx.commit()?;
    }

    Ok(())
}
