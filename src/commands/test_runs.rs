use std::collections::HashMap;

use chrono::Local;
use indexmap::IndexMap;
use serde::Serialize;
use uuid::Uuid;

use crate::cache::EntityKind;
use crate::commands::presets::get_preset_by_name;
use crate::commands::question_sets::load_question_sets;
use crate::commands::questions::load_questions;
use crate::core::results::{QuestionResult, QuestionScore, RadarMetrics, RunPayload};
use crate::core::stats::calculate_statistics;
use crate::db::queries::{self, TestResultRow};
use crate::import::parse::TIMESTAMP_FORMAT;
use crate::model::{AnswerGrader, AnswerModel, ClientConfig, Evaluation, OpenAiCompatClient};
use crate::{AppError, AppState};

pub const RUN_METHOD: &str = "LLM";
const MISSING_EXPECTED_ANSWER: &str = "Answer not available";

#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub result_id: String,
    pub avg_score: f64,
    pub results: IndexMap<String, QuestionResult>,
    pub per_question_scores: Vec<QuestionScore>,
    pub radar_metrics: RadarMetrics,
}

/// Answers and grades every question of a set, then stores the run.
///
/// Unknown or blank questions are skipped. A generation or grading failure
/// gives that question a zero evaluation carrying the error text; the run
/// goes on with the next question.
pub async fn run_test<G, E>(
    state: &AppState,
    set_id: &str,
    generator: &G,
    grader: &E,
) -> Result<RunOutcome, AppError>
where
    G: AnswerModel,
    E: AnswerGrader,
{
    let sets = load_question_sets(state)?;
    let set = sets
        .iter()
        .find(|s| s.id == set_id)
        .ok_or_else(|| AppError::NotFound(format!("question set {set_id}")))?;
    let questions = load_questions(state)?;
    let by_id: HashMap<&str, _> = questions.iter().map(|q| (q.id.as_str(), q)).collect();

    tracing::info!(
        "running test on set '{}' ({} questions) with {} / {}",
        set.name,
        set.question_ids.len(),
        generator.model_id(),
        grader.model_id()
    );

    let mut results: IndexMap<String, QuestionResult> = IndexMap::new();
    for question_id in &set.question_ids {
        let Some(question) = by_id.get(question_id.as_str()) else {
            tracing::warn!("question {} not found, skipping", question_id);
            continue;
        };
        if question.text.trim().is_empty() {
            continue;
        }
        let expected = if question.expected_answer.trim().is_empty() {
            MISSING_EXPECTED_ANSWER.to_string()
        } else {
            question.expected_answer.clone()
        };

        let (actual_answer, evaluation) = match generator.generate_answer(&question.text).await {
            Ok(answer) => {
                let evaluation = match grader
                    .evaluate_answer(&question.text, &expected, &answer)
                    .await
                {
                    Ok(evaluation) => evaluation,
                    Err(e) => {
                        tracing::warn!("grading failed for question {}: {}", question_id, e);
                        Evaluation::failed(e.to_string())
                    }
                };
                (answer, evaluation)
            }
            Err(e) => {
                tracing::warn!("generation failed for question {}: {}", question_id, e);
                let message = e.to_string();
                (message.clone(), Evaluation::failed(message))
            }
        };

        results.insert(
            question_id.clone(),
            QuestionResult {
                question: question.text.clone(),
                expected_answer: expected,
                actual_answer,
                evaluation,
            },
        );
    }

    let stats = calculate_statistics(&results);
    let payload = RunPayload {
        set_name: Some(set.name.clone()),
        avg_score: stats.avg_score,
        method: RUN_METHOD.to_string(),
        generation_llm: Some(generator.model_id()),
        evaluation_llm: Some(grader.model_id()),
        generation_preset: None,
        questions: results.clone(),
        per_question_scores: stats.per_question_scores.clone(),
        radar_metrics: stats.radar_metrics,
        extra: serde_json::Map::new(),
    };

    let result_id = Uuid::new_v4().to_string();
    let row = TestResultRow {
        id: result_id.clone(),
        set_id: set.id.clone(),
        timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
        avg_score: stats.avg_score,
        method: RUN_METHOD.to_string(),
        results_json: serde_json::to_string(&payload).map_err(crate::db::DbError::from)?,
    };
    queries::insert_test_result(&state.db, &row)?;
    state.cache.invalidate(EntityKind::TestResults);

    tracing::info!(
        "test run {} finished: {} questions, avg score {:.2}",
        result_id,
        results.len(),
        stats.avg_score
    );

    Ok(RunOutcome {
        result_id,
        avg_score: stats.avg_score,
        results,
        per_question_scores: stats.per_question_scores,
        radar_metrics: stats.radar_metrics,
    })
}

/// Client settings for a named preset, or the configured defaults when no
/// name is given.
pub fn client_config_for(state: &AppState, preset_name: Option<&str>) -> Result<ClientConfig, AppError> {
    match preset_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => get_preset_by_name(state, name)?
            .map(|preset| ClientConfig::from(&preset))
            .ok_or_else(|| AppError::NotFound(format!("preset '{name}'"))),
        None => Ok(state.config.default_client.clone()),
    }
}

/// Runs a test with clients built from the named presets.
pub async fn run_test_with_presets(
    state: &AppState,
    set_id: &str,
    generation_preset: Option<&str>,
    evaluation_preset: Option<&str>,
) -> Result<RunOutcome, AppError> {
    let generator = OpenAiCompatClient::new(&client_config_for(state, generation_preset)?)?;
    let grader = OpenAiCompatClient::new(&client_config_for(state, evaluation_preset)?)?;
    run_test(state, set_id, &generator, &grader).await
}
