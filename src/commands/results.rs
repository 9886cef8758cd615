use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use crate::cache::EntityKind;
use crate::commands::presets::load_presets;
use crate::commands::question_sets::load_question_sets;
use crate::commands::ImportOutcome;
use crate::core::results::{RunPayload, TestResult};
use crate::db::queries::{self, TestResultRow};
use crate::import::{export, parse, read_source, results::persist_results};
use crate::{AppError, AppState};

pub const UNKNOWN_SET: &str = "Unknown set";

pub fn load_results(state: &AppState) -> Result<Arc<Vec<TestResultRow>>, AppError> {
    Ok(state
        .cache
        .test_results(|| queries::list_test_results(&state.db))?)
}

pub fn refresh_results(state: &AppState) -> Result<Arc<Vec<TestResultRow>>, AppError> {
    state.cache.invalidate(EntityKind::TestResults);
    load_results(state)
}

pub fn get_result(state: &AppState, result_id: &str) -> Result<TestResult, AppError> {
    load_results(state)?
        .iter()
        .find(|r| r.id == result_id)
        .map(TestResult::from)
        .ok_or_else(|| AppError::NotFound(format!("test result {result_id}")))
}

pub fn delete_result(state: &AppState, result_id: &str) -> Result<(), AppError> {
    if !queries::delete_test_result(&state.db, result_id)? {
        return Err(AppError::NotFound(format!("test result {result_id}")));
    }
    state.cache.invalidate(EntityKind::TestResults);
    Ok(())
}

/// Model that generated the answers of a run. Payloads that only name a
/// preset resolve through the current presets.
fn generation_model(payload: &RunPayload, preset_models: &HashMap<String, String>) -> Option<String> {
    payload
        .generation_llm
        .clone()
        .filter(|m| !m.is_empty())
        .or_else(|| {
            payload
                .generation_preset
                .as_ref()
                .and_then(|name| preset_models.get(name).cloned())
        })
}

fn preset_models(state: &AppState) -> Result<HashMap<String, String>, AppError> {
    Ok(load_presets(state)?
        .iter()
        .map(|p| (p.name.clone(), p.model.clone()))
        .collect())
}

/// Results whose set is named `set_name` and whose generation model is
/// `model`. `None` or blank filters match everything.
pub fn filter_results(
    state: &AppState,
    set_name: Option<&str>,
    model: Option<&str>,
) -> Result<Vec<TestResult>, AppError> {
    let mut results: Vec<TestResult> = load_results(state)?.iter().map(TestResult::from).collect();

    if let Some(set_name) = set_name.filter(|s| !s.trim().is_empty()) {
        let set_ids: Vec<String> = load_question_sets(state)?
            .iter()
            .filter(|s| s.name == set_name)
            .map(|s| s.id.clone())
            .collect();
        results.retain(|r| set_ids.contains(&r.set_id));
    }

    if let Some(model) = model.filter(|m| !m.trim().is_empty()) {
        let presets = preset_models(state)?;
        results.retain(|r| generation_model(&r.results, &presets).as_deref() == Some(model));
    }

    Ok(results)
}

/// Sorted names of the sets that have results.
pub fn list_set_names(state: &AppState) -> Result<Vec<String>, AppError> {
    let names: HashMap<String, String> = load_question_sets(state)?
        .iter()
        .map(|s| (s.id.clone(), s.name.clone()))
        .collect();
    let found: BTreeSet<String> = load_results(state)?
        .iter()
        .map(|r| {
            names
                .get(&r.set_id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_SET.to_string())
        })
        .collect();
    Ok(found.into_iter().collect())
}

/// Sorted generation models found in the results.
pub fn list_model_names(state: &AppState) -> Result<Vec<String>, AppError> {
    let presets = preset_models(state)?;
    let found: BTreeSet<String> = load_results(state)?
        .iter()
        .filter_map(|r| generation_model(&RunPayload::from_json(&r.results_json), &presets))
        .collect();
    Ok(found.into_iter().collect())
}

pub fn import_results(state: &AppState, path: &Path) -> Result<ImportOutcome, AppError> {
    let (format, content) = read_source(path)?;
    let parsed = parse::parse_test_results(format, &content)?;
    let report = persist_results(&state.db, &parsed)?;
    state.cache.invalidate(EntityKind::TestResults);
    Ok(ImportOutcome {
        imported: report.imported,
        skipped: report.skipped,
        message: format!("Imported {} results.", report.imported),
    })
}

pub fn export_results(state: &AppState, path: &Path) -> Result<usize, AppError> {
    let results = load_results(state)?;
    export::export_results(path, &results)?;
    Ok(results.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::presets::{save_preset, PresetInput};
    use crate::commands::question_sets::create_set;
    use crate::testing::{insert_result, test_state};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_filters_by_set_and_model_with_preset_fallback() {
        let state = test_state();
        let geo = create_set(&state, "Geo", &[]).unwrap();
        let math = create_set(&state, "Math", &[]).unwrap();
        save_preset(
            &state,
            &PresetInput {
                name: "presetA".to_string(),
                model: Some("gpt-4".to_string()),
                ..PresetInput::default()
            },
            None,
        )
        .unwrap();

        insert_result(&state, "r1", &geo.id, json!({"generation_llm": "gpt-3.5"}));
        insert_result(&state, "r2", &geo.id, json!({"generation_preset": "presetA"}));
        insert_result(&state, "r3", &math.id, json!({"generation_llm": "gpt-4"}));
        insert_result(&state, "r4", "deleted-set", json!({}));

        let geo_only = filter_results(&state, Some("Geo"), None).unwrap();
        assert_eq!(geo_only.len(), 2);

        let gpt4: Vec<String> = filter_results(&state, None, Some("gpt-4"))
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(gpt4, vec!["r2", "r3"]);

        let both = filter_results(&state, Some("Geo"), Some("gpt-4")).unwrap();
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].id, "r2");

        assert_eq!(filter_results(&state, None, None).unwrap().len(), 4);
        assert_eq!(
            list_set_names(&state).unwrap(),
            vec!["Geo", "Math", "Unknown set"]
        );
        assert_eq!(list_model_names(&state).unwrap(), vec!["gpt-3.5", "gpt-4"]);
    }

    #[test]
    fn test_string_scores_do_not_hide_the_run() {
        let state = test_state();
        insert_result(
            &state,
            "r1",
            "s1",
            json!({
                "avg_score": "80",
                "generation_llm": "gpt-4o",
                "questions": {"q1": {"question": "Q1", "evaluation": {"score": "80"}}}
            }),
        );

        let result = get_result(&state, "r1").unwrap();
        assert_eq!(result.results.questions.len(), 1);
        assert_eq!(result.results.avg_score, 80.0);
        assert_eq!(result.results.questions["q1"].evaluation.score, 80.0);
        assert_eq!(list_model_names(&state).unwrap(), vec!["gpt-4o"]);
        assert_eq!(filter_results(&state, None, Some("gpt-4o")).unwrap().len(), 1);
    }

    #[test]
    fn test_import_skips_duplicates_and_export_round_trips() {
        let state = test_state();
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("results.json");
        std::fs::write(
            &src,
            r#"[{"id": "r1", "set_id": "s1", "timestamp": "2024-01-01 09:00:00",
                 "results": {"avg_score": 75.0, "method": "LLM", "questions": {}}}]"#,
        )
        .unwrap();

        let first = import_results(&state, &src).unwrap();
        assert_eq!(first.message, "Imported 1 results.");
        let second = import_results(&state, &src).unwrap();
        assert_eq!((second.imported, second.skipped), (0, 1));

        let result = get_result(&state, "r1").unwrap();
        assert_eq!(result.avg_score, 75.0);
        assert_eq!(result.results.method, "LLM");

        let out = dir.path().join("out.csv");
        assert_eq!(export_results(&state, &out).unwrap(), 1);
        let fresh = test_state();
        assert_eq!(import_results(&fresh, &out).unwrap().imported, 1);
        assert_eq!(get_result(&fresh, "r1").unwrap().results.avg_score, 75.0);

        delete_result(&state, "r1").unwrap();
        assert!(matches!(get_result(&state, "r1"), Err(AppError::NotFound(_))));
    }
}
