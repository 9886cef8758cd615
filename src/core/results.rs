//! Test-run payload types.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::db::queries::TestResultRow;
use crate::model::types::lenient_f64;
use crate::model::Evaluation;

/// Outcome of one question in a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub expected_answer: String,
    #[serde(default)]
    pub actual_answer: String,
    #[serde(default)]
    pub evaluation: Evaluation,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionScore {
    pub question: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub score: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarMetrics {
    #[serde(deserialize_with = "lenient_f64")]
    pub similarity: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub correctness: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub completeness: f64,
}

/// The JSON document stored in `test_results.results_json`.
///
/// Keys this type does not know about are kept in `extra` so imported
/// payloads survive a round trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub avg_score: f64,
    #[serde(default)]
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_llm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_llm: Option<String>,
    /// Older payloads name the preset instead of the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_preset: Option<String>,
    #[serde(default)]
    pub questions: IndexMap<String, QuestionResult>,
    #[serde(default)]
    pub per_question_scores: Vec<QuestionScore>,
    #[serde(default)]
    pub radar_metrics: RadarMetrics,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RunPayload {
    /// Lenient decode: malformed payloads become the default payload.
    pub fn from_json(raw: &str) -> Self {
        match serde_json::from_str(raw) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Unreadable test result payload: {}", e);
                Self::default()
            }
        }
    }
}

/// A stored test result with its payload decoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResult {
    pub id: String,
    pub set_id: String,
    pub timestamp: String,
    pub avg_score: f64,
    pub method: String,
    pub results: RunPayload,
}

impl From<&TestResultRow> for TestResult {
    fn from(row: &TestResultRow) -> Self {
        Self {
            id: row.id.clone(),
            set_id: row.set_id.clone(),
            timestamp: row.timestamp.clone(),
            avg_score: row.avg_score,
            method: row.method.clone(),
            results: RunPayload::from_json(&row.results_json),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_payload_keeps_question_order_and_unknown_keys() {
        let raw = r#"{
            "set_name": "Geo",
            "avg_score": 50,
            "method": "LLM",
            "sample_type": "generated",
            "questions": {
                "z": {"question": "Z?", "evaluation": {"score": 10}},
                "a": {"question": "A?", "evaluation": {"score": 90}}
            }
        }"#;
        let payload = RunPayload::from_json(raw);
        let keys: Vec<&str> = payload.questions.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "a"]);
        assert_eq!(payload.questions["a"].evaluation.score, 90.0);
        assert_eq!(payload.set_name.as_deref(), Some("Geo"));
        assert_eq!(
            payload.extra.get("sample_type"),
            Some(&serde_json::json!("generated"))
        );

        let again: serde_json::Value = serde_json::to_value(&payload).unwrap();
        assert_eq!(again["sample_type"], "generated");
    }

    #[test]
    fn test_string_and_null_numbers_keep_the_payload() {
        let raw = r#"{
            "avg_score": null,
            "generation_llm": "gpt-4o",
            "questions": {
                "q1": {"question": "Q1?", "evaluation": {"score": "80", "similarity": " 70.5 ", "correctness": null}}
            },
            "per_question_scores": [{"question": "Q1?", "score": "80"}],
            "radar_metrics": {"similarity": 70.5}
        }"#;
        let payload = RunPayload::from_json(raw);
        assert_eq!(payload.avg_score, 0.0);
        assert_eq!(payload.generation_llm.as_deref(), Some("gpt-4o"));
        let eval = &payload.questions["q1"].evaluation;
        assert_eq!(eval.score, 80.0);
        assert_eq!(eval.similarity, 70.5);
        assert_eq!(eval.correctness, 0.0);
        assert_eq!(payload.per_question_scores[0].score, 80.0);
        assert_eq!(
            payload.radar_metrics,
            RadarMetrics { similarity: 70.5, correctness: 0.0, completeness: 0.0 }
        );
    }

    #[test]
    fn test_malformed_payload_falls_back_to_default() {
        assert_eq!(RunPayload::from_json("[1, 2]"), RunPayload::default());
        assert_eq!(RunPayload::from_json("nope"), RunPayload::default());
    }
}
