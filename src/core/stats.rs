//! Aggregates per-question evaluations into run statistics.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::results::{QuestionResult, QuestionScore, RadarMetrics};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub avg_score: f64,
    pub per_question_scores: Vec<QuestionScore>,
    pub radar_metrics: RadarMetrics,
}

/// Mean score, per-question scores in map order, and the three averaged
/// sub-scores. An empty map yields zeros.
pub fn calculate_statistics(results: &IndexMap<String, QuestionResult>) -> Statistics {
    if results.is_empty() {
        return Statistics::default();
    }

    let n = results.len() as f64;
    let mut total = 0.0;
    let mut radar = RadarMetrics::default();
    let mut per_question_scores = Vec::with_capacity(results.len());

    for result in results.values() {
        let eval = &result.evaluation;
        total += eval.score;
        radar.similarity += eval.similarity;
        radar.correctness += eval.correctness;
        radar.completeness += eval.completeness;
        per_question_scores.push(QuestionScore {
            question: result.question.clone(),
            score: eval.score,
        });
    }

    Statistics {
        avg_score: total / n,
        per_question_scores,
        radar_metrics: RadarMetrics {
            similarity: radar.similarity / n,
            correctness: radar.correctness / n,
            completeness: radar.completeness / n,
        },
    }
}
