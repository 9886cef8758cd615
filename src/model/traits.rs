//! Traits for model clients.

use crate::model::types::{Evaluation, ModelError};

/// Produces an answer for a single question.
/// Implemented by `OpenAiCompatClient`; tests substitute scripted fakes.
#[allow(async_fn_in_trait)]
pub trait AnswerModel: Send + Sync {
    fn model_id(&self) -> String;
    async fn generate_answer(&self, question: &str) -> Result<String, ModelError>;
}

/// Grades an answer against the expected one.
#[allow(async_fn_in_trait)]
pub trait AnswerGrader: Send + Sync {
    fn model_id(&self) -> String;
    async fn evaluate_answer(
        &self,
        question: &str,
        expected_answer: &str,
        actual_answer: &str,
    ) -> Result<Evaluation, ModelError>;
}
