//! Model types for chat-completion calls.

use serde::{Deserialize, Serialize};

use crate::db::queries::ApiPresetRow;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_TEMPERATURE: f32 = 0.0;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Connection parameters for one chat-completion client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub api_key: String,
    /// Base URL of an OpenAI-compatible API. Blank or `"custom"` means the default endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: None,
            model: default_model(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl ClientConfig {
    pub fn effective_endpoint(&self) -> &str {
        match self.endpoint.as_deref().map(str::trim) {
            Some(endpoint) if !endpoint.is_empty() && endpoint != "custom" => endpoint,
            _ => DEFAULT_ENDPOINT,
        }
    }
}

impl From<&ApiPresetRow> for ClientConfig {
    fn from(preset: &ApiPresetRow) -> Self {
        Self {
            api_key: preset.api_key.clone(),
            endpoint: Some(preset.endpoint.clone()),
            model: if preset.model.trim().is_empty() {
                default_model()
            } else {
                preset.model.clone()
            },
            temperature: preset.temperature as f32,
            max_tokens: u32::try_from(preset.max_tokens).unwrap_or(DEFAULT_MAX_TOKENS),
        }
    }
}

/// Grading of one generated answer against its expected answer.
/// Scores are nominally in `[0, 100]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub score: f64,
    #[serde(default)]
    pub explanation: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub similarity: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub correctness: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub completeness: f64,
}

/// Reads a score stored as a number or a numeric string. Anything else,
/// `null` included, reads as 0.
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or_default(),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or_default(),
        _ => 0.0,
    })
}

impl Evaluation {
    /// Zero scores carrying `explanation`, used when a question could not be graded.
    pub fn failed(explanation: impl Into<String>) -> Self {
        Self {
            explanation: explanation.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("API client not configured: {0}")]
    ClientCreation(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("auth error: {0}")]
    Auth(String),
    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid API response: no choices returned")]
    NoChoices,
    #[error("JSON decode error in model reply: {0}...")]
    JsonDecode(String),
    #[error("incomplete evaluation JSON: {0}")]
    IncompleteEvaluation(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}
