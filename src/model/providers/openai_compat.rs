use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::prompts::{evaluation_prompt, generation_prompt};
use crate::model::types::{ClientConfig, Evaluation, ModelError};
use crate::model::{AnswerGrader, AnswerModel};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const EVALUATION_KEYS: [&str; 5] = [
    "score",
    "explanation",
    "similarity",
    "correctness",
    "completeness",
];

/// Chat-completion client for any OpenAI-compatible endpoint.
pub struct OpenAiCompatClient {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ModelError> {
        let api_key = config.api_key.trim();
        if api_key.is_empty() {
            tracing::warn!("Refusing to create an API client without an API key");
            return Err(ModelError::ClientCreation("missing API key".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ModelError::ClientCreation(e.to_string()))?;

        Ok(Self {
            api_key: api_key.to_string(),
            model: config.model.clone(),
            base_url: config.effective_endpoint().trim_end_matches('/').to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        })
    }

    pub async fn complete(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ModelError> {
        self.run_chat(prompt, temperature, max_tokens, None).await
    }

    /// Ids reported by `GET {base_url}/models`.
    pub async fn list_models(&self) -> Result<Vec<String>, ModelError> {
        let endpoint = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(classify_transport_error)?;

        let text = check_status(response).await?;
        let parsed: OpenAiModelList = serde_json::from_str(&text)
            .map_err(|e| ModelError::InvalidResponse(format!("model list parse failed: {e}")))?;
        Ok(parsed.data.into_iter().map(|m| m.id).collect())
    }

    async fn run_chat(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
        response_format: Option<ResponseFormat>,
    ) -> Result<String, ModelError> {
        let endpoint = format!("{}/chat/completions", self.base_url);
        let body = OpenAiChatRequest {
            model: self.model.clone(),
            messages: vec![OpenAiRequestMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature,
            max_tokens,
            response_format,
        };

        let response = self
            .client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let text = check_status(response).await?;
        let parsed: OpenAiChatResponse = serde_json::from_str(&text)
            .map_err(|e| ModelError::InvalidResponse(format!("chat response parse failed: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();
        if content.is_empty() {
            return Err(ModelError::NoChoices);
        }
        Ok(content)
    }
}

impl AnswerModel for OpenAiCompatClient {
    fn model_id(&self) -> String {
        self.model.clone()
    }

    async fn generate_answer(&self, question: &str) -> Result<String, ModelError> {
        if question.trim().is_empty() {
            return Err(ModelError::InvalidInput("question is empty".to_string()));
        }
        self.run_chat(
            &generation_prompt(question),
            self.temperature,
            self.max_tokens,
            None,
        )
        .await
    }
}

impl AnswerGrader for OpenAiCompatClient {
    fn model_id(&self) -> String {
        self.model.clone()
    }

    async fn evaluate_answer(
        &self,
        question: &str,
        expected_answer: &str,
        actual_answer: &str,
    ) -> Result<Evaluation, ModelError> {
        let prompt = evaluation_prompt(question, expected_answer, actual_answer);
        let content = self
            .run_chat(
                &prompt,
                self.temperature,
                self.max_tokens,
                Some(ResponseFormat::json_object()),
            )
            .await?;
        parse_evaluation(&content)
    }
}

/// Parses a grading reply. Every key must be present; numeric fields accept
/// numbers or numeric strings.
pub fn parse_evaluation(content: &str) -> Result<Evaluation, ModelError> {
    let value: serde_json::Value = serde_json::from_str(content)
        .map_err(|_| ModelError::JsonDecode(content.chars().take(100).collect()))?;
    let Some(object) = value.as_object() else {
        return Err(ModelError::IncompleteEvaluation(
            "reply is not a JSON object".to_string(),
        ));
    };

    let missing: Vec<&str> = EVALUATION_KEYS
        .iter()
        .copied()
        .filter(|key| !object.contains_key(*key))
        .collect();
    if !missing.is_empty() {
        return Err(ModelError::IncompleteEvaluation(format!(
            "missing keys: {}",
            missing.join(", ")
        )));
    }

    let number = |key: &str| -> Result<f64, ModelError> {
        let parsed = match &object[key] {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| ModelError::IncompleteEvaluation(format!("`{key}` is not a number")))
    };
    let explanation = match &object["explanation"] {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    Ok(Evaluation {
        score: number("score")?,
        explanation,
        similarity: number("similarity")?,
        correctness: number("correctness")?,
        completeness: number("completeness")?,
    })
}

fn classify_transport_error(e: reqwest::Error) -> ModelError {
    if e.is_timeout() {
        ModelError::Request(format!("timeout: {e}"))
    } else if e.is_connect() {
        ModelError::Request(format!("connection failed: {e}"))
    } else {
        ModelError::Request(e.to_string())
    }
}

async fn check_status(response: reqwest::Response) -> Result<String, ModelError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ModelError::Request(e.to_string()))?;

    tracing::debug!("API response: status={}", status);

    match status.as_u16() {
        401 | 403 => Err(ModelError::Auth(format!(
            "auth failed ({status}). Check API key and account access."
        ))),
        429 => Err(ModelError::RateLimited(text)),
        _ if !status.is_success() => Err(ModelError::Status {
            status: status.as_u16(),
            body: text,
        }),
        _ => Ok(text),
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct OpenAiChatRequest {
    model: String,
    messages: Vec<OpenAiRequestMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub type_: String,
}

impl ResponseFormat {
    fn json_object() -> Self {
        Self {
            type_: "json_object".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OpenAiRequestMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiChatResponse {
    #[serde(default)]
    pub choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiChoice {
    pub message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiModelList {
    #[serde(default)]
    pub data: Vec<OpenAiModelEntry>,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiModelEntry {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client_for(server: &MockServer) -> OpenAiCompatClient {
        OpenAiCompatClient::new(&ClientConfig {
            api_key: "sk-test".to_string(),
            endpoint: Some(server.base_url()),
            model: "gpt-4o".to_string(),
            temperature: 0.7,
            max_tokens: 500,
        })
        .unwrap()
    }

    fn chat_reply(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }]
        })
    }

    #[test]
    fn test_blank_key_is_client_creation_error() {
        let err = OpenAiCompatClient::new(&ClientConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, ModelError::ClientCreation(_)));
    }

    #[test]
    fn test_custom_endpoint_falls_back_to_default() {
        let client = OpenAiCompatClient::new(&ClientConfig {
            api_key: "sk".to_string(),
            endpoint: Some("custom".to_string()),
            ..ClientConfig::default()
        })
        .unwrap();
        assert_eq!(client.base_url, "https://api.openai.com/v1");
    }

    #[tokio::test]
    async fn test_generate_answer_sends_prompt_and_trims_reply() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .header("Authorization", "Bearer sk-test")
                .body_contains("concisely and accurately: What is Rust?")
                .body_contains("\"max_tokens\":500");
            then.status(200).json_body(chat_reply("  A systems language.\n"));
        });

        let answer = client_for(&server)
            .generate_answer("What is Rust?")
            .await
            .unwrap();
        mock.assert();
        assert_eq!(answer, "A systems language.");
    }

    #[tokio::test]
    async fn test_generate_answer_rejects_blank_question() {
        let server = MockServer::start();
        let err = client_for(&server).generate_answer("   ").await.unwrap_err();
        assert!(matches!(err, ModelError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_empty_choices_is_no_choices() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(json!({"choices": []}));
        });

        let err = client_for(&server).generate_answer("q").await.unwrap_err();
        assert!(matches!(err, ModelError::NoChoices));
    }

    #[tokio::test]
    async fn test_status_classification() {
        for (code, check) in [
            (401_u16, "auth"),
            (403, "auth"),
            (429, "rate"),
            (500, "status"),
        ] {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(code).body("nope");
            });
            let err = client_for(&server).generate_answer("q").await.unwrap_err();
            match check {
                "auth" => assert!(matches!(err, ModelError::Auth(_)), "{code}: {err}"),
                "rate" => assert!(matches!(err, ModelError::RateLimited(_)), "{code}: {err}"),
                _ => assert!(
                    matches!(err, ModelError::Status { status: 500, .. }),
                    "{code}: {err}"
                ),
            }
        }
    }

    #[tokio::test]
    async fn test_evaluate_answer_requests_json_object() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .body_contains("\"response_format\":{\"type\":\"json_object\"}")
                .body_contains("\"max_tokens\":500");
            then.status(200).json_body(chat_reply(
                r#"{"score": 80, "explanation": "close", "similarity": 70, "correctness": 90, "completeness": 75}"#,
            ));
        });

        let eval = client_for(&server)
            .evaluate_answer("q", "expected", "actual")
            .await
            .unwrap();
        mock.assert();
        assert_eq!(eval.score, 80.0);
        assert_eq!(eval.explanation, "close");
        assert_eq!(eval.similarity, 70.0);
        assert_eq!(eval.correctness, 90.0);
        assert_eq!(eval.completeness, 75.0);
    }

    #[tokio::test]
    async fn test_evaluate_answer_uses_grader_sampling_settings() {
        let server = MockServer::start();
        let configured = server.mock(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .body_contains("\"temperature\":0.5")
                .body_contains("\"max_tokens\":800");
            then.status(200).json_body(chat_reply(
                r#"{"score": 60, "explanation": "configured", "similarity": 60, "correctness": 60, "completeness": 60}"#,
            ));
        });

        let grader = OpenAiCompatClient::new(&ClientConfig {
            api_key: "sk-test".to_string(),
            endpoint: Some(server.base_url()),
            model: "grader".to_string(),
            temperature: 0.5,
            max_tokens: 800,
        })
        .unwrap();
        let eval = grader.evaluate_answer("q", "expected", "actual").await.unwrap();
        configured.assert();
        assert_eq!(eval.explanation, "configured");
    }

    #[test]
    fn test_parse_evaluation_errors() {
        let err = parse_evaluation("not json at all").unwrap_err();
        assert!(matches!(err, ModelError::JsonDecode(ref s) if s == "not json at all"));
        assert!(err.to_string().contains("JSON decode error"));

        let err = parse_evaluation(r#"{"score": 50}"#).unwrap_err();
        assert!(matches!(err, ModelError::IncompleteEvaluation(_)));
        assert!(err.to_string().contains("similarity"));

        let eval = parse_evaluation(
            r#"{"score": "65", "explanation": "ok", "similarity": 60, "correctness": 70.5, "completeness": 65}"#,
        )
        .unwrap();
        assert_eq!(eval.score, 65.0);
        assert_eq!(eval.correctness, 70.5);
    }

    #[tokio::test]
    async fn test_list_models() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/models");
            then.status(200)
                .json_body(json!({"data": [{"id": "gpt-4o"}, {"id": "gpt-4"}]}));
        });
        let ids = client_for(&server).list_models().await.unwrap();
        assert_eq!(ids, vec!["gpt-4o", "gpt-4"]);
    }
}
