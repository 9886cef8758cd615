//! Model catalog - fixed model lists and endpoint discovery.

use std::str::FromStr;

use crate::model::provider::ProviderKind;
use crate::model::providers::openai_compat::OpenAiCompatClient;
use crate::model::types::{ClientConfig, DEFAULT_MODEL};

pub const OPENAI_MODELS: &[&str] = &["gpt-4o", "gpt-4-turbo", "gpt-4", "gpt-3.5-turbo"];
pub const ANTHROPIC_MODELS: &[&str] = &[
    "claude-3-opus-20240229",
    "claude-3-sonnet-20240229",
    "claude-3-haiku-20240307",
];

const CHAT_TERMS: &[&str] = &["chat", "instruct", "gpt", "claude", "grok"];

fn owned(models: &[&str]) -> Vec<String> {
    models.iter().map(|m| m.to_string()).collect()
}

fn is_embedding(id: &str) -> bool {
    id.to_lowercase().contains("embed")
}

/// Keeps chat-capable ids from a `/models` listing, sorted.
///
/// Embedding models are always dropped. If no id looks like a chat model the
/// remaining non-embedding ids are returned, and if nothing is left at all the
/// default model stands in.
pub fn filter_chat_models<I>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut candidates: Vec<String> = ids.into_iter().filter(|id| !is_embedding(id)).collect();
    candidates.sort();

    let chat: Vec<String> = candidates
        .iter()
        .filter(|id| {
            let lower = id.to_lowercase();
            CHAT_TERMS.iter().any(|term| lower.contains(term)) || id.split('-').count() > 2
        })
        .cloned()
        .collect();

    if !chat.is_empty() {
        chat
    } else if !candidates.is_empty() {
        candidates
    } else {
        vec![DEFAULT_MODEL.to_string()]
    }
}

/// Models offered for a provider.
///
/// Fixed catalogs for known providers; custom endpoints are queried live.
/// Failures never surface as errors: the list is headed by a `(...)` marker
/// entry instead so a picker can still show something.
pub async fn available_models(
    provider_name: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
) -> Vec<String> {
    match ProviderKind::from_str(provider_name) {
        Ok(ProviderKind::OpenAi) => owned(OPENAI_MODELS),
        Ok(ProviderKind::Anthropic) => owned(ANTHROPIC_MODELS),
        Ok(ProviderKind::Custom) => custom_endpoint_models(endpoint, api_key).await,
        Err(_) => vec![DEFAULT_MODEL.to_string()],
    }
}

async fn custom_endpoint_models(endpoint: Option<&str>, api_key: Option<&str>) -> Vec<String> {
    let endpoint = endpoint.map(str::trim).unwrap_or_default();
    let api_key = api_key.map(str::trim).unwrap_or_default();
    if api_key.is_empty() || endpoint.is_empty() || endpoint == "custom" {
        return vec![
            "(Custom endpoint not specified)".to_string(),
            DEFAULT_MODEL.to_string(),
            "gpt-4".to_string(),
            "gpt-3.5-turbo".to_string(),
        ];
    }

    let config = ClientConfig {
        api_key: api_key.to_string(),
        endpoint: Some(endpoint.to_string()),
        ..ClientConfig::default()
    };
    let client = match OpenAiCompatClient::new(&config) {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!("Model listing: client creation failed: {}", e);
            return vec![
                "(Error creating API client)".to_string(),
                DEFAULT_MODEL.to_string(),
            ];
        }
    };

    match client.list_models().await {
        Ok(ids) => filter_chat_models(ids),
        Err(e) => {
            tracing::warn!("Model listing failed for {}: {}", endpoint, e);
            vec![
                "(Error fetching models)".to_string(),
                DEFAULT_MODEL.to_string(),
            ]
        }
    }
}
