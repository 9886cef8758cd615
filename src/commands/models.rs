use serde::Serialize;

use crate::commands::presets::get_preset_by_name;
use crate::model::catalog::available_models;
use crate::model::ProviderKind;
use crate::{AppError, AppState};

#[derive(Debug, Clone, Serialize)]
pub struct ProviderModels {
    pub provider: String,
    pub models: Vec<String>,
}

/// Models for a provider. Endpoint and key come from `preset_name` when given,
/// otherwise from the explicit arguments and then the configured default key.
pub async fn list_models(
    state: &AppState,
    provider_name: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
    preset_name: Option<&str>,
) -> Result<ProviderModels, AppError> {
    let preset = match preset_name {
        Some(name) => Some(
            get_preset_by_name(state, name)?
                .ok_or_else(|| AppError::NotFound(format!("preset '{name}'")))?,
        ),
        None => None,
    };
    let endpoint = preset
        .as_ref()
        .map(|p| p.endpoint.as_str())
        .or(endpoint);
    let api_key = preset
        .as_ref()
        .map(|p| p.api_key.as_str())
        .or(api_key)
        .or(Some(state.config.default_client.api_key.as_str()));

    Ok(ProviderModels {
        provider: provider_name.to_string(),
        models: available_models(provider_name, endpoint, api_key).await,
    })
}

pub fn list_providers() -> Vec<String> {
    ProviderKind::all()
        .iter()
        .map(|p| p.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_state;

    #[tokio::test]
    async fn test_fixed_provider_lists() {
        let state = test_state();
        let openai = list_models(&state, "OpenAI", None, None, None).await.unwrap();
        assert_eq!(openai.models[0], "gpt-4o");
        assert!(matches!(
            list_models(&state, "Custom", None, None, Some("missing")).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(list_providers(), vec!["OpenAI", "Anthropic", "Custom"]);
    }
}
