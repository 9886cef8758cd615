use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::EntityKind;
use crate::db::queries::{self, ApiPresetRow};
use crate::model::types::{DEFAULT_ENDPOINT, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use crate::model::{ClientConfig, OpenAiCompatClient, ProviderKind};
use crate::{AppError, AppState};

const CONNECTION_PROMPT: &str = "Reply with the single word: ok";
const CONNECTION_MAX_TOKENS: u32 = 16;

/// User-supplied preset fields. Missing numbers fall back to the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PresetInput {
    pub name: String,
    #[serde(default)]
    pub provider_name: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionCheck {
    pub ok: bool,
    pub message: String,
}

pub fn load_presets(state: &AppState) -> Result<Arc<Vec<ApiPresetRow>>, AppError> {
    Ok(state
        .cache
        .api_presets(|| queries::list_api_presets(&state.db))?)
}

pub fn refresh_presets(state: &AppState) -> Result<Arc<Vec<ApiPresetRow>>, AppError> {
    state.cache.invalidate(EntityKind::ApiPresets);
    load_presets(state)
}

pub fn get_preset(state: &AppState, preset_id: &str) -> Result<Option<ApiPresetRow>, AppError> {
    Ok(load_presets(state)?
        .iter()
        .find(|p| p.id == preset_id)
        .cloned())
}

pub fn get_preset_by_name(state: &AppState, name: &str) -> Result<Option<ApiPresetRow>, AppError> {
    Ok(load_presets(state)?
        .iter()
        .find(|p| p.name == name)
        .cloned())
}

/// Name must be non-blank and not used by another preset. `preset_id` is the
/// preset being edited, if any.
pub fn validate_preset(
    state: &AppState,
    input: &PresetInput,
    preset_id: Option<&str>,
) -> Result<(), AppError> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("preset name cannot be empty".to_string()));
    }
    let clash = load_presets(state)?
        .iter()
        .any(|p| p.name == name && Some(p.id.as_str()) != preset_id);
    if clash {
        return Err(AppError::Validation(format!(
            "a preset named '{name}' already exists"
        )));
    }
    Ok(())
}

/// Creates a preset, or updates `preset_id` when given.
pub fn save_preset(
    state: &AppState,
    input: &PresetInput,
    preset_id: Option<&str>,
) -> Result<ApiPresetRow, AppError> {
    validate_preset(state, input, preset_id)?;

    let id = match preset_id {
        Some(id) => {
            if get_preset(state, id)?.is_none() {
                return Err(AppError::NotFound(format!("preset {id}")));
            }
            id.to_string()
        }
        None => Uuid::new_v4().to_string(),
    };

    let row = ApiPresetRow {
        id,
        name: input.name.trim().to_string(),
        provider_name: input
            .provider_name
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(ProviderKind::Custom.as_str())
            .to_string(),
        endpoint: input
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .unwrap_or(DEFAULT_ENDPOINT)
            .to_string(),
        api_key: input.api_key.trim().to_string(),
        model: input
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MODEL)
            .to_string(),
        temperature: input.temperature.unwrap_or(DEFAULT_TEMPERATURE as f64),
        max_tokens: input.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS as i64),
    };

    queries::upsert_api_preset(&state.db, &row)?;
    state.cache.invalidate(EntityKind::ApiPresets);
    tracing::info!("saved API preset '{}'", row.name);
    Ok(row)
}

pub fn delete_preset(state: &AppState, preset_id: &str) -> Result<String, AppError> {
    let preset = get_preset(state, preset_id)?
        .ok_or_else(|| AppError::NotFound(format!("preset {preset_id}")))?;
    queries::delete_api_preset(&state.db, preset_id)?;
    state.cache.invalidate(EntityKind::ApiPresets);
    Ok(preset.name)
}

/// Sends a one-line prompt with `config`. Failures are reported, not returned.
pub async fn test_connection(config: &ClientConfig) -> ConnectionCheck {
    let client = match OpenAiCompatClient::new(config) {
        Ok(client) => client,
        Err(e) => {
            return ConnectionCheck {
                ok: false,
                message: e.to_string(),
            }
        }
    };
    match client
        .complete(CONNECTION_PROMPT, config.temperature, CONNECTION_MAX_TOKENS)
        .await
    {
        Ok(reply) => ConnectionCheck {
            ok: true,
            message: format!("Connection successful: {reply}"),
        },
        Err(e) => {
            tracing::warn!("connection test against {} failed: {}", client.base_url, e);
            ConnectionCheck {
                ok: false,
                message: format!("Connection failed: {e}"),
            }
        }
    }
}
