use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use tracing::{debug, error};

use crate::controller::error::GatewayError;
use crate::database::settings::TenantAiSettings;
use crate::proxy::ProviderKind;
use crate::proxy::router::ResolvedRequest;
use crate::service::app_state::AppState;
use crate::service::transform::anthropic::ANTHROPIC_VERSION;
use crate::service::transform::{ChatMessage, anthropic, openai};

/// Normalized result of one provider call.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Executes one completion against the resolved provider. Success is
/// normalized into `Completion`; any non-2xx status or network failure
/// becomes a `Provider` error carrying the vendor's own message when present.
pub async fn execute_completion(
    state: &AppState,
    settings: &TenantAiSettings,
    resolved: &ResolvedRequest,
    system_prompt: Option<&str>,
    messages: &[ChatMessage],
) -> Result<Completion, GatewayError> {
    let request = match resolved.provider {
        ProviderKind::Anthropic => {
            let api_key = require_api_key(resolved.provider, &settings.anthropic_api_key)?;
            let url = format!("{}/v1/messages", state.endpoints.anthropic_base_url);
            let body = anthropic::build_request(resolved, system_prompt, messages);
            debug!("calling Anthropic model {}", resolved.model);
            state
                .http_client
                .post(&url)
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
        }
        ProviderKind::OpenAi => {
            let api_key = require_api_key(resolved.provider, &settings.openai_api_key)?;
            let url = format!("{}/v1/chat/completions", state.endpoints.openai_base_url);
            let body = openai::build_request(resolved, system_prompt, messages);
            debug!("calling OpenAI model {}", resolved.model);
            state
                .http_client
                .post(&url)
                .header(AUTHORIZATION, format!("Bearer {}", api_key))
                .json(&body)
        }
    };

    let response = request.send().await.map_err(|e| {
        let message = format!("{} request failed: {}", resolved.provider.label(), e);
        error!("{}", message);
        GatewayError::Provider(message)
    })?;

    read_completion(response, resolved.provider).await
}

fn require_api_key<'a>(
    provider: ProviderKind,
    api_key: &'a str,
) -> Result<&'a str, GatewayError> {
    if api_key.is_empty() {
        return Err(GatewayError::Provider(format!(
            "{} API key is not configured",
            provider.label()
        )));
    }
    Ok(api_key)
}

async fn read_completion(
    response: reqwest::Response,
    provider: ProviderKind,
) -> Result<Completion, GatewayError> {
    let status = response.status();
    let raw_body = response.text().await.map_err(|e| {
        GatewayError::Provider(format!(
            "failed to read {} response body: {}",
            provider.label(),
            e
        ))
    })?;
    // Error bodies are not always JSON; fall back to a generic message below.
    let body: Value = serde_json::from_str(&raw_body).unwrap_or(Value::Null);

    if status.is_success() {
        let (text, input_tokens, output_tokens) = match provider {
            ProviderKind::Anthropic => anthropic::parse_response(&body),
            ProviderKind::OpenAi => openai::parse_response(&body),
        };
        return Ok(Completion {
            text,
            input_tokens,
            output_tokens,
        });
    }

    let message = body
        .pointer("/error/message")
        .and_then(Value::as_str)
        .filter(|msg| !msg.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} error: {}", provider.label(), status.as_u16()));
    error!(
        "{} call failed with status {}: {}",
        provider.label(),
        status,
        message
    );
    Err(GatewayError::Provider(message))
}
