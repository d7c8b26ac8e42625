use std::sync::Arc;

use axum::{Extension, Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::controller::error::GatewayError;
use crate::database::policy::FeaturePolicy;
use crate::database::settings::TenantAiSettings;
use crate::proxy::auth::Caller;
use crate::proxy::client::{Completion, execute_completion};
use crate::proxy::logging::{self, CallScope};
use crate::proxy::policy::resolve_call_policy;
use crate::proxy::router::{CallOverrides, ResolvedRequest, resolve_request};
use crate::service::app_state::AppState;
use crate::service::transform::{ChatMessage, normalize_messages};
use crate::utils::billing::estimate_cost_eur;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequestPayload {
    pub feature_key: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub image_base64: Option<String>,
    #[serde(default)]
    pub image_media_type: Option<String>,
    #[serde(default)]
    pub override_model: Option<String>,
    #[serde(default)]
    pub override_temperature: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponsePayload {
    pub success: bool,
    pub content: String,
    pub provider: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost_eur: f64,
    pub response_time_ms: u64,
}

/// The gateway endpoint. Authorization happened in the middleware; from the
/// moment the feature policy is loaded, every outcome of this handler leaves
/// exactly one usage-ledger record behind.
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<ChatRequestPayload>,
) -> Result<Json<ChatResponsePayload>, GatewayError> {
    info!(
        "AI call from '{}' for feature '{}'",
        caller.name, payload.feature_key
    );

    // Step 1: tenant settings, feature policy, quota.
    let (settings, policy) = resolve_call_policy(&state, &payload.feature_key)?;

    // Step 2: run the call under an accounting scope.
    let mut scope = CallScope::new(&policy.feature_key);
    match run_completion(&state, &settings, &policy, &payload, &mut scope).await {
        Ok((resolved, completion, cost_eur)) => {
            let response_time_ms = scope.elapsed_ms();
            logging::record_success(
                &state,
                &scope,
                &resolved,
                &completion,
                cost_eur,
                response_time_ms,
            );
            info!(
                "feature '{}' served by {}/{} in {} ms ({} in / {} out tokens)",
                scope.feature_key,
                resolved.provider,
                resolved.model,
                response_time_ms,
                completion.input_tokens,
                completion.output_tokens
            );
            Ok(Json(ChatResponsePayload {
                success: true,
                content: completion.text,
                provider: resolved.provider.to_string(),
                model: resolved.model,
                input_tokens: completion.input_tokens,
                output_tokens: completion.output_tokens,
                cost_eur,
                response_time_ms,
            }))
        }
        Err(err) => {
            warn!(
                "AI call for feature '{}' failed: {}",
                scope.feature_key, err
            );
            logging::record_failure(&state, &scope, &err.to_string());
            Err(err)
        }
    }
}

// Everything that can fail after the policy was loaded. The scope captures
// routing progress so the failure path can attribute the ledger record.
async fn run_completion(
    state: &AppState,
    settings: &TenantAiSettings,
    policy: &FeaturePolicy,
    payload: &ChatRequestPayload,
    scope: &mut CallScope,
) -> Result<(ResolvedRequest, Completion, f64), GatewayError> {
    let overrides = CallOverrides {
        model: payload.override_model.clone(),
        temperature: payload.override_temperature,
    };
    let resolved = resolve_request(settings, policy, &overrides)?;
    scope.mark_resolved(&resolved);

    let messages = normalize_messages(
        payload.messages.clone(),
        payload.image_base64.clone(),
        payload.image_media_type.clone(),
    )?;

    let completion = execute_completion(
        state,
        settings,
        &resolved,
        payload.system_prompt.as_deref(),
        &messages,
    )
    .await?;

    let cost_eur = estimate_cost_eur(
        resolved.provider,
        &resolved.model,
        completion.input_tokens,
        completion.output_tokens,
    );

    Ok((resolved, completion, cost_eur))
}
