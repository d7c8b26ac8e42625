use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::controller::error::GatewayError;
use crate::database::policy::{FeaturePolicy, FeaturePolicyConfig};
use crate::database::settings::TenantAiSettings;
use crate::database::usage_log::UsageLogEntry;
use crate::proxy::{PROVIDER_AUTO, PROVIDER_GLOBAL, ProviderKind};
use crate::service::app_state::{AppState, StateRouter, create_state_router};

pub fn create_router() -> StateRouter {
    create_state_router()
        .route("/settings", get(get_settings).put(put_settings))
        .route("/features", get(list_features))
        .route("/features/reset-daily", post(reset_daily))
        .route("/features/{feature_key}", get(get_feature).put(put_feature))
        .route("/usage", get(list_usage))
}

async fn get_settings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TenantAiSettings>, GatewayError> {
    let settings = state
        .settings_store
        .get()?
        .ok_or(GatewayError::ConfigurationMissing)?;
    Ok(Json(settings))
}

async fn put_settings(
    State(state): State<Arc<AppState>>,
    Json(settings): Json<TenantAiSettings>,
) -> Result<Json<TenantAiSettings>, GatewayError> {
    validate_tenant_preference(&settings.preferred_provider)?;
    state.settings_store.put(settings.clone())?;
    info!(
        "tenant AI settings updated (preferred provider: {})",
        settings.preferred_provider
    );
    Ok(Json(settings))
}

async fn list_features(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<FeaturePolicy>>, GatewayError> {
    Ok(Json(state.policy_store.list()))
}

async fn get_feature(
    State(state): State<Arc<AppState>>,
    Path(feature_key): Path<String>,
) -> Result<Json<FeaturePolicy>, GatewayError> {
    state
        .policy_store
        .get(&feature_key)
        .map(Json)
        .ok_or_else(|| GatewayError::FeatureNotFound(feature_key))
}

async fn put_feature(
    State(state): State<Arc<AppState>>,
    Path(feature_key): Path<String>,
    Json(config): Json<FeaturePolicyConfig>,
) -> Result<Json<FeaturePolicy>, GatewayError> {
    validate_feature_preference(&config.preferred_provider)?;
    let policy = state.policy_store.upsert_config(&feature_key, config);
    info!("feature policy '{}' updated", policy.feature_key);
    Ok(Json(policy))
}

async fn reset_daily(State(state): State<Arc<AppState>>) -> Json<Value> {
    let reset = state.policy_store.reset_daily_counters();
    info!("daily request counters reset for {} features", reset);
    Json(json!({ "reset": reset }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageQuery {
    feature_key: Option<String>,
    limit: Option<usize>,
}

const DEFAULT_USAGE_LIMIT: usize = 100;

async fn list_usage(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UsageQuery>,
) -> Result<Json<Vec<UsageLogEntry>>, GatewayError> {
    let entries = state.usage_log_store.list(
        query.feature_key.as_deref(),
        query.limit.unwrap_or(DEFAULT_USAGE_LIMIT),
    )?;
    Ok(Json(entries))
}

// The tenant preference may be "auto"; a feature preference may instead defer
// with "global". Both otherwise accept a concrete provider name.
fn validate_tenant_preference(preference: &str) -> Result<(), GatewayError> {
    if preference == PROVIDER_AUTO || preference.parse::<ProviderKind>().is_ok() {
        Ok(())
    } else {
        Err(GatewayError::InvalidArgument(format!(
            "unknown preferred provider '{preference}'"
        )))
    }
}

fn validate_feature_preference(preference: &str) -> Result<(), GatewayError> {
    if preference == PROVIDER_GLOBAL || preference.parse::<ProviderKind>().is_ok() {
        Ok(())
    } else {
        Err(GatewayError::InvalidArgument(format!(
            "unknown preferred provider '{preference}'"
        )))
    }
}
