use tracing::debug;

use crate::controller::error::GatewayError;
use crate::database::policy::FeaturePolicy;
use crate::database::settings::TenantAiSettings;
use crate::service::app_state::AppState;

/// Loads tenant settings and the feature policy for one call, applying the
/// rejection ladder: missing configuration, unknown feature, disabled
/// feature, exhausted daily quota. Read-only; the later counter increment is
/// the ledger's job.
pub fn resolve_call_policy(
    state: &AppState,
    feature_key: &str,
) -> Result<(TenantAiSettings, FeaturePolicy), GatewayError> {
    let settings = state
        .settings_store
        .get()?
        .ok_or(GatewayError::ConfigurationMissing)?;

    let policy = state
        .policy_store
        .get(feature_key)
        .ok_or_else(|| GatewayError::FeatureNotFound(feature_key.to_string()))?;

    if !policy.enabled {
        return Err(GatewayError::FeatureDisabled(feature_key.to_string()));
    }

    if policy.max_requests_per_day > 0 && policy.requests_today >= policy.max_requests_per_day {
        debug!(
            "feature '{}' hit its daily quota ({}/{})",
            feature_key, policy.requests_today, policy.max_requests_per_day
        );
        return Err(GatewayError::QuotaExceeded {
            feature: feature_key.to_string(),
            used: policy.requests_today,
            limit: policy.max_requests_per_day,
        });
    }

    Ok((settings, policy))
}
