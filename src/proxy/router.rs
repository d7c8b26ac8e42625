use std::str::FromStr;

use crate::controller::error::GatewayError;
use crate::database::policy::FeaturePolicy;
use crate::database::settings::TenantAiSettings;
use crate::proxy::{PROVIDER_AUTO, PROVIDER_GLOBAL, ProviderKind};

pub const DEFAULT_TEMPERATURE: f64 = 0.3;
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
/// Baseline model for OpenAI when the tenant configured none.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// The effective parameters of one call. Assembled exactly once, then passed
/// by value to the adapter, the client and the ledger so all of them account
/// against the same tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRequest {
    pub provider: ProviderKind,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Per-call overrides from the inbound request body.
#[derive(Debug, Clone, Default)]
pub struct CallOverrides {
    pub model: Option<String>,
    pub temperature: Option<f64>,
}

fn provider_has_credentials(settings: &TenantAiSettings, provider: ProviderKind) -> bool {
    match provider {
        ProviderKind::Anthropic => {
            settings.anthropic_enabled && !settings.anthropic_api_key.is_empty()
        }
        ProviderKind::OpenAi => settings.openai_enabled && !settings.openai_api_key.is_empty(),
    }
}

fn pick_available_provider(settings: &TenantAiSettings) -> Result<ProviderKind, GatewayError> {
    [ProviderKind::Anthropic, ProviderKind::OpenAi]
        .into_iter()
        .find(|provider| provider_has_credentials(settings, *provider))
        .ok_or(GatewayError::NoProviderAvailable)
}

/// Resolves `(provider, model, temperature, max_tokens)` for one call.
///
/// Provider precedence: feature preference unless it is `"global"`, then the
/// tenant preference; `"auto"` picks the first enabled provider with a key,
/// Anthropic before OpenAI. Model precedence: per-call override, feature
/// preference, tenant default. Pure; deterministic for identical inputs.
pub fn resolve_request(
    settings: &TenantAiSettings,
    policy: &FeaturePolicy,
    overrides: &CallOverrides,
) -> Result<ResolvedRequest, GatewayError> {
    let preference = if policy.preferred_provider == PROVIDER_GLOBAL {
        settings.preferred_provider.as_str()
    } else {
        policy.preferred_provider.as_str()
    };

    let provider = if preference == PROVIDER_AUTO {
        pick_available_provider(settings)?
    } else {
        ProviderKind::from_str(preference).map_err(|_| {
            GatewayError::Unexpected(format!("unknown provider preference '{}'", preference))
        })?
    };

    let model = overrides
        .model
        .clone()
        .filter(|m| !m.is_empty())
        .or_else(|| policy.preferred_model.clone().filter(|m| !m.is_empty()))
        .unwrap_or_else(|| match provider {
            ProviderKind::Anthropic => settings.anthropic_model.clone(),
            ProviderKind::OpenAi => settings
                .openai_model
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
        });

    let temperature = overrides
        .temperature
        .or(policy.temperature)
        .unwrap_or(DEFAULT_TEMPERATURE);

    let max_tokens = policy
        .max_tokens_per_request
        .filter(|&limit| limit > 0)
        .unwrap_or(DEFAULT_MAX_TOKENS);

    Ok(ResolvedRequest {
        provider,
        model,
        temperature,
        max_tokens,
    })
}
