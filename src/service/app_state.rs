use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use dashmap::DashMap;
use tracing::info;

use crate::config::CONFIG;
use crate::database::policy::FeaturePolicyStore;
use crate::database::settings::SettingsStore;
use crate::database::usage_log::UsageLogStore;

/// Base URLs of the outbound provider APIs. Taken from config in production;
/// tests point them at local mock servers.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub anthropic_base_url: String,
    pub openai_base_url: String,
}

impl ProviderEndpoints {
    pub fn from_config() -> Self {
        Self {
            anthropic_base_url: CONFIG.anthropic_base_url.clone(),
            openai_base_url: CONFIG.openai_base_url.clone(),
        }
    }
}

pub struct AppState {
    pub settings_store: SettingsStore,
    pub policy_store: FeaturePolicyStore,
    pub usage_log_store: UsageLogStore,
    pub http_client: reqwest::Client,
    pub endpoints: ProviderEndpoints,
    // access token -> caller name
    access_tokens: DashMap<String, String>,
}

impl AppState {
    pub fn new(endpoints: ProviderEndpoints) -> Self {
        let mut client_builder =
            reqwest::Client::builder().timeout(Duration::from_secs(CONFIG.request_timeout_secs));
        if let Some(proxy_url) = &CONFIG.proxy {
            match reqwest::Proxy::https(proxy_url) {
                Ok(proxy) => client_builder = client_builder.proxy(proxy),
                Err(e) => panic!("Invalid proxy URL '{}': {}", proxy_url, e),
            }
        }
        let http_client = client_builder
            .build()
            .expect("failed to build HTTP client");

        Self {
            settings_store: SettingsStore::new(),
            policy_store: FeaturePolicyStore::new(),
            usage_log_store: UsageLogStore::new(),
            http_client,
            endpoints,
            access_tokens: DashMap::new(),
        }
    }

    pub fn insert_access_token(&self, token: &str, name: &str) {
        self.access_tokens
            .insert(token.to_string(), name.to_string());
    }

    /// Black-box caller lookup: the platform's session layer issues the
    /// tokens, the gateway only resolves them to a caller name.
    pub fn lookup_caller(&self, token: &str) -> Option<String> {
        self.access_tokens.get(token).map(|name| name.clone())
    }
}

pub fn create_app_state() -> Arc<AppState> {
    let state = AppState::new(ProviderEndpoints::from_config());
    for entry in &CONFIG.access_tokens {
        state.insert_access_token(&entry.token, &entry.name);
    }
    info!(
        "AppState ready with {} access token(s)",
        CONFIG.access_tokens.len()
    );
    Arc::new(state)
}

pub type StateRouter = Router<Arc<AppState>>;

pub fn create_state_router() -> StateRouter {
    Router::new()
}
