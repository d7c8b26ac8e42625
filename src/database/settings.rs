use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use super::StoreError;
use crate::proxy::PROVIDER_AUTO;

pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Tenant-wide AI settings, one logical record per deployment. Edited by
/// tenant admins through the admin surface; the request pipeline only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantAiSettings {
    #[serde(default)]
    pub anthropic_enabled: bool,
    #[serde(default)]
    pub anthropic_api_key: String,
    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,
    #[serde(default)]
    pub openai_enabled: bool,
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default)]
    pub openai_model: Option<String>,
    #[serde(default = "default_preferred_provider")]
    pub preferred_provider: String,
}

fn default_anthropic_model() -> String {
    DEFAULT_ANTHROPIC_MODEL.to_string()
}

fn default_preferred_provider() -> String {
    PROVIDER_AUTO.to_string()
}

/// Holder for the singleton settings record. `None` until a tenant admin
/// has configured AI for the deployment.
#[derive(Debug, Default)]
pub struct SettingsStore {
    inner: RwLock<Option<TenantAiSettings>>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Result<Option<TenantAiSettings>, StoreError> {
        let guard = self
            .inner
            .read()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        Ok(guard.clone())
    }

    pub fn put(&self, settings: TenantAiSettings) -> Result<(), StoreError> {
        let mut guard = self
            .inner
            .write()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        *guard = Some(settings);
        Ok(())
    }
}
