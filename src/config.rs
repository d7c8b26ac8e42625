use std::{fs, path::Path};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// One inbound access token, issued to a platform component (web app,
/// background workers). The gateway only checks membership; session
/// issuance lives elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenEntry {
    pub token: String,
    pub name: String,
}

// Used for deserializing user-provided config files where all fields are optional.
#[derive(Debug, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub base_path: Option<String>,
    pub proxy: Option<String>,
    pub log_level: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub anthropic_base_url: Option<String>,
    pub openai_base_url: Option<String>,
    pub access_tokens: Option<Vec<AccessTokenEntry>>,
}

impl PartialConfig {
    /// Merges the fields of this partial config into a final config, overwriting existing values.
    fn merge_into(self, final_config: &mut FinalConfig) {
        if let Some(host) = self.host {
            final_config.host = host;
        }
        if let Some(port) = self.port {
            final_config.port = port;
        }
        if let Some(base_path) = self.base_path {
            final_config.base_path = base_path;
        }
        if let Some(proxy) = self.proxy {
            final_config.proxy = Some(proxy);
        }
        if let Some(log_level) = self.log_level {
            final_config.log_level = log_level;
        }
        if let Some(request_timeout_secs) = self.request_timeout_secs {
            final_config.request_timeout_secs = request_timeout_secs;
        }
        if let Some(anthropic_base_url) = self.anthropic_base_url {
            final_config.anthropic_base_url = anthropic_base_url;
        }
        if let Some(openai_base_url) = self.openai_base_url {
            final_config.openai_base_url = openai_base_url;
        }
        if let Some(access_tokens) = self.access_tokens {
            final_config.access_tokens = access_tokens;
        }
    }
}

// The fully resolved configuration used by the application.
#[derive(Debug, Deserialize, Serialize)]
pub struct FinalConfig {
    pub host: String,
    pub port: u16,
    pub base_path: String,
    pub proxy: Option<String>,
    pub log_level: String,
    pub request_timeout_secs: u64,
    pub anthropic_base_url: String,
    pub openai_base_url: String,
    pub access_tokens: Vec<AccessTokenEntry>,
}

fn get_env_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn get_config_from_env() -> PartialConfig {
    PartialConfig {
        host: get_env_var("HOST"),
        port: get_env_var("PORT"),
        base_path: get_env_var("BASE_PATH"),
        proxy: get_env_var("PROXY"),
        log_level: get_env_var("LOG_LEVEL"),
        request_timeout_secs: get_env_var("REQUEST_TIMEOUT_SECS"),
        anthropic_base_url: get_env_var("ANTHROPIC_BASE_URL"),
        openai_base_url: get_env_var("OPENAI_BASE_URL"),
        access_tokens: None,
    }
}

pub static CONFIG: Lazy<FinalConfig> = Lazy::new(|| {
    let user_config_path = if cfg!(debug_assertions) {
        Path::new("config.local.yaml")
    } else {
        Path::new("config.yaml")
    };

    // Programmatic defaults; a config file and env vars override them in turn.
    let mut final_config = FinalConfig {
        host: "0.0.0.0".to_string(),
        port: 8000,
        base_path: "/api/ai".to_string(),
        proxy: None,
        log_level: "info".to_string(),
        request_timeout_secs: 120,
        anthropic_base_url: "https://api.anthropic.com".to_string(),
        openai_base_url: "https://api.openai.com".to_string(),
        access_tokens: Vec::new(),
    };

    if user_config_path.exists() {
        if let Ok(config_str) = fs::read_to_string(user_config_path) {
            let user_config: PartialConfig = serde_yaml::from_str(&config_str)
                .unwrap_or_else(|e| {
                    panic!(
                        "Failed to parse configuration file at {:?}: {}",
                        user_config_path, e
                    )
                });
            user_config.merge_into(&mut final_config);
        }
    }

    // Environment variables have the highest priority.
    get_config_from_env().merge_into(&mut final_config);

    final_config
});
