use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub mod auth;
pub mod client;
pub mod logging;
pub mod policy;
pub mod router;

/// Sentinel value in tenant settings: pick a provider by credential availability.
pub const PROVIDER_AUTO: &str = "auto";
/// Sentinel value in a feature policy: defer to the tenant-wide preference.
pub const PROVIDER_GLOBAL: &str = "global";

/// The LLM vendors the gateway can talk to. Routing order for the
/// `auto` fallback is the declaration order here.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
}

impl ProviderKind {
    /// Human-readable vendor name, used in user-facing error messages.
    pub fn label(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "Anthropic",
            ProviderKind::OpenAi => "OpenAI",
        }
    }
}
