use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::proxy::PROVIDER_GLOBAL;

/// Per-feature gateway policy plus its running usage counters.
///
/// The configuration half is edited by feature administrators; the counters
/// are only ever advanced by the usage ledger, and only for completed calls.
/// `requests_today` is zeroed by the platform's scheduled reset task through
/// `FeaturePolicyStore::reset_daily_counters`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturePolicy {
    pub feature_key: String,
    pub enabled: bool,
    /// 0 means unlimited.
    pub max_requests_per_day: u32,
    pub requests_today: u32,
    pub total_requests: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub estimated_cost_eur: f64,
    /// `"global"` defers to the tenant-wide preference.
    pub preferred_provider: String,
    pub preferred_model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens_per_request: Option<u32>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// The recognized, externally settable policy options. Everything else on
/// `FeaturePolicy` is counter state and not accepted from the outside.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturePolicyConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub max_requests_per_day: u32,
    #[serde(default = "default_preferred_provider")]
    pub preferred_provider: String,
    #[serde(default)]
    pub preferred_model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens_per_request: Option<u32>,
}

fn default_enabled() -> bool {
    true
}

fn default_preferred_provider() -> String {
    PROVIDER_GLOBAL.to_string()
}

/// Metrics of one completed call, applied to the counters as a unit.
#[derive(Debug, Clone, Copy)]
pub struct RecordedUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub estimated_cost_eur: f64,
}

/// Feature policy records keyed by feature key.
///
/// Counter updates run under the map's per-entry lock, so the quota
/// read-check-increment cannot lose updates across concurrent calls for the
/// same feature.
#[derive(Debug, Default)]
pub struct FeaturePolicyStore {
    records: DashMap<String, FeaturePolicy>,
}

impl FeaturePolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, feature_key: &str) -> Option<FeaturePolicy> {
        self.records.get(feature_key).map(|r| r.value().clone())
    }

    pub fn list(&self) -> Vec<FeaturePolicy> {
        let mut policies: Vec<FeaturePolicy> =
            self.records.iter().map(|r| r.value().clone()).collect();
        policies.sort_by(|a, b| a.feature_key.cmp(&b.feature_key));
        policies
    }

    /// Creates or reconfigures a policy. Counters of an existing record are
    /// preserved; only the recognized options are replaced.
    pub fn upsert_config(&self, feature_key: &str, config: FeaturePolicyConfig) -> FeaturePolicy {
        let mut entry = self
            .records
            .entry(feature_key.to_string())
            .or_insert_with(|| FeaturePolicy {
                feature_key: feature_key.to_string(),
                enabled: true,
                max_requests_per_day: 0,
                requests_today: 0,
                total_requests: 0,
                total_input_tokens: 0,
                total_output_tokens: 0,
                estimated_cost_eur: 0.0,
                preferred_provider: PROVIDER_GLOBAL.to_string(),
                preferred_model: None,
                temperature: None,
                max_tokens_per_request: None,
                last_used_at: None,
            });
        entry.enabled = config.enabled;
        entry.max_requests_per_day = config.max_requests_per_day;
        entry.preferred_provider = config.preferred_provider;
        entry.preferred_model = config.preferred_model;
        entry.temperature = config.temperature;
        entry.max_tokens_per_request = config.max_tokens_per_request;
        entry.clone()
    }

    /// Applies the metrics of one successful call: bumps the quota-window
    /// counter, the cumulative sums and the last-used stamp in one step.
    /// Returns `false` when the policy has vanished in the meantime.
    pub fn record_success(&self, feature_key: &str, usage: &RecordedUsage) -> bool {
        match self.records.get_mut(feature_key) {
            Some(mut entry) => {
                entry.requests_today += 1;
                entry.total_requests += 1;
                entry.total_input_tokens += u64::from(usage.input_tokens);
                entry.total_output_tokens += u64::from(usage.output_tokens);
                entry.estimated_cost_eur += usage.estimated_cost_eur;
                entry.last_used_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    /// Zeroes `requests_today` on every policy. Invoked by the platform's
    /// scheduled reset task; the gateway itself never decides the cadence.
    pub fn reset_daily_counters(&self) -> usize {
        let mut reset_count = 0;
        for mut entry in self.records.iter_mut() {
            if entry.requests_today != 0 {
                entry.requests_today = 0;
                reset_count += 1;
            }
        }
        reset_count
    }
}
