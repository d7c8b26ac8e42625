use std::time::Instant;

use tracing::{error, warn};

use crate::database::policy::RecordedUsage;
use crate::database::usage_log::UsageLogEntry;
use crate::proxy::client::Completion;
use crate::proxy::router::ResolvedRequest;
use crate::service::app_state::AppState;

/// Provider/model placeholder when a call failed before routing finished.
const UNRESOLVED: &str = "unknown";

/// Accounting context of one gateway call. Created right after the feature
/// policy is loaded; whichever way the call ends, exactly one ledger record
/// is written from it.
#[derive(Debug)]
pub struct CallScope {
    pub feature_key: String,
    pub resolved: Option<ResolvedRequest>,
    started: Instant,
}

impl CallScope {
    pub fn new(feature_key: &str) -> Self {
        Self {
            feature_key: feature_key.to_string(),
            resolved: None,
            started: Instant::now(),
        }
    }

    pub fn mark_resolved(&mut self, resolved: &ResolvedRequest) {
        self.resolved = Some(resolved.clone());
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Records a completed call: appends the audit entry and advances the
/// feature counters as one logical unit. Store failures are logged and
/// swallowed; accounting must never turn a served response into an error.
pub fn record_success(
    state: &AppState,
    scope: &CallScope,
    resolved: &ResolvedRequest,
    completion: &Completion,
    cost_eur: f64,
    response_time_ms: u64,
) {
    let mut entry = UsageLogEntry::new(
        &scope.feature_key,
        &resolved.provider.to_string(),
        &resolved.model,
    );
    entry.input_tokens = completion.input_tokens;
    entry.output_tokens = completion.output_tokens;
    entry.estimated_cost_eur = cost_eur;
    entry.response_time_ms = response_time_ms;
    entry.success = true;

    if let Err(e) = state.usage_log_store.append(entry) {
        error!(
            "failed to append usage log for feature '{}': {}",
            scope.feature_key, e
        );
    }

    let applied = state.policy_store.record_success(
        &scope.feature_key,
        &RecordedUsage {
            input_tokens: completion.input_tokens,
            output_tokens: completion.output_tokens,
            estimated_cost_eur: cost_eur,
        },
    );
    if !applied {
        warn!(
            "feature policy '{}' vanished before its counters could be updated",
            scope.feature_key
        );
    }
}

/// Records a failed call: appends an audit entry with zeroed metrics and the
/// caught error's message. Counters stay untouched, and a store failure here
/// must not mask the error already travelling to the caller.
pub fn record_failure(state: &AppState, scope: &CallScope, error_message: &str) {
    let (provider, model) = match &scope.resolved {
        Some(resolved) => (resolved.provider.to_string(), resolved.model.clone()),
        None => (UNRESOLVED.to_string(), UNRESOLVED.to_string()),
    };

    let mut entry = UsageLogEntry::new(&scope.feature_key, &provider, &model);
    entry.response_time_ms = scope.elapsed_ms();
    entry.error_message = Some(error_message.to_string());

    if let Err(e) = state.usage_log_store.append(entry) {
        error!(
            "failed to append failure log for feature '{}': {}",
            scope.feature_key, e
        );
    }
}
