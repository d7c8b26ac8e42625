use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StoreError;

/// One audit record per attempted gateway call, success or failure.
/// Immutable once appended; never updated or deleted by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageLogEntry {
    pub id: String,
    pub feature_key: String,
    pub provider: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub estimated_cost_eur: f64,
    pub response_time_ms: u64,
    pub success: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UsageLogEntry {
    pub fn new(feature_key: &str, provider: &str, model: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            feature_key: feature_key.to_string(),
            provider: provider.to_string(),
            model: model.to_string(),
            input_tokens: 0,
            output_tokens: 0,
            estimated_cost_eur: 0.0,
            response_time_ms: 0,
            success: false,
            error_message: None,
            created_at: Utc::now(),
        }
    }
}

/// Append-only usage log.
#[derive(Debug, Default)]
pub struct UsageLogStore {
    entries: RwLock<Vec<UsageLogEntry>>,
}

impl UsageLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, entry: UsageLogEntry) -> Result<(), StoreError> {
        let mut guard = self
            .entries
            .write()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        guard.push(entry);
        Ok(())
    }

    /// Newest-first listing, optionally filtered by feature key.
    pub fn list(
        &self,
        feature_key: Option<&str>,
        limit: usize,
    ) -> Result<Vec<UsageLogEntry>, StoreError> {
        let guard = self
            .entries
            .read()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        let entries = guard
            .iter()
            .rev()
            .filter(|entry| feature_key.is_none_or(|key| entry.feature_key == key))
            .take(limit)
            .cloned()
            .collect();
        Ok(entries)
    }
}
