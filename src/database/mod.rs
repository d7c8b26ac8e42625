use thiserror::Error;

pub mod policy;
pub mod settings;
pub mod usage_log;

/// Errors surfaced by the record stores. The hosted entity store behind the
/// rest of the platform is out of scope here; these in-process stores expose
/// the same get/list/upsert surface the gateway consumes.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store lock poisoned: {0}")]
    Lock(String),
    #[error("record not found: {0}")]
    NotFound(String),
}
