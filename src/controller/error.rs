use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::database::StoreError;

/// Everything the gateway can reject a call with. Each variant maps to one
/// HTTP status; the body is always a flat `{"error": message}` object.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("not authenticated")]
    Unauthenticated,
    #[error("AI settings are not configured for this tenant")]
    ConfigurationMissing,
    #[error("unknown feature '{0}'")]
    FeatureNotFound(String),
    #[error("feature '{0}' is disabled")]
    FeatureDisabled(String),
    // User-facing German, matching the rest of the tenant UI.
    #[error("Tageslimit erreicht: {used} von {limit} Anfragen für '{feature}' verbraucht")]
    QuotaExceeded {
        feature: String,
        used: u32,
        limit: u32,
    },
    #[error("no AI provider is enabled with a usable API key")]
    NoProviderAvailable,
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    Provider(String),
    #[error("{0}")]
    Unexpected(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Unauthenticated => StatusCode::UNAUTHORIZED,
            GatewayError::ConfigurationMissing => StatusCode::BAD_REQUEST,
            GatewayError::FeatureNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::FeatureDisabled(_) => StatusCode::FORBIDDEN,
            GatewayError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            GatewayError::NoProviderAvailable
            | GatewayError::Provider(_)
            | GatewayError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        GatewayError::Unexpected(err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
