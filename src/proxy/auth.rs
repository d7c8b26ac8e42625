use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::controller::error::GatewayError;
use crate::service::app_state::AppState;

/// The resolved caller identity, attached to the request extensions by the
/// access-token middleware.
#[derive(Debug, Clone)]
pub struct Caller {
    pub name: String,
}

fn parse_token_from_headers(headers: &HeaderMap) -> Option<&str> {
    if let Some(value) = headers.get(AUTHORIZATION) {
        let value = value.to_str().ok()?;
        return value.strip_prefix("Bearer ").map(str::trim);
    }
    headers
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
}

/// Resolves the caller from the request headers or rejects with 401.
pub fn resolve_caller(state: &AppState, headers: &HeaderMap) -> Result<Caller, GatewayError> {
    let token = parse_token_from_headers(headers).ok_or_else(|| {
        warn!("request without access token");
        GatewayError::Unauthenticated
    })?;
    match state.lookup_caller(token) {
        Some(name) => Ok(Caller { name }),
        None => {
            warn!("request with unknown access token");
            Err(GatewayError::Unauthenticated)
        }
    }
}

pub async fn access_token_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let caller = resolve_caller(&state, request.headers())?;
    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}
