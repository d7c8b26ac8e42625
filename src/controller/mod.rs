use std::sync::Arc;

use axum::{Json, http::StatusCode, middleware, response::IntoResponse, routing::post};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::proxy::auth;
use crate::service::app_state::{AppState, StateRouter, create_state_router};

pub mod admin;
pub mod chat;
pub mod error;

pub fn create_router(state: &Arc<AppState>) -> StateRouter {
    create_state_router()
        .route("/chat", post(chat::chat_handler))
        .nest("/admin", admin::create_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::access_token_middleware,
        ))
        .layer(CorsLayer::permissive())
}

pub async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "resource not found" })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header::AUTHORIZATION};
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::database::policy::FeaturePolicyConfig;
    use crate::database::settings::TenantAiSettings;
    use crate::service::app_state::ProviderEndpoints;

    const TOKEN: &str = "test-token";

    fn test_settings() -> TenantAiSettings {
        TenantAiSettings {
            anthropic_enabled: true,
            anthropic_api_key: "sk-ant-test".to_string(),
            anthropic_model: "claude-3-5-sonnet-20241022".to_string(),
            openai_enabled: true,
            openai_api_key: "sk-oai-test".to_string(),
            openai_model: None,
            preferred_provider: "auto".to_string(),
        }
    }

    fn default_policy_config() -> FeaturePolicyConfig {
        FeaturePolicyConfig {
            enabled: true,
            max_requests_per_day: 0,
            preferred_provider: "global".to_string(),
            preferred_model: None,
            temperature: None,
            max_tokens_per_request: None,
        }
    }

    async fn test_app(
        anthropic: &MockServer,
        openai: &MockServer,
    ) -> (Router, Arc<AppState>) {
        let state = Arc::new(AppState::new(ProviderEndpoints {
            anthropic_base_url: anthropic.uri(),
            openai_base_url: openai.uri(),
        }));
        state.insert_access_token(TOKEN, "webapp");
        let app = create_router(&state).with_state(state.clone());
        (app, state)
    }

    fn authed(request: Request<Body>) -> Request<Body> {
        let (mut parts, body) = request.into_parts();
        parts
            .headers
            .insert(AUTHORIZATION, format!("Bearer {TOKEN}").parse().unwrap());
        Request::from_parts(parts, body)
    }

    fn json_request(uri: &str, method_name: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method_name)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn response_json(response: axum::response::Response) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap();
        (status, value)
    }

    fn chat_body(feature_key: &str) -> Value {
        json!({
            "featureKey": feature_key,
            "messages": [{"role": "user", "content": "Analysiere diese Rechnung"}]
        })
    }

    fn anthropic_completion() -> Value {
        json!({
            "content": [{"type": "text", "text": "Hier ist die Analyse."}],
            "usage": {"input_tokens": 120, "output_tokens": 48}
        })
    }

    async fn mount_anthropic_success(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-ant-test"))
            .and(header("anthropic-version", "2023-06-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_completion()))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn chat_call_returns_envelope_and_records_usage() {
        let anthropic = MockServer::start().await;
        let openai = MockServer::start().await;
        mount_anthropic_success(&anthropic).await;
        let (app, state) = test_app(&anthropic, &openai).await;
        state.settings_store.put(test_settings()).unwrap();
        state
            .policy_store
            .upsert_config("invoice-analysis", default_policy_config());

        let request = authed(json_request("/chat", "POST", chat_body("invoice-analysis")));
        let (status, body) = response_json(app.oneshot(request).await.unwrap()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["content"], json!("Hier ist die Analyse."));
        assert_eq!(body["provider"], json!("anthropic"));
        assert_eq!(body["model"], json!("claude-3-5-sonnet-20241022"));
        assert_eq!(body["inputTokens"], json!(120));
        assert_eq!(body["outputTokens"], json!(48));
        assert!(body["costEur"].as_f64().unwrap() > 0.0);

        let policy = state.policy_store.get("invoice-analysis").unwrap();
        assert_eq!(policy.requests_today, 1);
        assert_eq!(policy.total_requests, 1);
        assert_eq!(policy.total_input_tokens, 120);
        assert_eq!(policy.total_output_tokens, 48);
        assert!(policy.last_used_at.is_some());

        let entries = state.usage_log_store.list(None, 10).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].success);
        assert_eq!(entries[0].provider, "anthropic");
        assert_eq!(entries[0].error_message, None);
    }

    #[tokio::test]
    async fn daily_quota_is_enforced_after_the_limit() {
        let anthropic = MockServer::start().await;
        let openai = MockServer::start().await;
        mount_anthropic_success(&anthropic).await;
        let (app, state) = test_app(&anthropic, &openai).await;
        state.settings_store.put(test_settings()).unwrap();
        state.policy_store.upsert_config(
            "invoice-analysis",
            FeaturePolicyConfig {
                max_requests_per_day: 1,
                ..default_policy_config()
            },
        );

        let first = authed(json_request("/chat", "POST", chat_body("invoice-analysis")));
        let (status, _) = response_json(app.clone().oneshot(first).await.unwrap()).await;
        assert_eq!(status, StatusCode::OK);

        let second = authed(json_request("/chat", "POST", chat_body("invoice-analysis")));
        let (status, body) = response_json(app.oneshot(second).await.unwrap()).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(body["error"].as_str().unwrap().contains("Tageslimit"));

        // The rejected call left no trace on the counters.
        let policy = state.policy_store.get("invoice-analysis").unwrap();
        assert_eq!(policy.requests_today, 1);
        assert_eq!(policy.total_requests, 1);
    }

    #[tokio::test]
    async fn auto_routing_falls_back_to_openai() {
        let anthropic = MockServer::start().await;
        let openai = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-oai-test"))
            .and(body_partial_json(json!({"model": "gpt-4o-mini"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "Antwort"}}],
                "usage": {"prompt_tokens": 30, "completion_tokens": 12}
            })))
            .mount(&openai)
            .await;
        let (app, state) = test_app(&anthropic, &openai).await;
        state
            .settings_store
            .put(TenantAiSettings {
                anthropic_enabled: false,
                ..test_settings()
            })
            .unwrap();
        state
            .policy_store
            .upsert_config("tenant-letter", default_policy_config());

        let request = authed(json_request("/chat", "POST", chat_body("tenant-letter")));
        let (status, body) = response_json(app.oneshot(request).await.unwrap()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["provider"], json!("openai"));
        assert_eq!(body["model"], json!("gpt-4o-mini"));
        assert_eq!(body["inputTokens"], json!(30));
    }

    #[tokio::test]
    async fn provider_failure_returns_500_and_logs_the_attempt() {
        let anthropic = MockServer::start().await;
        let openai = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": {"message": "boom"}
            })))
            .mount(&anthropic)
            .await;
        let (app, state) = test_app(&anthropic, &openai).await;
        state.settings_store.put(test_settings()).unwrap();
        state
            .policy_store
            .upsert_config("invoice-analysis", default_policy_config());

        let request = authed(json_request("/chat", "POST", chat_body("invoice-analysis")));
        let (status, body) = response_json(app.oneshot(request).await.unwrap()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], json!("boom"));

        // Failed calls reach the ledger with zeroed metrics but never the counters.
        let entries = state.usage_log_store.list(None, 10).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].success);
        assert_eq!(entries[0].input_tokens, 0);
        assert_eq!(entries[0].output_tokens, 0);
        assert_eq!(entries[0].error_message.as_deref(), Some("boom"));
        let policy = state.policy_store.get("invoice-analysis").unwrap();
        assert_eq!(policy.total_requests, 0);
    }

    #[tokio::test]
    async fn rejection_ladder_statuses() {
        let anthropic = MockServer::start().await;
        let openai = MockServer::start().await;
        let (app, state) = test_app(&anthropic, &openai).await;

        // No token at all.
        let request = json_request("/chat", "POST", chat_body("invoice-analysis"));
        let (status, _) = response_json(app.clone().oneshot(request).await.unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // No tenant settings yet.
        let request = authed(json_request("/chat", "POST", chat_body("invoice-analysis")));
        let (status, _) = response_json(app.clone().oneshot(request).await.unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Settings exist, feature does not.
        state.settings_store.put(test_settings()).unwrap();
        let request = authed(json_request("/chat", "POST", chat_body("missing")));
        let (status, _) = response_json(app.clone().oneshot(request).await.unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Feature exists but is disabled.
        state.policy_store.upsert_config(
            "invoice-analysis",
            FeaturePolicyConfig {
                enabled: false,
                ..default_policy_config()
            },
        );
        let request = authed(json_request("/chat", "POST", chat_body("invoice-analysis")));
        let (status, _) = response_json(app.oneshot(request).await.unwrap()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn empty_message_list_is_rejected_and_logged() {
        let anthropic = MockServer::start().await;
        let openai = MockServer::start().await;
        let (app, state) = test_app(&anthropic, &openai).await;
        state.settings_store.put(test_settings()).unwrap();
        state
            .policy_store
            .upsert_config("invoice-analysis", default_policy_config());

        let body = json!({"featureKey": "invoice-analysis", "messages": []});
        let request = authed(json_request("/chat", "POST", body));
        let (status, _) = response_json(app.oneshot(request).await.unwrap()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let entries = state.usage_log_store.list(None, 10).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].success);
    }

    #[tokio::test]
    async fn admin_settings_round_trip() {
        let anthropic = MockServer::start().await;
        let openai = MockServer::start().await;
        let (app, _state) = test_app(&anthropic, &openai).await;

        let request = authed(json_request(
            "/admin/settings",
            "PUT",
            serde_json::to_value(test_settings()).unwrap(),
        ));
        let (status, _) = response_json(app.clone().oneshot(request).await.unwrap()).await;
        assert_eq!(status, StatusCode::OK);

        let request = authed(Request::get("/admin/settings").body(Body::empty()).unwrap());
        let (status, body) = response_json(app.oneshot(request).await.unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["anthropic_enabled"], json!(true));
        assert_eq!(body["preferred_provider"], json!("auto"));
    }

    #[tokio::test]
    async fn admin_rejects_unknown_provider_preference() {
        let anthropic = MockServer::start().await;
        let openai = MockServer::start().await;
        let (app, _state) = test_app(&anthropic, &openai).await;

        let request = authed(json_request(
            "/admin/features/invoice-analysis",
            "PUT",
            json!({"preferred_provider": "mistral"}),
        ));
        let (status, body) = response_json(app.oneshot(request).await.unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("mistral"));
    }

    #[tokio::test]
    async fn admin_reset_daily_zeroes_window_counters() {
        let anthropic = MockServer::start().await;
        let openai = MockServer::start().await;
        mount_anthropic_success(&anthropic).await;
        let (app, state) = test_app(&anthropic, &openai).await;
        state.settings_store.put(test_settings()).unwrap();
        state
            .policy_store
            .upsert_config("invoice-analysis", default_policy_config());

        let request = authed(json_request("/chat", "POST", chat_body("invoice-analysis")));
        let (status, _) = response_json(app.clone().oneshot(request).await.unwrap()).await;
        assert_eq!(status, StatusCode::OK);

        let request = authed(json_request("/admin/features/reset-daily", "POST", json!({})));
        let (status, body) = response_json(app.oneshot(request).await.unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reset"], json!(1));

        let policy = state.policy_store.get("invoice-analysis").unwrap();
        assert_eq!(policy.requests_today, 0);
        // Lifetime totals survive the reset.
        assert_eq!(policy.total_requests, 1);
    }

    #[tokio::test]
    async fn admin_usage_filters_by_feature_key() {
        let anthropic = MockServer::start().await;
        let openai = MockServer::start().await;
        mount_anthropic_success(&anthropic).await;
        let (app, state) = test_app(&anthropic, &openai).await;
        state.settings_store.put(test_settings()).unwrap();
        state
            .policy_store
            .upsert_config("invoice-analysis", default_policy_config());
        state
            .policy_store
            .upsert_config("tenant-letter", default_policy_config());

        for feature in ["invoice-analysis", "tenant-letter", "invoice-analysis"] {
            let request = authed(json_request("/chat", "POST", chat_body(feature)));
            let (status, _) = response_json(app.clone().oneshot(request).await.unwrap()).await;
            assert_eq!(status, StatusCode::OK);
        }

        let request = authed(
            Request::get("/admin/usage?featureKey=invoice-analysis&limit=10")
                .body(Body::empty())
                .unwrap(),
        );
        let (status, body) = response_json(app.oneshot(request).await.unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        let entries = body.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(
            entries
                .iter()
                .all(|e| e["feature_key"] == json!("invoice-analysis"))
        );
    }
}
