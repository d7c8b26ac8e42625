use axum::Router;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::CONFIG;
use crate::controller::{create_router, handle_404};
use crate::service::app_state::create_app_state;

mod config;
mod controller;
mod database;
mod proxy;
mod service;
mod utils;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(CONFIG.log_level.clone())),
        )
        .init();

    let app_state = create_app_state();
    let app = Router::new()
        .nest(&CONFIG.base_path, create_router(&app_state))
        .fallback(handle_404)
        .with_state(app_state);

    let addr = format!("{}:{}", CONFIG.host, CONFIG.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {}: {}", addr, e));
    info!("AI gateway listening on {}{}", addr, CONFIG.base_path);

    axum::serve(listener, app)
        .await
        .unwrap_or_else(|e| panic!("Server error: {}", e));
}
