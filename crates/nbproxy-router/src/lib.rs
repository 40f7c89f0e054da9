//! HTTP surface of nbproxy.

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};

mod credentials;
mod envelope;
mod generate;
mod meta;
mod middleware;
mod passthrough;
mod response;
mod state;

pub use middleware::REQUEST_ID_HEADER;
pub use state::AppState;

/// Base64 image payloads make request bodies large.
const MAX_REQUEST_BODY_BYTES: usize = 32 * 1024 * 1024;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(meta::health))
        .route("/api/get-env-key", get(meta::env_key))
        .route("/api/chat", post(passthrough::chat))
        .route("/v1/chat/completions", post(passthrough::chat))
        .route("/generate", post(generate::generate))
        .route("/api/generate", post(generate::generate))
        .route("/api/gemini/generate", post(generate::generate_gemini))
        .route("/v1beta/models/{*model_action}", post(passthrough::gemini))
        .fallback(meta::not_found)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(axum::middleware::from_fn(middleware::cors))
        .layer(axum::middleware::from_fn(middleware::trace_request))
        .with_state(state)
}
