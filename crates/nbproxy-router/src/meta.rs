use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use serde::Serialize;
use serde_json::{Value as JsonValue, json};

use crate::envelope::client_error;
use crate::state::AppState;

pub async fn health() -> Json<JsonValue> {
    let ts = time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    Json(json!({"ok": true, "service": "nbproxy", "ts": ts as i64}))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvKeyResponse {
    pub has_env_key: bool,
    pub has_google_key: bool,
    /// Only filled in when the deployment opted in to sharing its keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_api_key: Option<String>,
}

pub async fn env_key(State(state): State<Arc<AppState>>) -> Json<EnvKeyResponse> {
    let config = &state.config;
    let shared = |key: &Option<String>| config.expose_env_key.then(|| key.clone()).flatten();
    Json(EnvKeyResponse {
        has_env_key: config.openrouter_api_key.is_some(),
        has_google_key: config.gemini_api_key.is_some(),
        api_key: shared(&config.openrouter_api_key),
        google_api_key: shared(&config.gemini_api_key),
    })
}

pub async fn not_found() -> Response {
    client_error(StatusCode::NOT_FOUND, "Not found.")
}
