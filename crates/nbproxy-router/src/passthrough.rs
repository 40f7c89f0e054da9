//! Chat-completions and Gemini requests forwarded with little reshaping.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use serde_json::Value as JsonValue;

use nbproxy_core::{DispatchError, GeminiAction, UpstreamHttpRequest};
use nbproxy_protocol::openrouter::ChatCompletionRequest;

use crate::credentials;
use crate::envelope::{client_error, dispatch_error, ok_data, read_json, upstream_status};
use crate::response::sse_response;
use crate::state::AppState;

pub const MISSING_OPENROUTER_KEY: &str = "Missing OpenRouter API key.";
pub const MISSING_GEMINI_KEY: &str = "Missing Gemini API key.";

pub async fn chat(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    let body = read_json(&body);
    let Some(api_key) = credentials::openrouter_key(&headers, &body, &state.config) else {
        return client_error(StatusCode::UNAUTHORIZED, MISSING_OPENROUTER_KEY);
    };

    let payload = ChatCompletionRequest {
        model: body
            .get("model")
            .and_then(JsonValue::as_str)
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .unwrap_or(state.config.default_model.as_str())
            .to_string(),
        messages: body
            .get("messages")
            .and_then(JsonValue::as_array)
            .cloned()
            .unwrap_or_default(),
        stream: body.get("stream").and_then(JsonValue::as_bool).unwrap_or(false),
        modalities: body
            .get("modalities")
            .and_then(|value| serde_json::from_value(value.clone()).ok()),
    };
    let encoded = match serde_json::to_vec(&payload) {
        Ok(encoded) => Bytes::from(encoded),
        Err(err) => return dispatch_error("openrouter", DispatchError::Encode(err.to_string())),
    };

    let req = state.dispatcher.settings().openrouter.request(
        &api_key,
        credentials::origin(&headers).as_deref(),
        encoded,
        payload.stream,
    );
    relay(&state, req, "openrouter").await
}

/// `POST /v1beta/models/{model}:{action}`.
pub async fn gemini(
    State(state): State<Arc<AppState>>,
    Path(model_action): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some((model, action)) = model_action
        .split_once(':')
        .and_then(|(model, action)| Some((model, GeminiAction::parse(action)?)))
    else {
        return client_error(StatusCode::NOT_FOUND, "Unsupported Gemini action.");
    };

    let mut body = read_json(&body);
    let Some(api_key) = credentials::gemini_key(&headers, &body, &state.config) else {
        return client_error(StatusCode::UNAUTHORIZED, MISSING_GEMINI_KEY);
    };
    if let Some(object) = body.as_object_mut() {
        object.remove("apiKey");
        object.remove("apikey");
    }

    let req = state
        .dispatcher
        .settings()
        .gemini
        .request(&api_key, model, action, Bytes::from(body.to_string()));
    relay(&state, req, "gemini").await
}

async fn relay(state: &AppState, req: UpstreamHttpRequest, upstream: &'static str) -> Response {
    let stream = req.is_stream;
    let resp = match state.dispatcher.forward(req).await {
        Ok(resp) => resp,
        Err(err) => return dispatch_error(upstream, err),
    };

    if !resp.is_success() {
        let status = resp.status;
        let cf_ray = resp.cf_ray();
        let body = resp.body.collect().await;
        return upstream_status(upstream, status, cf_ray, &String::from_utf8_lossy(&body));
    }
    if stream {
        return sse_response(resp);
    }

    let body = resp.body.collect().await;
    match serde_json::from_slice::<JsonValue>(&body) {
        Ok(data) => ok_data(data),
        Err(err) => dispatch_error(upstream, DispatchError::InvalidJson(err.to_string())),
    }
}
