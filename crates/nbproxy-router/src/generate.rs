//! Simplified image generation endpoints used by the browser UI.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value as JsonValue;

use nbproxy_core::message::{Role, last_user_index, messages_from_gemini, messages_from_wire};
use nbproxy_core::{DispatchInput, GeminiInput, GenerationOutput, GenerationResult, Message};
use nbproxy_protocol::gemini::Content;

use crate::credentials;
use crate::envelope::{client_error, dispatch_error, read_json};
use crate::passthrough::{MISSING_GEMINI_KEY, MISSING_OPENROUTER_KEY};
use crate::state::AppState;

const MISSING_PROMPT: &str = "Missing prompt.";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    ok: bool,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    used_fallback: bool,
    model: String,
}

impl From<GenerationResult> for GenerateResponse {
    fn from(result: GenerationResult) -> Self {
        let kind = result.kind();
        let (image_url, text) = match result.output {
            GenerationOutput::Image(uri) => (Some(uri), None),
            GenerationOutput::Text(text) => (None, Some(text)),
        };
        Self {
            ok: true,
            kind,
            image_url,
            text,
            used_fallback: result.meta.used_fallback,
            model: result.meta.model,
        }
    }
}

fn str_field(body: &JsonValue, name: &str) -> Option<String> {
    body.get(name)
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn string_list(body: &JsonValue, name: &str) -> Vec<String> {
    body.get(name)
        .and_then(JsonValue::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(JsonValue::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Output shape hints from `parameters`, phrased for chat models.
fn parameter_hint(body: &JsonValue) -> Option<String> {
    let params = body.get("parameters")?;
    let aspect = str_field(params, "aspect_ratio");
    let resolution = str_field(params, "resolution");
    match (aspect, resolution) {
        (Some(aspect), Some(resolution)) => Some(format!(
            "Use aspect ratio {aspect} at {resolution} resolution. Keep the composition complete without letterboxing or heavy cropping."
        )),
        (Some(aspect), None) => Some(format!("Use aspect ratio {aspect}.")),
        (None, Some(resolution)) => Some(format!("Render at {resolution} resolution.")),
        (None, None) => None,
    }
}

/// History plus the new prompt, or `None` when there is nothing to answer.
///
/// A history that already ends with a user turn carries the current request,
/// so `prompt` and `images` are not added a second time.
fn conversation(mut messages: Vec<Message>, body: &JsonValue, hint: Option<String>) -> Option<Vec<Message>> {
    let ends_with_user = messages
        .last()
        .is_some_and(|message| message.role == Role::User && !message.is_empty());
    let images = string_list(body, "images");
    let prompt = str_field(body, "prompt");
    if !ends_with_user && (prompt.is_some() || !images.is_empty()) {
        let mut text = prompt.unwrap_or_default();
        if let Some(hint) = hint {
            if !text.is_empty() {
                text.push_str("\n\n");
            }
            text.push_str(&hint);
        }
        messages.push(Message::user(text, &images));
    }
    let last = last_user_index(&messages)?;
    (!messages[last].is_empty()).then_some(messages)
}

fn history(body: &JsonValue) -> Vec<Message> {
    ["conversationHistory", "messages"]
        .iter()
        .filter_map(|field| body.get(*field).and_then(JsonValue::as_array))
        .flat_map(|values| messages_from_wire(values))
        .collect()
}

fn respond(result: GenerationResult) -> Response {
    Json(GenerateResponse::from(result)).into_response()
}

pub async fn generate(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    let body = read_json(&body);
    let Some(api_key) = credentials::openrouter_key(&headers, &body, &state.config) else {
        return client_error(StatusCode::UNAUTHORIZED, MISSING_OPENROUTER_KEY);
    };
    let Some(messages) = conversation(history(&body), &body, parameter_hint(&body)) else {
        return client_error(StatusCode::BAD_REQUEST, MISSING_PROMPT);
    };

    let input = DispatchInput {
        messages,
        api_key,
        model: str_field(&body, "model"),
        referer: credentials::origin(&headers),
    };
    match state.dispatcher.generate(input).await {
        Ok(result) => respond(result),
        Err(err) => dispatch_error("openrouter", err),
    }
}

pub async fn generate_gemini(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    let body = read_json(&body);
    let Some(api_key) = credentials::gemini_key(&headers, &body, &state.config) else {
        return client_error(StatusCode::UNAUTHORIZED, MISSING_GEMINI_KEY);
    };

    let mut messages = history(&body);
    if messages.is_empty()
        && let Some(contents) = body
            .get("contents")
            .and_then(|value| serde_json::from_value::<Vec<Content>>(value.clone()).ok())
    {
        messages = messages_from_gemini(&contents);
    }
    let Some(messages) = conversation(messages, &body, None) else {
        return client_error(StatusCode::BAD_REQUEST, MISSING_PROMPT);
    };

    let params = body.get("parameters").cloned().unwrap_or(JsonValue::Null);
    let input = GeminiInput {
        messages,
        api_key,
        model: str_field(&body, "model"),
        aspect_ratio: str_field(&body, "aspectRatio").or_else(|| str_field(&params, "aspect_ratio")),
        image_size: str_field(&body, "imageSize")
            .or_else(|| str_field(&params, "resolution"))
            .map(|size| size.to_ascii_uppercase()),
    };
    match state.dispatcher.generate_with_gemini(input).await {
        Ok(result) => respond(result),
        Err(err) => dispatch_error("gemini", err),
    }
}
