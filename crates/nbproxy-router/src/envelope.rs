//! JSON bodies every handler answers with.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use tracing::warn;

use nbproxy_core::{DispatchError, header_get};

const MAX_MESSAGE_CHARS: usize = 1200;
const HTML_TAG: &str = "[html-response] ";

/// Parses a request body, treating anything that is not a JSON object as `{}`.
pub fn read_json(body: &Bytes) -> JsonValue {
    match serde_json::from_slice::<JsonValue>(body) {
        Ok(value @ JsonValue::Object(_)) => value,
        _ => JsonValue::Object(Default::default()),
    }
}

pub fn ok_data(data: JsonValue) -> Response {
    Json(json!({"ok": true, "data": data})).into_response()
}

pub fn client_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"ok": false, "error": message}))).into_response()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamErrorBody {
    pub ok: bool,
    pub status: u16,
    pub upstream: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cf_ray: Option<String>,
    pub message: String,
    /// Same text as `message`; the browser UI reads this field.
    pub error: String,
}

impl UpstreamErrorBody {
    pub fn new(upstream: &'static str, status: u16, cf_ray: Option<String>, message: String) -> Self {
        Self {
            ok: false,
            status,
            upstream,
            cf_ray,
            error: message.clone(),
            message,
        }
    }

    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

/// Keeps error pages from an upstream edge out of the browser.
pub fn sanitize_upstream_body(body: &str) -> String {
    let snippet: String = body.chars().take(MAX_MESSAGE_CHARS).collect();
    if body.trim_start().starts_with('<') {
        format!("{HTML_TAG}{snippet}")
    } else {
        snippet
    }
}

pub fn upstream_status(upstream: &'static str, status: u16, cf_ray: Option<String>, body: &str) -> Response {
    UpstreamErrorBody::new(upstream, status, cf_ray, sanitize_upstream_body(body))
        .into_response_with(StatusCode::BAD_GATEWAY)
}

pub fn dispatch_error(upstream: &'static str, err: DispatchError) -> Response {
    warn!(event = "upstream_failed", upstream, error = %err);
    match err {
        DispatchError::Status { status, headers, body } => {
            let cf_ray = header_get(&headers, "cf-ray").map(str::to_string);
            upstream_status(upstream, status, cf_ray, &body)
        }
        DispatchError::Transport(_) | DispatchError::InvalidJson(_) => {
            UpstreamErrorBody::new(upstream, 502, None, err.to_string())
                .into_response_with(StatusCode::BAD_GATEWAY)
        }
        DispatchError::Encode(_) | DispatchError::GateClosed(_) => {
            UpstreamErrorBody::new(upstream, 500, None, err.to_string())
                .into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_bodies_become_empty_objects() {
        assert_eq!(read_json(&Bytes::from_static(b"{not json")), json!({}));
        assert_eq!(read_json(&Bytes::from_static(b"[1,2]")), json!({}));
        assert_eq!(read_json(&Bytes::new()), json!({}));
        assert_eq!(read_json(&Bytes::from_static(b"{\"a\":1}")), json!({"a": 1}));
    }

    #[test]
    fn html_is_tagged_and_truncated() {
        let page = format!("  <html>{}</html>", "x".repeat(5000));
        let message = sanitize_upstream_body(&page);
        assert!(message.starts_with("[html-response]   <html>"));
        assert_eq!(message.chars().count(), HTML_TAG.chars().count() + MAX_MESSAGE_CHARS);
        assert_eq!(sanitize_upstream_body("{\"error\":\"quota\"}"), "{\"error\":\"quota\"}");
    }

    #[test]
    fn error_body_omits_missing_ray() {
        let body = UpstreamErrorBody::new("openrouter", 503, None, "busy".to_string());
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"ok": false, "status": 503, "upstream": "openrouter", "message": "busy", "error": "busy"})
        );
    }
}
