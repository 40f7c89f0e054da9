use std::time::Instant;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{Instrument, info, info_span};

pub const REQUEST_ID_HEADER: &str = "x-nbproxy-request-id";

const ALLOW_ORIGIN: &str = "*";
const ALLOW_METHODS: &str = "GET,POST,OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type,Authorization,X-Requested-With,Accept,x-goog-api-key";

fn is_api_path(path: &str) -> bool {
    path == "/generate"
        || ["/api/", "/v1/", "/v1beta/"]
            .iter()
            .any(|prefix| path.starts_with(prefix))
}

fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static(ALLOW_ORIGIN),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(header::VARY, HeaderValue::from_static("Origin"));
}

/// Answers preflights on API paths and stamps CORS headers on every response.
pub async fn cors(req: Request<Body>, next: Next) -> Response {
    if req.method() == Method::OPTIONS && is_api_path(req.uri().path()) {
        let mut resp = StatusCode::NO_CONTENT.into_response();
        apply_cors(resp.headers_mut());
        return resp;
    }
    let mut resp = next.run(req).await;
    apply_cors(resp.headers_mut());
    resp
}

/// Tags the request with a trace id: a span field for handler logs and a
/// response header for the client.
pub async fn trace_request(req: Request<Body>, next: Next) -> Response {
    let trace_id = uuid::Uuid::new_v4().to_string();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let span = info_span!("request", trace_id = %trace_id);
    let started = Instant::now();
    let mut resp = async {
        info!(event = "downstream_received", method = %method, path = %path);
        let resp = next.run(req).await;
        info!(
            event = "downstream_responded",
            method = %method,
            path = %path,
            status = resp.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64
        );
        resp
    }
    .instrument(span)
    .await;

    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        resp.headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    resp
}
