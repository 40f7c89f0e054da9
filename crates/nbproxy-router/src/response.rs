//! Turns upstream responses into axum responses.

use std::convert::Infallible;

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use nbproxy_core::{UpstreamBody, UpstreamHttpResponse};

const SSE_CONTENT_TYPE: &str = "text/event-stream; charset=utf-8";

/// Pipes a 2xx streaming upstream response through as server-sent events.
///
/// The body bytes are relayed as they arrive. Upstream headers are kept
/// except framing ones; the content type is forced to `text/event-stream`
/// whatever the upstream claimed.
pub fn sse_response(resp: UpstreamHttpResponse) -> Response {
    let mut builder = Response::builder().status(resp.status);
    if let Some(headers) = builder.headers_mut() {
        for (name, value) in &resp.headers {
            if is_hop_by_hop_or_framing_header(name) || name.eq_ignore_ascii_case("content-type") {
                continue;
            }
            if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                headers.append(name, value);
            }
        }
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(SSE_CONTENT_TYPE));
        headers
            .entry(header::CACHE_CONTROL)
            .or_insert(HeaderValue::from_static("no-cache"));
        headers
            .entry(HeaderName::from_static("x-accel-buffering"))
            .or_insert(HeaderValue::from_static("no"));
    }

    let body = match resp.body {
        UpstreamBody::Bytes(bytes) => Body::from(bytes),
        UpstreamBody::Stream(rx) => {
            let stream = ReceiverStream::new(rx).map(Ok::<_, Infallible>);
            Body::from_stream(stream)
        }
    };

    builder
        .body(body)
        .unwrap_or_else(|_| (StatusCode::INTERNAL_SERVER_ERROR, "response_build_failed").into_response())
}

fn is_hop_by_hop_or_framing_header(name: &str) -> bool {
    [
        "content-length",
        "transfer-encoding",
        "connection",
        "keep-alive",
        "proxy-authenticate",
        "proxy-authorization",
        "te",
        "trailer",
        "upgrade",
    ]
    .iter()
    .any(|hop| name.eq_ignore_ascii_case(hop))
}
