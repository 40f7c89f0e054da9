#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use bytes::Bytes;
use serde_json::Value as JsonValue;
use tower::ServiceExt;

use nbproxy_common::GlobalConfig;
use nbproxy_core::{
    UpstreamBody, UpstreamClient, UpstreamFailure, UpstreamHttpRequest, UpstreamHttpResponse,
    UpstreamTransportErrorKind,
};
use nbproxy_router::{AppState, router};

pub enum Reply {
    Json(u16, JsonValue),
    Raw(u16, Vec<(&'static str, &'static str)>, &'static str),
    Stream(Vec<&'static str>),
    Fail(&'static str),
}

#[derive(Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Reply>>,
    seen: Mutex<Vec<UpstreamHttpRequest>>,
}

impl ScriptedClient {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<UpstreamHttpRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn body(&self, index: usize) -> JsonValue {
        let req = &self.requests()[index];
        serde_json::from_slice(req.body.as_deref().unwrap_or(b"null")).unwrap()
    }
}

impl UpstreamClient for ScriptedClient {
    fn send<'a>(
        &'a self,
        req: UpstreamHttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<UpstreamHttpResponse, UpstreamFailure>> + Send + 'a>>
    {
        Box::pin(async move {
            self.seen.lock().unwrap().push(req);
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                None => Err(UpstreamFailure::new(UpstreamTransportErrorKind::Other, "script exhausted")),
                Some(Reply::Json(status, value)) => Ok(UpstreamHttpResponse {
                    status,
                    headers: vec![("content-type".to_string(), "application/json".to_string())],
                    body: UpstreamBody::Bytes(Bytes::from(value.to_string())),
                }),
                Some(Reply::Raw(status, headers, body)) => Ok(UpstreamHttpResponse {
                    status,
                    headers: headers
                        .into_iter()
                        .map(|(name, value)| (name.to_string(), value.to_string()))
                        .collect(),
                    body: UpstreamBody::Bytes(Bytes::from_static(body.as_bytes())),
                }),
                Some(Reply::Stream(chunks)) => {
                    let (tx, rx) = tokio::sync::mpsc::channel(chunks.len().max(1));
                    for chunk in chunks {
                        tx.send(Bytes::from_static(chunk.as_bytes())).await.unwrap();
                    }
                    Ok(UpstreamHttpResponse {
                        status: 200,
                        headers: vec![("content-type".to_string(), "text/event-stream".to_string())],
                        body: UpstreamBody::Stream(rx),
                    })
                }
                Some(Reply::Fail(message)) => {
                    Err(UpstreamFailure::new(UpstreamTransportErrorKind::Connect, message))
                }
            }
        })
    }
}

pub fn test_config() -> GlobalConfig {
    GlobalConfig {
        base_delay_ms: 0,
        image_model: "primary/model".to_string(),
        fallback_models: vec!["fallback/one".to_string()],
        ..GlobalConfig::default()
    }
}

pub fn app(config: GlobalConfig, client: Arc<ScriptedClient>) -> Router {
    router(Arc::new(AppState::new(config, client)))
}

pub async fn send(app: Router, req: Request<Body>) -> Response<Body> {
    app.oneshot(req).await.unwrap()
}

pub fn post_json(path: &str, body: JsonValue) -> Request<Body> {
    Request::post(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_bytes(resp: Response<Body>) -> Bytes {
    axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap()
}

pub async fn body_json(resp: Response<Body>) -> JsonValue {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}
