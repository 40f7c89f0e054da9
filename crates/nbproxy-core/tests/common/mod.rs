#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use bytes::Bytes;
use serde_json::{Value as JsonValue, json};

use nbproxy_core::{
    UpstreamBody, UpstreamClient, UpstreamFailure, UpstreamHttpRequest, UpstreamHttpResponse,
    UpstreamTransportErrorKind,
};

pub enum Reply {
    Json(u16, JsonValue),
    Raw(u16, Vec<(String, String)>, &'static str),
    Stream(Vec<&'static str>),
    Fail(UpstreamTransportErrorKind, &'static str),
}

/// Replays canned replies in order and records every request it sees.
#[derive(Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Reply>>,
    seen: Mutex<Vec<UpstreamHttpRequest>>,
}

impl ScriptedClient {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<UpstreamHttpRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn bodies(&self) -> Vec<JsonValue> {
        self.requests()
            .iter()
            .map(|req| serde_json::from_slice(req.body.as_deref().unwrap_or(b"null")).unwrap())
            .collect()
    }

    pub fn models(&self) -> Vec<String> {
        self.bodies()
            .iter()
            .map(|body| body["model"].as_str().unwrap_or_default().to_string())
            .collect()
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
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Reply::Json(200, text_reply("script exhausted")));
            match reply {
                Reply::Json(status, value) => Ok(UpstreamHttpResponse {
                    status,
                    headers: vec![("content-type".to_string(), "application/json".to_string())],
                    body: UpstreamBody::Bytes(Bytes::from(value.to_string())),
                }),
                Reply::Raw(status, headers, body) => Ok(UpstreamHttpResponse {
                    status,
                    headers,
                    body: UpstreamBody::Bytes(Bytes::from_static(body.as_bytes())),
                }),
                Reply::Stream(chunks) => {
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
                Reply::Fail(kind, message) => Err(UpstreamFailure::new(kind, message)),
            }
        })
    }
}

pub fn text_reply(text: &str) -> JsonValue {
    json!({"choices": [{"message": {"role": "assistant", "content": text}}]})
}

pub fn image_reply(uri: &str) -> JsonValue {
    json!({"choices": [{"message": {
        "role": "assistant",
        "content": "",
        "images": [{"type": "image_url", "image_url": {"url": uri}}]
    }}]})
}
