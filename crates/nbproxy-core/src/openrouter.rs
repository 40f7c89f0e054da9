//! Outbound requests to the OpenRouter chat-completions endpoint.

use bytes::Bytes;

use nbproxy_common::GlobalConfig;

use crate::upstream::{Headers, UpstreamHttpRequest};

#[derive(Debug, Clone)]
pub struct OpenRouterEndpoint {
    pub url: String,
    /// Sent as `HTTP-Referer` when the browser request carried no `Origin`.
    pub default_referer: String,
    pub app_title: String,
    pub user_agent: String,
}

impl OpenRouterEndpoint {
    pub fn from_global(config: &GlobalConfig) -> Self {
        Self {
            url: config.openrouter_url.clone(),
            default_referer: config.referer.clone(),
            app_title: config.app_title.clone(),
            user_agent: config.user_agent.clone(),
        }
    }

    pub fn headers(&self, api_key: &str, referer: Option<&str>, stream: bool) -> Headers {
        let referer = referer
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(&self.default_referer);
        let accept = if stream {
            "text/event-stream"
        } else {
            "application/json"
        };
        vec![
            ("authorization".to_string(), format!("Bearer {api_key}")),
            ("content-type".to_string(), "application/json".to_string()),
            ("accept".to_string(), accept.to_string()),
            ("http-referer".to_string(), referer.to_string()),
            ("x-title".to_string(), self.app_title.clone()),
            ("user-agent".to_string(), self.user_agent.clone()),
        ]
    }

    /// `body` is an already serialized `ChatCompletionRequest`.
    pub fn request(
        &self,
        api_key: &str,
        referer: Option<&str>,
        body: Bytes,
        stream: bool,
    ) -> UpstreamHttpRequest {
        let req = UpstreamHttpRequest::post_json(
            self.url.clone(),
            self.headers(api_key, referer, stream),
            body,
        );
        if stream { req.streaming() } else { req }
    }
}
