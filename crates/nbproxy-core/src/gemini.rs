//! Outbound requests to the Gemini `generateContent` family.

use bytes::Bytes;

use nbproxy_common::GlobalConfig;

use crate::upstream::UpstreamHttpRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeminiAction {
    GenerateContent,
    StreamGenerateContent,
}

impl GeminiAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "generateContent" => Some(Self::GenerateContent),
            "streamGenerateContent" => Some(Self::StreamGenerateContent),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::GenerateContent => "generateContent",
            Self::StreamGenerateContent => "streamGenerateContent",
        }
    }

    pub fn is_stream(self) -> bool {
        self == Self::StreamGenerateContent
    }
}

#[derive(Debug, Clone)]
pub struct GeminiEndpoint {
    pub base_url: String,
    pub user_agent: String,
}

impl GeminiEndpoint {
    pub fn from_global(config: &GlobalConfig) -> Self {
        Self {
            base_url: config.gemini_base_url.clone(),
            user_agent: config.user_agent.clone(),
        }
    }

    pub fn url(&self, model: &str, action: GeminiAction) -> String {
        let model = model.trim_start_matches("models/");
        let mut url = format!("{}/models/{model}:{}", self.base_url, action.as_str());
        if action.is_stream() {
            url.push_str("?alt=sse");
        }
        url
    }

    pub fn request(&self, api_key: &str, model: &str, action: GeminiAction, body: Bytes) -> UpstreamHttpRequest {
        let headers = vec![
            ("x-goog-api-key".to_string(), api_key.to_string()),
            ("content-type".to_string(), "application/json".to_string()),
            ("user-agent".to_string(), self.user_agent.clone()),
        ];
        let req = UpstreamHttpRequest::post_json(self.url(model, action), headers, body);
        if action.is_stream() { req.streaming() } else { req }
    }
}
