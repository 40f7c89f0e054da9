use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::openrouter::types::ResponseModality;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChatCompletionRequest {
    /// Model ID, e.g. `google/gemini-2.5-flash-image-preview`.
    pub model: String,
    /// Messages are forwarded verbatim; the proxy never drops unknown fields.
    pub messages: Vec<JsonValue>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<ResponseModality>>,
}
