//! Finds the generated image in a model response.
//!
//! Providers disagree on where an image lands in a chat-completions message,
//! so the message is run through an ordered list of extractors and the first
//! hit wins. Anything else is treated as a text reply.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value as JsonValue;

use nbproxy_protocol::gemini::GenerateContentResponse;

static EMBEDDED_DATA_URI: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"data:image/[^;\s]+;base64,[A-Za-z0-9+/=]+").ok());

const ALTERNATE_IMAGE_FIELDS: &[&str] = &["image", "image_url", "imageUrl", "output_image"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    Image(String),
    Text(String),
}

impl Classified {
    pub fn image(&self) -> Option<&str> {
        match self {
            Classified::Image(uri) => Some(uri),
            Classified::Text(_) => None,
        }
    }
}

type Extractor = fn(&JsonValue) -> Option<String>;

const EXTRACTORS: &[Extractor] = &[
    from_images_array,
    from_content_data_uri,
    from_embedded_content,
    from_alternate_fields,
];

/// `choices[0].message` of a chat-completions response.
pub fn first_message(response: &JsonValue) -> Option<&JsonValue> {
    response.pointer("/choices/0/message")
}

pub fn classify_message(message: &JsonValue) -> Classified {
    EXTRACTORS
        .iter()
        .find_map(|extract| extract(message))
        .map(Classified::Image)
        .unwrap_or_else(|| Classified::Text(message_text(message)))
}

/// Classifies a whole chat-completions response; a missing message is empty text.
pub fn classify_chat_response(response: &JsonValue) -> Classified {
    match first_message(response) {
        Some(message) => classify_message(message),
        None => Classified::Text(String::new()),
    }
}

pub fn classify_gemini_response(response: &GenerateContentResponse) -> Classified {
    let parts = response
        .candidates
        .iter()
        .filter_map(|candidate| candidate.content.as_ref())
        .flat_map(|content| content.parts.iter());

    let mut text = Vec::new();
    for part in parts {
        if part.thought == Some(true) {
            continue;
        }
        if let Some(blob) = &part.inline_data {
            return Classified::Image(format!("data:{};base64,{}", blob.mime_type, blob.data));
        }
        if let Some(chunk) = &part.text {
            text.push(chunk.as_str());
        }
    }
    Classified::Text(text.concat())
}

fn is_data_image(value: &str) -> bool {
    value.starts_with("data:image/")
}

fn from_images_array(message: &JsonValue) -> Option<String> {
    let first = message.get("images")?.get(0)?;
    let url = first
        .pointer("/image_url/url")
        .or_else(|| first.get("url"))?
        .as_str()?;
    is_data_image(url).then(|| url.to_string())
}

fn from_content_data_uri(message: &JsonValue) -> Option<String> {
    let content = message.get("content")?.as_str()?.trim();
    is_data_image(content).then(|| content.to_string())
}

fn from_embedded_content(message: &JsonValue) -> Option<String> {
    let content = message.get("content")?.as_str()?;
    let regex = EMBEDDED_DATA_URI.as_ref()?;
    regex.find(content).map(|found| found.as_str().to_string())
}

fn from_alternate_fields(message: &JsonValue) -> Option<String> {
    ALTERNATE_IMAGE_FIELDS.iter().find_map(|field| {
        let value = message.get(*field)?;
        let url = value
            .as_str()
            .or_else(|| value.get("url").and_then(JsonValue::as_str))?;
        (is_data_image(url) || url.starts_with("http")).then(|| url.to_string())
    })
}

/// Text of a message whose `content` is a string or a list of text parts.
pub fn message_text(message: &JsonValue) -> String {
    match message.get("content") {
        Some(JsonValue::String(text)) => text.clone(),
        Some(JsonValue::Array(parts)) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(JsonValue::as_str))
            .collect(),
        _ => String::new(),
    }
}
