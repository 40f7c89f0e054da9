//! Normalized conversation model shared by both upstream families.

use serde_json::Value as JsonValue;
use tracing::debug;

use nbproxy_protocol::gemini::{self, ContentRole, FileData, Part};
use nbproxy_protocol::openrouter::{ChatMessage, ChatRole, ContentPart as WirePart, ImageUrl, MessageContent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    Url(String),
    Inline { media_type: String, data: String },
}

impl ImageRef {
    /// Accepts `data:<media>;base64,<payload>` URIs and plain URLs.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        if let Some(rest) = value.strip_prefix("data:") {
            let (meta, data) = rest.split_once(',')?;
            let media_type = meta.strip_suffix(";base64")?;
            if media_type.is_empty() || data.is_empty() {
                return None;
            }
            return Some(ImageRef::Inline {
                media_type: media_type.to_string(),
                data: data.to_string(),
            });
        }
        Some(ImageRef::Url(value.to_string()))
    }

    pub fn to_uri(&self) -> String {
        match self {
            ImageRef::Url(url) => url.clone(),
            ImageRef::Inline { media_type, data } => format!("data:{media_type};base64,{data}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    Image(ImageRef),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<ContentPart>,
}

impl Message {
    pub fn new(role: Role, parts: Vec<ContentPart>) -> Self {
        Self { role, parts }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![ContentPart::Text(text.into())])
    }

    /// Builds a user turn from a prompt and image URIs, skipping unparsable images.
    pub fn user<S: AsRef<str>>(prompt: impl Into<String>, images: &[S]) -> Self {
        let mut parts = vec![ContentPart::Text(prompt.into())];
        parts.extend(
            images
                .iter()
                .filter_map(|image| ImageRef::parse(image.as_ref()))
                .map(ContentPart::Image),
        );
        Self::new(Role::User, parts)
    }

    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text(text) => Some(text.as_str()),
                ContentPart::Image(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn has_image(&self) -> bool {
        self.parts
            .iter()
            .any(|part| matches!(part, ContentPart::Image(_)))
    }

    pub fn is_empty(&self) -> bool {
        self.parts.iter().all(|part| match part {
            ContentPart::Text(text) => text.trim().is_empty(),
            ContentPart::Image(_) => false,
        })
    }

    /// Prefixes the first text part, or inserts one at the front.
    pub fn prepend_text(&mut self, prefix: &str) {
        match self.parts.iter_mut().find_map(|part| match part {
            ContentPart::Text(text) => Some(text),
            ContentPart::Image(_) => None,
        }) {
            Some(text) => *text = format!("{prefix}{text}"),
            None => self.parts.insert(0, ContentPart::Text(prefix.trim_end().to_string())),
        }
    }

    pub fn append_text(&mut self, suffix: &str) {
        self.parts.push(ContentPart::Text(suffix.to_string()));
    }

    /// Replaces every text part with `text`, keeping images in place after it.
    pub fn replace_text(&mut self, text: String) {
        self.parts
            .retain(|part| matches!(part, ContentPart::Image(_)));
        self.parts.insert(0, ContentPart::Text(text));
    }

    fn from_chat(message: ChatMessage) -> Option<Self> {
        let role = match message.role {
            ChatRole::System | ChatRole::Developer => Role::System,
            ChatRole::User => Role::User,
            ChatRole::Assistant => Role::Assistant,
            ChatRole::Tool => return None,
        };
        let parts = match message.content {
            None => Vec::new(),
            Some(MessageContent::Text(text)) => vec![ContentPart::Text(text)],
            Some(MessageContent::Parts(parts)) => parts
                .into_iter()
                .filter_map(|part| match part {
                    WirePart::Text { text } => Some(ContentPart::Text(text)),
                    WirePart::ImageUrl { image_url } => {
                        ImageRef::parse(&image_url.url).map(ContentPart::Image)
                    }
                    WirePart::Unsupported => None,
                })
                .collect(),
        };
        Some(Self { role, parts })
    }

    fn to_chat(&self) -> ChatMessage {
        let role = match self.role {
            Role::System => ChatRole::System,
            Role::User => ChatRole::User,
            Role::Assistant => ChatRole::Assistant,
        };
        let parts = self
            .parts
            .iter()
            .map(|part| match part {
                ContentPart::Text(text) => WirePart::Text { text: text.clone() },
                ContentPart::Image(image) => WirePart::ImageUrl {
                    image_url: ImageUrl {
                        url: image.to_uri(),
                        detail: None,
                    },
                },
            })
            .collect();
        ChatMessage {
            role,
            content: Some(MessageContent::Parts(parts)),
        }
    }
}

/// Parses browser-supplied messages, dropping the ones that do not fit.
pub fn messages_from_wire(values: &[JsonValue]) -> Vec<Message> {
    values
        .iter()
        .filter_map(|value| match serde_json::from_value::<ChatMessage>(value.clone()) {
            Ok(message) => Message::from_chat(message),
            Err(err) => {
                debug!(event = "message_skipped", error = %err);
                None
            }
        })
        .collect()
}

pub fn messages_to_wire(messages: &[Message]) -> Vec<JsonValue> {
    messages
        .iter()
        .filter_map(|message| serde_json::to_value(message.to_chat()).ok())
        .collect()
}

pub fn last_user_index(messages: &[Message]) -> Option<usize> {
    messages.iter().rposition(|message| message.role == Role::User)
}

/// Reads Gemini-shaped `contents` back into the normalized model.
pub fn messages_from_gemini(contents: &[gemini::Content]) -> Vec<Message> {
    contents
        .iter()
        .map(|content| {
            let role = match content.role {
                Some(ContentRole::Model) => Role::Assistant,
                Some(ContentRole::User) | None => Role::User,
            };
            let parts = content
                .parts
                .iter()
                .filter(|part| part.thought != Some(true))
                .filter_map(|part| {
                    if let Some(blob) = &part.inline_data {
                        return Some(ContentPart::Image(ImageRef::Inline {
                            media_type: blob.mime_type.clone(),
                            data: blob.data.clone(),
                        }));
                    }
                    if let Some(file) = &part.file_data {
                        return Some(ContentPart::Image(ImageRef::Url(file.file_uri.clone())));
                    }
                    part.text.clone().map(ContentPart::Text)
                })
                .collect();
            Message::new(role, parts)
        })
        .collect()
}

/// Maps the conversation onto Gemini `contents` plus an optional system instruction.
pub fn messages_to_gemini(messages: &[Message]) -> (Vec<gemini::Content>, Option<gemini::Content>) {
    let mut contents = Vec::new();
    let mut system_parts = Vec::new();
    for message in messages {
        let parts: Vec<Part> = message
            .parts
            .iter()
            .map(|part| match part {
                ContentPart::Text(text) => Part::text(text.clone()),
                ContentPart::Image(ImageRef::Inline { media_type, data }) => {
                    Part::inline(media_type.clone(), data.clone())
                }
                ContentPart::Image(ImageRef::Url(url)) => Part {
                    file_data: Some(FileData {
                        mime_type: None,
                        file_uri: url.clone(),
                    }),
                    ..Part::default()
                },
            })
            .collect();
        if parts.is_empty() {
            continue;
        }
        match message.role {
            Role::System => system_parts.extend(parts),
            Role::User => contents.push(gemini::Content {
                role: Some(ContentRole::User),
                parts,
            }),
            Role::Assistant => contents.push(gemini::Content {
                role: Some(ContentRole::Model),
                parts,
            }),
        }
    }
    let system = (!system_parts.is_empty()).then(|| gemini::Content {
        role: None,
        parts: system_parts,
    });
    (contents, system)
}
