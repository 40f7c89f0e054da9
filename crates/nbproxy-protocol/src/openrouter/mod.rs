pub mod request;
pub mod types;

pub use request::ChatCompletionRequest;
pub use types::{ChatMessage, ChatRole, ContentPart, ImageUrl, MessageContent, ResponseModality};
