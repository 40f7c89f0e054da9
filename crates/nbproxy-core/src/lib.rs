pub mod classify;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod gemini;
pub mod message;
pub mod openrouter;
pub mod prompt;
pub mod result;
pub mod retry;
pub mod stream;
pub mod upstream;

pub use classify::{Classified, classify_chat_response, classify_gemini_response, classify_message};
pub use dispatch::{DispatchInput, DispatchSettings, Dispatcher, GeminiInput, Stage, StageKind, plan_stages};
pub use error::DispatchError;
pub use gate::{ConcurrencyGate, GateClosed, GatePermit};
pub use gemini::{GeminiAction, GeminiEndpoint};
pub use message::{ContentPart, ImageRef, Message, Role};
pub use openrouter::OpenRouterEndpoint;
pub use result::{GenerationMeta, GenerationOutput, GenerationResult};
pub use retry::{RetryPolicy, RetryState, is_retryable_status, send_with_retry};
pub use upstream::{
    ByteStream, Headers, UpstreamBody, UpstreamClient, UpstreamClientConfig, UpstreamFailure,
    UpstreamHttpRequest, UpstreamHttpResponse, UpstreamTransportErrorKind, WreqUpstreamClient,
    header_get,
};
