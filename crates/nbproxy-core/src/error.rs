use crate::gate::GateClosed;
use crate::upstream::{Headers, UpstreamFailure};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No HTTP response after the retry budget was spent.
    #[error("Network error: {0}")]
    Transport(#[from] UpstreamFailure),
    /// Upstream answered, but not with a 2xx.
    #[error("upstream returned status {status}")]
    Status {
        status: u16,
        headers: Headers,
        body: String,
    },
    #[error("failed to encode upstream request: {0}")]
    Encode(String),
    #[error("Invalid upstream JSON: {0}")]
    InvalidJson(String),
    #[error(transparent)]
    GateClosed(#[from] GateClosed),
}
