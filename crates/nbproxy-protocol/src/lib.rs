//! Wire types for the two upstream families nbproxy talks to.
//!
//! Only the fields the proxy reads or writes are modelled. Anything the proxy
//! forwards verbatim stays as `serde_json::Value`.

pub mod gemini;
pub mod openrouter;
pub mod sse;
