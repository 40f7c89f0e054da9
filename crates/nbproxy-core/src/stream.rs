use bytes::Bytes;
use tracing::{info, warn};

use nbproxy_protocol::sse::SseParser;

use crate::gate::GatePermit;
use crate::upstream::ByteStream;

/// Forwards an upstream event stream chunk by chunk.
///
/// Chunks pass through untouched; a parser watches the frames so the end of
/// the stream can be logged. The concurrency slot stays taken until the
/// upstream ends or the downstream goes away.
pub fn relay_stream(mut upstream: ByteStream, permit: Option<GatePermit>, url: String) -> ByteStream {
    let (tx, rx) = tokio::sync::mpsc::channel::<Bytes>(16);
    tokio::spawn(async move {
        let mut parser = SseParser::new();
        let mut frames = 0usize;
        let mut bytes = 0usize;
        let mut done = false;
        let mut error_frames = 0usize;

        while let Some(chunk) = upstream.recv().await {
            bytes += chunk.len();
            for frame in parser.push_bytes(&chunk) {
                frames += 1;
                done |= frame.is_done();
                if frame.event.as_deref() == Some("error") || frame.data.starts_with("{\"error\"") {
                    error_frames += 1;
                }
            }
            if tx.send(chunk).await.is_err() {
                warn!(event = "downstream_stream_closed", url = %url, frames, bytes);
                return;
            }
        }
        frames += parser.finish().len();
        drop(permit);

        info!(
            event = "upstream_stream_end",
            url = %url,
            frames,
            bytes,
            done,
            error_frames
        );
    });
    rx
}
