//! Upstream stream relay.
//!
//! Reads the upstream byte stream, reassembles complete SSE events on the
//! `\n\n` boundary, and forwards them to the client through a channel-backed
//! body. When the selected adapter re-frames the stream, each complete event
//! passes through `transform_stream` and events that transform to nothing
//! are skipped; otherwise bytes relay verbatim.

use std::io;
use std::sync::Arc;

use axum::body::Body;
use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::adapter::{AdapterEnum, FormatAdapter};

const EVENT_DELIMITER: &[u8] = b"\n\n";

/// Spawns the relay task and returns the client-facing body. The task ends
/// when the upstream is exhausted, a read fails, or the client disconnects
/// (the receiver is dropped); dropping the upstream response aborts the
/// outbound connection, so client cancellation propagates.
pub fn relay_sse_stream(response: reqwest::Response, adapter: Arc<AdapterEnum>) -> Body {
    let (tx, rx) = mpsc::channel::<Result<Bytes, io::Error>>(32);

    tokio::spawn(async move {
        let mut response = response;
        let mut buffer = BytesMut::with_capacity(8192);
        let reframe = adapter.reframes_stream();

        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    if !reframe {
                        if tx.send(Ok(chunk)).await.is_err() {
                            return;
                        }
                        continue;
                    }

                    buffer.extend_from_slice(&chunk);
                    while let Some(pos) = memchr::memmem::find(&buffer, EVENT_DELIMITER) {
                        let event = buffer.split_to(pos + EVENT_DELIMITER.len()).freeze();
                        let text = String::from_utf8_lossy(&event);
                        if let Some(reframed) = adapter.transform_stream(&text) {
                            if tx.send(Ok(Bytes::from(reframed))).await.is_err() {
                                return;
                            }
                        }
                    }
                }
                Ok(None) => {
                    if reframe && !buffer.is_empty() {
                        let text = String::from_utf8_lossy(&buffer);
                        if let Some(reframed) = adapter.transform_stream(&text) {
                            let _ = tx.send(Ok(Bytes::from(reframed))).await;
                        }
                    }
                    return;
                }
                Err(e) => {
                    log::error!("upstream stream read failed: {}", e);
                    return;
                }
            }
        }
    });

    Body::from_stream(ReceiverStream::new(rx))
}
