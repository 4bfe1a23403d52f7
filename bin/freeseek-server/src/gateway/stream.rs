//! Upstream SSE body parsing.
//!
//! Runs as a background task per completion: decodes the event-stream body
//! incrementally and forwards text deltas over the event channel. Stops as
//! soon as the receiver is dropped so an abandoned turn does not keep
//! consuming the upstream connection.

use futures::StreamExt;
use tokio::sync::mpsc;

use freeseek_types::sse::SseDecoder;

use super::{CompletionChunk, CompletionEvent};

pub(super) async fn relay_sse_body(
    response: reqwest::Response,
    tx: mpsc::Sender<CompletionEvent>,
) {
    let mut body = response.bytes_stream();
    let mut decoder = SseDecoder::new();

    while let Some(chunk_result) = body.next().await {
        let bytes = match chunk_result {
            Ok(b) => b,
            Err(e) => {
                let _ = tx
                    .send(CompletionEvent::Error(format!("stream error: {e}")))
                    .await;
                return;
            }
        };

        for payload in decoder.push(&bytes) {
            // The protocol signals end of stream with [DONE].
            if payload.trim() == "[DONE]" {
                let _ = tx.send(CompletionEvent::Done).await;
                return;
            }

            match serde_json::from_str::<CompletionChunk>(&payload) {
                Ok(chunk) => {
                    let content = chunk
                        .choices
                        .first()
                        .and_then(|c| c.delta.content.as_deref())
                        .unwrap_or_default();
                    if !content.is_empty()
                        && tx
                            .send(CompletionEvent::Delta(content.to_owned()))
                            .await
                            .is_err()
                    {
                        return; // receiver dropped
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to parse completion SSE payload");
                }
            }
        }
    }

    // Upstream closed without [DONE]; treat whatever arrived as complete.
    let _ = tx.send(CompletionEvent::Done).await;
}
