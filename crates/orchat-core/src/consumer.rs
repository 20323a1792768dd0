//! Streaming consumer
//!
//! Drives a completion stream and feeds the conversation accumulator.
//! Fragments are concatenated in arrival order; the final usage record, if
//! any, is captured for the turn. Cancellation is observed at every event
//! boundary and always returns the accumulator to idle through the abort
//! path, so no partial turn survives an interrupted exchange.

use std::time::Instant;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use orchat_api::{CompletionEvent, CompletionStream, Error as ApiError, Usage};

use crate::conversation::Conversation;
use crate::error::ChatError;

/// Result of consuming one completion stream into a finalized turn
#[derive(Debug)]
pub struct TurnReport {
    /// Assistant content as streamed (may be empty; the stored turn then
    /// carries the placeholder)
    pub content: String,
    /// Usage captured from the stream, if the provider sent one
    pub usage: Option<Usage>,
    /// Wall-clock time from first poll to finalization
    pub latency_ms: f64,
    /// Set when the stream failed after partial content was received;
    /// the turn is still committed with what arrived
    pub transport_error: Option<ApiError>,
}

impl TurnReport {
    /// Whether the stream terminated cleanly
    pub fn is_complete(&self) -> bool {
        self.transport_error.is_none()
    }
}

/// Failures that leave no committed turn behind
#[derive(Debug, thiserror::Error)]
pub enum ConsumeError {
    /// Stream failed before any content arrived
    #[error(transparent)]
    Transport(#[from] ApiError),

    /// Caller cancelled the stream
    #[error("streaming cancelled")]
    Cancelled,

    /// Accumulator misuse (no turn open when finalizing)
    #[error(transparent)]
    Chat(#[from] ChatError),
}

/// Consume a completion stream, finalizing the open turn on the
/// conversation.
///
/// `on_delta` is invoked for every content fragment as it arrives, in
/// order. A transport failure after at least one fragment finalizes the
/// turn with the partial content (a degraded answer beats none) and
/// reports the error in the returned [`TurnReport`]; a failure before any
/// fragment aborts the pending turn and propagates. Cancellation aborts
/// the pending turn and returns [`ConsumeError::Cancelled`].
pub async fn consume_stream(
    conversation: &mut Conversation,
    mut stream: CompletionStream,
    cancel: &CancellationToken,
    mut on_delta: impl FnMut(&str),
) -> Result<TurnReport, ConsumeError> {
    let started = Instant::now();
    let mut content = String::new();
    let mut usage: Option<Usage> = None;
    let mut transport_error: Option<ApiError> = None;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                conversation.abort_pending();
                return Err(ConsumeError::Cancelled);
            }
            event = stream.next() => match event {
                None | Some(Ok(CompletionEvent::Done)) => break,
                Some(Ok(CompletionEvent::Delta { text })) => {
                    on_delta(&text);
                    content.push_str(&text);
                }
                Some(Ok(CompletionEvent::Usage { usage: u })) => {
                    usage = Some(u);
                }
                Some(Err(e)) => {
                    if content.is_empty() {
                        conversation.abort_pending();
                        return Err(e.into());
                    }
                    tracing::warn!(error = %e, "stream failed mid-response, keeping partial content");
                    transport_error = Some(e);
                    break;
                }
            }
        }
    }

    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
    conversation.append_assistant(&content, usage, Some(latency_ms))?;

    Ok(TurnReport {
        content,
        usage,
        latency_ms,
        transport_error,
    })
}
