//! Streaming completion events
//!
//! A completion stream is a finite, forward-only sequence of events: zero or
//! more content deltas, at most one usage record, and a terminal `Done`.
//! Consumers may stop polling at any event boundary to cancel.

use crate::error::Result;
use crate::types::Usage;
use std::pin::Pin;
use tokio_stream::Stream;

/// Events emitted while streaming a chat completion
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionEvent {
    /// A fragment of assistant content, in arrival order
    Delta { text: String },
    /// Token usage for the exchange (OpenRouter sends this in the final chunk)
    Usage { usage: Usage },
    /// End of stream
    Done,
}

/// A pull-based stream of completion events
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<CompletionEvent>> + Send>>;

/// A finished non-streaming completion
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: Option<Usage>,
}
