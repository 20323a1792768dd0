//! orchat-api: OpenRouter API client
//!
//! This crate provides the wire-level types shared across the workspace
//! (messages, token usage, model catalog entries) and the HTTP/SSE client
//! for OpenRouter chat completions.

pub mod client;
pub mod error;
pub mod stream;
pub mod types;

pub use client::OpenRouter;
pub use error::{Error, Result};
pub use stream::{Completion, CompletionEvent, CompletionStream};
pub use types::{InvalidValue, Message, ModelInfo, Role, Usage};
