//! Error types for orchat-core
//!
//! Each component boundary gets its own tagged error kind so callers can
//! pattern-match a recovery strategy: validation and state-machine misuse
//! (`ChatError`), pricing input errors (`InvalidPricing`), and persistence
//! failures (`StorageError`).

use std::path::PathBuf;
use thiserror::Error;

/// Accumulator validation and state-machine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// User message content is blank
    #[error("message content must not be blank")]
    EmptyContent,

    /// `append_user` called while a turn is already open
    #[error("a turn is already in progress; finish it with append_assistant or abort it")]
    TurnInProgress,

    /// `append_assistant` called with no open turn
    #[error("no turn in progress; start one with append_user")]
    NoTurnInProgress,

    /// Snapshot requested while a turn is open
    #[error("cannot snapshot a session while a turn is in progress")]
    IncompleteTurn,

    /// Model id is blank
    #[error("model id must not be blank")]
    EmptyModel,

    /// Budget below zero
    #[error("budget must not be negative")]
    NegativeBudget,
}

/// Rejected pricing input for cost calculation
#[derive(Error, Debug, Clone, PartialEq)]
#[error("per-token prices must not be negative (prompt {prompt}, completion {completion})")]
pub struct InvalidPricing {
    pub prompt: f64,
    pub completion: f64,
}

/// Persistence failures, surfaced verbatim; corrupt files are never repaired
#[derive(Error, Debug)]
pub enum StorageError {
    /// Session file does not exist
    #[error("session file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Expected a file, found something else
    #[error("not a file: {}", .0.display())]
    NotAFile(PathBuf),

    /// Expected a directory, found something else
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// Resolved path falls outside the allowed roots
    #[error("path escapes the allowed root: {}", .0.display())]
    PathEscape(PathBuf),

    /// File is not valid JSON (including truncated writes)
    #[error("malformed session JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    /// Parsed JSON violates a structural invariant
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// File was written by a newer codec
    #[error("unsupported schema version {found} (this build understands up to {supported})")]
    UnsupportedSchemaVersion { found: u32, supported: u32 },

    /// Underlying filesystem failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
