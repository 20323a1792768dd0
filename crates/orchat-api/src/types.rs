//! Core types for chat exchanges and the model catalog

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation failures for value construction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidValue {
    /// Message content is empty or whitespace-only
    #[error("message content must not be blank")]
    EmptyContent,

    /// Token counts do not add up
    #[error("total_tokens ({total}) must equal prompt_tokens + completion_tokens ({prompt} + {completion})")]
    TokenTotalMismatch {
        prompt: u64,
        completion: u64,
        total: u64,
    },

    /// Model identifier is empty or whitespace-only
    #[error("model id must not be blank")]
    EmptyModelId,
}

/// Message roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Get the wire name for this role
    pub fn name(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single message in a conversation.
///
/// Immutable once constructed; content is trimmed and guaranteed non-blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a message, rejecting blank content
    pub fn new(role: Role, content: impl Into<String>) -> Result<Self, InvalidValue> {
        let content = content.into();
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(InvalidValue::EmptyContent);
        }
        Ok(Self {
            role,
            content: trimmed.to_string(),
        })
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Result<Self, InvalidValue> {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Result<Self, InvalidValue> {
        Self::new(Role::Assistant, content)
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Result<Self, InvalidValue> {
        Self::new(Role::System, content)
    }
}

/// Token usage for one API exchange.
///
/// Invariant: `total_tokens == prompt_tokens + completion_tokens`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    /// Build from prompt/completion counts; the total is derived
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Build from all three counts, rejecting an inconsistent total
    pub fn from_parts(
        prompt_tokens: u64,
        completion_tokens: u64,
        total_tokens: u64,
    ) -> Result<Self, InvalidValue> {
        if total_tokens != prompt_tokens + completion_tokens {
            return Err(InvalidValue::TokenTotalMismatch {
                prompt: prompt_tokens,
                completion: completion_tokens,
                total: total_tokens,
            });
        }
        Ok(Self {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        })
    }

    /// Check the total invariant (used when validating deserialized data)
    pub fn is_consistent(&self) -> bool {
        self.total_tokens == self.prompt_tokens + self.completion_tokens
    }

    /// Element-wise sum of two usage records
    pub fn add(&self, other: &Usage) -> Usage {
        Usage {
            prompt_tokens: self.prompt_tokens + other.prompt_tokens,
            completion_tokens: self.completion_tokens + other.completion_tokens,
            total_tokens: self.total_tokens + other.total_tokens,
        }
    }
}

/// Catalog metadata for a model, as reported by OpenRouter.
///
/// Pricing is USD per token and may be absent for free or unknown models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub context_length: Option<u64>,
    #[serde(default)]
    pub pricing_prompt: Option<f64>,
    #[serde(default)]
    pub pricing_completion: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ModelInfo {
    /// Create a catalog entry, rejecting a blank id
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidValue> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(InvalidValue::EmptyModelId);
        }
        Ok(Self {
            id: trimmed.to_string(),
            context_length: None,
            pricing_prompt: None,
            pricing_completion: None,
            description: None,
        })
    }

    /// Both per-token prices, when available
    pub fn pricing(&self) -> Option<(f64, f64)> {
        match (self.pricing_prompt, self.pricing_completion) {
            (Some(p), Some(c)) => Some((p, c)),
            _ => None,
        }
    }
}
