//! Persisted session data model
//!
//! A `Session` is the durable unit: system prompt, ordered turns, and
//! aggregate usage. Records are immutable once finalized; mutation happens
//! in the [`Conversation`](crate::conversation::Conversation) accumulator
//! and sessions are produced by snapshotting it.

use chrono::{DateTime, Utc};
use orchat_api::{Message, Role, Usage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::StorageError;

/// Highest persisted-file schema version this build understands
pub const SCHEMA_VERSION: u32 = 1;

/// One exchange: user question, assistant reply, and its metrics.
///
/// System context lives on the session, never inside a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub latency_ms: Option<f64>,
    #[serde(default)]
    pub cost_estimate: Option<f64>,
}

impl Turn {
    /// Check structural invariants, returning a description of the first violation
    pub fn validate(&self) -> Result<(), String> {
        if self.messages.is_empty() {
            return Err("turn must contain at least one message".to_string());
        }
        for msg in &self.messages {
            if msg.role == Role::System {
                return Err("system messages must not appear inside a turn".to_string());
            }
            if msg.content.trim().is_empty() {
                return Err("turn contains a blank message".to_string());
            }
        }
        if let Some(usage) = &self.usage {
            if !usage.is_consistent() {
                return Err(format!(
                    "turn usage total_tokens ({}) != prompt + completion ({})",
                    usage.total_tokens,
                    usage.prompt_tokens + usage.completion_tokens
                ));
            }
        }
        if let Some(latency) = self.latency_ms {
            if latency < 0.0 {
                return Err("turn latency_ms must not be negative".to_string());
            }
        }
        if let Some(cost) = self.cost_estimate {
            if cost < 0.0 {
                return Err("turn cost_estimate must not be negative".to_string());
            }
        }
        Ok(())
    }
}

/// A full persisted conversation.
///
/// Budget and running cost are first-class optional fields; `meta` remains
/// an open map for genuinely unanticipated extensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    pub model: String,
    pub system: Option<String>,
    #[serde(default)]
    pub turns: Vec<Turn>,
    pub usage_totals: Option<Usage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate_usd_total: Option<f64>,
    #[serde(default)]
    pub meta: BTreeMap<String, serde_json::Value>,
}

impl Session {
    /// Create an empty session for a model
    pub fn new(model: impl Into<String>, system: Option<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            created_at: Utc::now(),
            model: model.into(),
            system,
            turns: Vec::new(),
            usage_totals: None,
            budget_max: None,
            estimate_usd_total: None,
            meta: BTreeMap::new(),
        }
    }

    /// Validate structural invariants after deserialization.
    ///
    /// The schema version gate is applied separately by the codec so the
    /// caller can distinguish "newer file" from "broken file".
    pub fn validate(&self) -> Result<(), StorageError> {
        if self.model.trim().is_empty() {
            return Err(StorageError::SchemaViolation(
                "model must not be blank".to_string(),
            ));
        }
        for (i, turn) in self.turns.iter().enumerate() {
            turn.validate()
                .map_err(|e| StorageError::SchemaViolation(format!("turn {i}: {e}")))?;
        }
        if let Some(totals) = &self.usage_totals {
            if !totals.is_consistent() {
                return Err(StorageError::SchemaViolation(
                    "usage_totals total_tokens != prompt + completion".to_string(),
                ));
            }
            let recomputed = self.recompute_usage_totals();
            if *totals != recomputed {
                return Err(StorageError::SchemaViolation(format!(
                    "usage_totals ({}/{}/{}) does not match the per-turn sum ({}/{}/{})",
                    totals.prompt_tokens,
                    totals.completion_tokens,
                    totals.total_tokens,
                    recomputed.prompt_tokens,
                    recomputed.completion_tokens,
                    recomputed.total_tokens,
                )));
            }
        }
        if let Some(budget) = self.budget_max {
            if budget < 0.0 {
                return Err(StorageError::SchemaViolation(
                    "budget_max must not be negative".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Element-wise sum of usage across turns; turns without usage contribute zero
    pub fn recompute_usage_totals(&self) -> Usage {
        self.turns
            .iter()
            .filter_map(|t| t.usage.as_ref())
            .fold(Usage::default(), |acc, u| acc.add(u))
    }

    /// All messages in chronological order, system prompt first
    pub fn all_messages(&self) -> Vec<Message> {
        let mut messages = Vec::new();
        if let Some(system) = &self.system {
            if let Ok(msg) = Message::system(system.clone()) {
                messages.push(msg);
            }
        }
        for turn in &self.turns {
            messages.extend(turn.messages.iter().cloned());
        }
        messages
    }

    /// Sum of stored per-turn cost estimates; None when no turn carries one
    pub fn stored_cost(&self) -> Option<f64> {
        let costs: Vec<f64> = self.turns.iter().filter_map(|t| t.cost_estimate).collect();
        if costs.is_empty() {
            None
        } else {
            Some(costs.iter().sum())
        }
    }
}
