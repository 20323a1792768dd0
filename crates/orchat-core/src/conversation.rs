//! Conversation accumulator
//!
//! The only mutable core. Builds turns through a two-phase protocol
//! (`append_user` opens a turn, `append_assistant` closes it), maintains
//! running usage and cost totals, enforces budget policy, and converts to
//! and from the persisted [`Session`] record.
//!
//! Not shared across tasks; safety comes from exclusive ownership, not
//! locking.

use chrono::{DateTime, Utc};
use orchat_api::{Message, Usage};

use crate::cost;
use crate::error::ChatError;
use crate::session::{Session, Turn, SCHEMA_VERSION};

/// Placeholder stored when a completion legitimately produced no visible text
pub const EMPTY_RESPONSE_PLACEHOLDER: &str = "[empty response]";

/// In-memory conversation state for one live session
#[derive(Debug, Clone)]
pub struct Conversation {
    model: String,
    system: Option<String>,
    budget_max: Option<f64>,
    created_at: DateTime<Utc>,
    turns: Vec<Turn>,
    usage_totals: Usage,
    estimate_usd_total: f64,
    /// The user message awaiting a reply; the only uncommitted substructure
    pending_user: Option<Message>,
}

impl Conversation {
    /// Start a fresh conversation
    pub fn new(
        model: impl Into<String>,
        system: Option<String>,
        budget_max: Option<f64>,
    ) -> Result<Self, ChatError> {
        let model = model.into().trim().to_string();
        if model.is_empty() {
            return Err(ChatError::EmptyModel);
        }
        if let Some(budget) = budget_max {
            if budget < 0.0 {
                return Err(ChatError::NegativeBudget);
            }
        }
        let system = system.and_then(|s| {
            let trimmed = s.trim().to_string();
            if trimmed.is_empty() { None } else { Some(trimmed) }
        });
        Ok(Self {
            model,
            system,
            budget_max,
            created_at: Utc::now(),
            turns: Vec::new(),
            usage_totals: Usage::default(),
            estimate_usd_total: 0.0,
            pending_user: None,
        })
    }

    /// Open a turn with a user message.
    ///
    /// Fails if content is blank or a turn is already open.
    pub fn append_user(&mut self, content: &str) -> Result<(), ChatError> {
        if self.pending_user.is_some() {
            return Err(ChatError::TurnInProgress);
        }
        let message = Message::user(content).map_err(|_| ChatError::EmptyContent)?;
        self.pending_user = Some(message);
        Ok(())
    }

    /// Close the open turn with the assistant reply.
    ///
    /// Blank content is replaced with a placeholder rather than rejected:
    /// a streamed completion may legitimately yield no visible text.
    pub fn append_assistant(
        &mut self,
        content: &str,
        usage: Option<Usage>,
        latency_ms: Option<f64>,
    ) -> Result<(), ChatError> {
        let user = self.pending_user.take().ok_or(ChatError::NoTurnInProgress)?;

        let content = if content.trim().is_empty() {
            EMPTY_RESPONSE_PLACEHOLDER
        } else {
            content
        };
        // Cannot fail: placeholder substitution guarantees non-blank content
        let assistant =
            Message::assistant(content).map_err(|_| ChatError::EmptyContent)?;

        if let Some(u) = &usage {
            self.usage_totals = self.usage_totals.add(u);
        }

        self.turns.push(Turn {
            messages: vec![user, assistant],
            usage,
            latency_ms,
            cost_estimate: None,
        });
        Ok(())
    }

    /// Discard the pending user message without creating a turn.
    ///
    /// Returns whether anything was discarded. Committed turns and totals
    /// are untouched.
    pub fn abort_pending(&mut self) -> bool {
        self.pending_user.take().is_some()
    }

    /// Add to the running cost total. Monotonic: non-positive deltas are ignored.
    pub fn record_cost(&mut self, delta: f64) {
        if delta > 0.0 && delta.is_finite() {
            self.estimate_usd_total += delta;
        } else if delta != 0.0 {
            tracing::debug!(delta, "ignoring non-positive cost delta");
        }
    }

    /// Attribute a cost to the most recent turn and fold it into the total
    pub fn note_turn_cost(&mut self, cost: f64) {
        if cost < 0.0 || !cost.is_finite() {
            tracing::debug!(cost, "ignoring invalid turn cost");
            return;
        }
        if let Some(turn) = self.turns.last_mut() {
            turn.cost_estimate = Some(cost);
        }
        self.record_cost(cost);
    }

    /// Budget warning message when spend crosses 80% or 100% of the budget
    pub fn check_budget(&self) -> Option<String> {
        cost::budget_warning(self.estimate_usd_total, self.budget_max)
    }

    /// Current budget tier
    pub fn budget_status(&self) -> cost::BudgetStatus {
        cost::budget_status(self.estimate_usd_total, self.budget_max)
    }

    /// Clear turns, totals, and any pending message; keep model, system
    /// prompt, and budget configuration.
    pub fn reset(&mut self) {
        self.turns.clear();
        self.usage_totals = Usage::default();
        self.estimate_usd_total = 0.0;
        self.pending_user = None;
    }

    /// Messages to send to the API: system prompt, committed turns, and the
    /// pending user message if one is open.
    pub fn request_messages(&self) -> Vec<Message> {
        let mut messages = Vec::new();
        if let Some(system) = &self.system {
            if let Ok(msg) = Message::system(system.clone()) {
                messages.push(msg);
            }
        }
        for turn in &self.turns {
            messages.extend(turn.messages.iter().cloned());
        }
        if let Some(pending) = &self.pending_user {
            messages.push(pending.clone());
        }
        messages
    }

    /// Freeze the current state into a persistable Session.
    ///
    /// Only valid at an idle boundary: a pending turn must be finalized or
    /// aborted first, so a partial turn is never persisted.
    pub fn snapshot(&self) -> Result<Session, ChatError> {
        if self.pending_user.is_some() {
            return Err(ChatError::IncompleteTurn);
        }
        Ok(Session {
            schema_version: SCHEMA_VERSION,
            created_at: self.created_at,
            model: self.model.clone(),
            system: self.system.clone(),
            turns: self.turns.clone(),
            usage_totals: Some(self.usage_totals),
            budget_max: self.budget_max,
            estimate_usd_total: if self.estimate_usd_total > 0.0 {
                Some(self.estimate_usd_total)
            } else {
                None
            },
            meta: Default::default(),
        })
    }

    /// Rebuild accumulator state from a persisted session; the inverse of
    /// [`snapshot`](Self::snapshot).
    ///
    /// Budget metadata is read from the named fields, falling back to the
    /// open `meta` map for files written by older versions.
    pub fn restore(session: Session) -> Result<Self, ChatError> {
        let budget_max = session
            .budget_max
            .or_else(|| session.meta.get("budget_max").and_then(|v| v.as_f64()));
        let estimate = session
            .estimate_usd_total
            .or_else(|| {
                session
                    .meta
                    .get("estimate_usd_total")
                    .and_then(|v| v.as_f64())
            })
            .unwrap_or(0.0);

        let mut conversation = Self::new(&session.model, session.system.clone(), budget_max)?;
        conversation.created_at = session.created_at;
        conversation.usage_totals = session
            .usage_totals
            .unwrap_or_else(|| session.recompute_usage_totals());
        conversation.estimate_usd_total = estimate.max(0.0);
        conversation.turns = session.turns;
        Ok(conversation)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    pub fn budget_max(&self) -> Option<f64> {
        self.budget_max
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn usage_totals(&self) -> Usage {
        self.usage_totals
    }

    /// Running cost total in USD
    pub fn cost_total(&self) -> f64 {
        self.estimate_usd_total
    }

    /// Whether a user message is awaiting its reply
    pub fn is_awaiting_reply(&self) -> bool {
        self.pending_user.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchat_api::Role;

    fn conv() -> Conversation {
        Conversation::new("openai/gpt-4", None, None).unwrap()
    }

    #[test]
    fn test_new_rejects_blank_model() {
        assert_eq!(
            Conversation::new("  ", None, None).unwrap_err(),
            ChatError::EmptyModel
        );
    }

    #[test]
    fn test_new_rejects_negative_budget() {
        assert_eq!(
            Conversation::new("m", None, Some(-1.0)).unwrap_err(),
            ChatError::NegativeBudget
        );
    }

    #[test]
    fn test_new_blanks_out_empty_system() {
        let c = Conversation::new("m", Some("   ".to_string()), None).unwrap();
        assert_eq!(c.system(), None);
    }

    #[test]
    fn test_turn_pairing() {
        let mut c = conv();
        c.append_user("hi").unwrap();
        assert!(c.is_awaiting_reply());
        c.append_assistant("hello", Some(Usage::new(10, 5)), Some(120.0))
            .unwrap();
        assert!(!c.is_awaiting_reply());
        assert_eq!(c.turns().len(), 1);
        assert_eq!(c.turns()[0].messages.len(), 2);
        assert_eq!(c.turns()[0].messages[0].role, Role::User);
        assert_eq!(c.turns()[0].messages[1].role, Role::Assistant);
        assert_eq!(c.usage_totals(), Usage::new(10, 5));
    }

    #[test]
    fn test_append_assistant_without_open_turn_fails() {
        let mut c = conv();
        c.append_user("hi").unwrap();
        c.append_assistant("hello", None, None).unwrap();
        assert_eq!(
            c.append_assistant("again", None, None).unwrap_err(),
            ChatError::NoTurnInProgress
        );
    }

    #[test]
    fn test_append_user_twice_fails() {
        let mut c = conv();
        c.append_user("one").unwrap();
        assert_eq!(c.append_user("two").unwrap_err(), ChatError::TurnInProgress);
    }

    #[test]
    fn test_append_user_blank_fails() {
        let mut c = conv();
        assert_eq!(c.append_user("  \n").unwrap_err(), ChatError::EmptyContent);
    }

    #[test]
    fn test_blank_assistant_gets_placeholder() {
        let mut c = conv();
        c.append_user("hi").unwrap();
        c.append_assistant("   ", None, None).unwrap();
        assert_eq!(c.turns()[0].messages[1].content, EMPTY_RESPONSE_PLACEHOLDER);
    }

    #[test]
    fn test_abort_leaves_no_trace() {
        let mut c = conv();
        c.append_user("x").unwrap();
        assert!(c.abort_pending());
        assert!(!c.abort_pending());
        let session = c.snapshot().unwrap();
        assert!(session.turns.is_empty());
        assert_eq!(session.usage_totals, Some(Usage::default()));
    }

    #[test]
    fn test_abort_preserves_committed_turns() {
        let mut c = conv();
        c.append_user("q1").unwrap();
        c.append_assistant("a1", Some(Usage::new(5, 5)), None).unwrap();
        c.append_user("q2").unwrap();
        c.abort_pending();
        assert_eq!(c.turns().len(), 1);
        assert_eq!(c.usage_totals(), Usage::new(5, 5));
    }

    #[test]
    fn test_record_cost_is_monotonic() {
        let mut c = conv();
        c.record_cost(0.5);
        c.record_cost(-0.2);
        c.record_cost(0.25);
        assert!((c.cost_total() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_note_turn_cost_annotates_last_turn() {
        let mut c = conv();
        c.append_user("q").unwrap();
        c.append_assistant("a", Some(Usage::new(1, 1)), None).unwrap();
        c.note_turn_cost(0.01);
        assert_eq!(c.turns()[0].cost_estimate, Some(0.01));
        assert!((c.cost_total() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_check_budget_thresholds() {
        let mut c = Conversation::new("m", None, Some(1.0)).unwrap();
        assert_eq!(c.check_budget(), None);
        c.record_cost(0.85);
        assert!(c.check_budget().unwrap().contains("nearly"));
        c.record_cost(0.30);
        assert!(c.check_budget().unwrap().contains("exceeded"));
    }

    #[test]
    fn test_reset_preserves_configuration() {
        let mut c =
            Conversation::new("m", Some("sys".to_string()), Some(2.0)).unwrap();
        c.append_user("q").unwrap();
        c.append_assistant("a", Some(Usage::new(3, 4)), None).unwrap();
        c.record_cost(0.5);
        c.append_user("pending").unwrap();
        c.reset();
        assert!(c.turns().is_empty());
        assert_eq!(c.usage_totals(), Usage::default());
        assert_eq!(c.cost_total(), 0.0);
        assert!(!c.is_awaiting_reply());
        assert_eq!(c.model(), "m");
        assert_eq!(c.system(), Some("sys"));
        assert_eq!(c.budget_max(), Some(2.0));
    }

    #[test]
    fn test_snapshot_fails_mid_turn() {
        let mut c = conv();
        c.append_user("q").unwrap();
        assert_eq!(c.snapshot().unwrap_err(), ChatError::IncompleteTurn);
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let mut c = Conversation::new("m", Some("sys".to_string()), Some(3.0)).unwrap();
        c.append_user("q1").unwrap();
        c.append_assistant("a1", Some(Usage::new(10, 20)), Some(99.0))
            .unwrap();
        c.note_turn_cost(0.02);
        c.append_user("q2").unwrap();
        c.append_assistant("a2", None, None).unwrap();

        let session = c.snapshot().unwrap();
        let restored = Conversation::restore(session).unwrap();

        assert_eq!(restored.model(), c.model());
        assert_eq!(restored.system(), c.system());
        assert_eq!(restored.budget_max(), c.budget_max());
        assert_eq!(restored.turns(), c.turns());
        assert_eq!(restored.usage_totals(), c.usage_totals());
        assert!((restored.cost_total() - c.cost_total()).abs() < 1e-12);
        assert!(!restored.is_awaiting_reply());
    }

    #[test]
    fn test_restore_reads_legacy_meta_fields() {
        let mut session = Session::new("m", None);
        session
            .meta
            .insert("budget_max".to_string(), serde_json::json!(4.5));
        session
            .meta
            .insert("estimate_usd_total".to_string(), serde_json::json!(1.25));
        let c = Conversation::restore(session).unwrap();
        assert_eq!(c.budget_max(), Some(4.5));
        assert!((c.cost_total() - 1.25).abs() < 1e-12);
    }

    #[test]
    fn test_restore_recomputes_missing_totals() {
        let mut session = Session::new("m", None);
        session.turns.push(Turn {
            messages: vec![
                Message::user("q").unwrap(),
                Message::assistant("a").unwrap(),
            ],
            usage: Some(Usage::new(8, 2)),
            latency_ms: None,
            cost_estimate: None,
        });
        let c = Conversation::restore(session).unwrap();
        assert_eq!(c.usage_totals(), Usage::new(8, 2));
    }

    #[test]
    fn test_request_messages_order() {
        let mut c = Conversation::new("m", Some("sys".to_string()), None).unwrap();
        c.append_user("q1").unwrap();
        c.append_assistant("a1", None, None).unwrap();
        c.append_user("q2").unwrap();
        let messages = c.request_messages();
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(messages.last().unwrap().content, "q2");
    }
}
