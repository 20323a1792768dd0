//! orchat-core: conversation state, cost accounting, and persistence
//!
//! The heart of the workspace: an accumulator that assembles turns from a
//! live exchange, the cost calculator with its pricing fallback chain, the
//! JSON session codec with path-safety checks, and the streaming consumer
//! that feeds completion fragments into the accumulator.

pub mod consumer;
pub mod conversation;
pub mod cost;
pub mod error;
pub mod session;
pub mod storage;

pub use consumer::{consume_stream, ConsumeError, TurnReport};
pub use conversation::{Conversation, EMPTY_RESPONSE_PLACEHOLDER};
pub use cost::{budget_status, budget_warning, lookup_pricing, session_cost, token_cost, BudgetStatus};
pub use error::{ChatError, InvalidPricing, StorageError};
pub use session::{Session, Turn, SCHEMA_VERSION};
