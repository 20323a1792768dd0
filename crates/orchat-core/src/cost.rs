//! Token cost calculation and budget policy
//!
//! Cost is computable two ways: live, from the exact usage the API reported,
//! and retrospectively, by replaying a saved session against a possibly
//! updated catalog. The pricing lookup therefore falls back from the catalog
//! to a static table of well-known models, then to a free bucket, and only
//! then reports "unknown", which is distinct from zero.

use orchat_api::{ModelInfo, Usage};

use crate::error::InvalidPricing;
use crate::session::Session;

/// Budget ratio below which no status escalation happens
const WARNING_RATIO: f64 = 0.70;
/// Budget ratio at which the status becomes critical
const CRITICAL_RATIO: f64 = 0.90;
/// Budget ratio at which `budget_warning` starts nagging
const NAG_RATIO: f64 = 0.80;

/// Fallback per-million-token prices (prompt, completion) for well-known
/// model id prefixes, used when the catalog has no entry.
const DEFAULT_PRICING_PER_M: &[(&str, f64, f64)] = &[
    ("openai/gpt-4-turbo", 10.0, 30.0),
    ("openai/gpt-4", 30.0, 60.0),
    ("openai/gpt-3.5-turbo", 0.5, 1.5),
    ("anthropic/claude-3.5-sonnet", 3.0, 15.0),
    ("anthropic/claude-3-haiku", 0.25, 1.25),
    ("anthropic/claude-3-opus", 15.0, 75.0),
];

/// Budget consumption tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetStatus {
    /// No budget configured
    Unbounded,
    /// Below 70% of the budget
    Ok,
    /// 70–90%
    Warning,
    /// 90–100%
    Critical,
    /// At or over the budget
    Exceeded,
}

/// Cost of one exchange given per-token prices, in USD.
///
/// Pure; negative prices are rejected rather than silently producing
/// negative costs.
pub fn token_cost(
    usage: &Usage,
    price_prompt: f64,
    price_completion: f64,
) -> Result<f64, InvalidPricing> {
    if price_prompt < 0.0 || price_completion < 0.0 {
        return Err(InvalidPricing {
            prompt: price_prompt,
            completion: price_completion,
        });
    }
    Ok(usage.prompt_tokens as f64 * price_prompt + usage.completion_tokens as f64 * price_completion)
}

/// Retrospective cost of a whole session against a catalog.
///
/// Returns `None` when no pricing source applies; "no cost data" is not
/// the same as "zero cost". Turns without usage contribute nothing.
pub fn session_cost(session: &Session, catalog: &[ModelInfo]) -> Option<f64> {
    let (price_prompt, price_completion) = lookup_pricing(&session.model, catalog)?;
    let mut total = 0.0;
    for turn in &session.turns {
        if let Some(usage) = &turn.usage {
            total += token_cost(usage, price_prompt, price_completion).ok()?;
        }
    }
    Some(total)
}

/// Resolve per-token prices for a model id.
///
/// Chain: exact catalog match, static default table by id prefix, free-tier
/// marker in the id, then unknown.
pub fn lookup_pricing(model_id: &str, catalog: &[ModelInfo]) -> Option<(f64, f64)> {
    if let Some(info) = catalog.iter().find(|m| m.id == model_id) {
        if let Some(pricing) = info.pricing() {
            return Some(pricing);
        }
    }

    for (prefix, prompt_per_m, completion_per_m) in DEFAULT_PRICING_PER_M {
        if model_id == *prefix || model_id.starts_with(*prefix) {
            return Some((prompt_per_m / 1e6, completion_per_m / 1e6));
        }
    }

    if model_id.to_lowercase().contains("free") {
        return Some((0.0, 0.0));
    }

    None
}

/// Classify cumulative cost against an optional budget.
///
/// Thresholds are fixed design constants: ok below 70%, warning from 70%,
/// critical from 90%, exceeded at 100%.
pub fn budget_status(current_cost: f64, budget_max: Option<f64>) -> BudgetStatus {
    let Some(max) = budget_max else {
        return BudgetStatus::Unbounded;
    };
    if max <= 0.0 {
        return BudgetStatus::Unbounded;
    }
    let ratio = current_cost / max;
    if ratio >= 1.0 {
        BudgetStatus::Exceeded
    } else if ratio >= CRITICAL_RATIO {
        BudgetStatus::Critical
    } else if ratio >= WARNING_RATIO {
        BudgetStatus::Warning
    } else {
        BudgetStatus::Ok
    }
}

/// Human-readable warning once spend crosses 80% of the budget, or the
/// budget itself. `None` when unbounded or comfortably under.
pub fn budget_warning(current_cost: f64, budget_max: Option<f64>) -> Option<String> {
    let max = budget_max?;
    if max <= 0.0 {
        return None;
    }
    let ratio = current_cost / max;
    if ratio >= 1.0 {
        Some(format!(
            "budget exceeded: {} spent of {}",
            format_usd(current_cost),
            format_usd(max)
        ))
    } else if ratio >= NAG_RATIO {
        Some(format!(
            "budget nearly exhausted: {} of {} ({:.0}%)",
            format_usd(current_cost),
            format_usd(max),
            ratio * 100.0
        ))
    } else {
        None
    }
}

fn format_usd(amount: f64) -> String {
    if amount < 0.01 {
        format!("${amount:.4}")
    } else if amount < 1.0 {
        format!("${amount:.3}")
    } else {
        format!("${amount:.2}")
    }
}
