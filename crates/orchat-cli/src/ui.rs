//! Terminal formatting helpers

use colored::Colorize;
use orchat_api::Usage;
use orchat_core::BudgetStatus;

/// Format a USD amount with precision scaled to its magnitude
pub fn format_cost(cost_usd: f64) -> String {
    if cost_usd < 0.01 {
        format!("${cost_usd:.4}")
    } else if cost_usd < 1.0 {
        format!("${cost_usd:.3}")
    } else {
        format!("${cost_usd:.2}")
    }
}

/// Format a duration in milliseconds ("456ms" / "1.23s")
pub fn format_duration(duration_ms: f64) -> String {
    if duration_ms < 1000.0 {
        format!("{duration_ms:.0}ms")
    } else {
        format!("{:.2}s", duration_ms / 1000.0)
    }
}

/// Compact token summary: "12→345 (357)"
pub fn format_tokens(usage: &Usage) -> String {
    format!(
        "{}\u{2192}{} ({})",
        usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
    )
}

/// One-line budget summary colored by tier
pub fn budget_line(current_cost: f64, budget_max: Option<f64>) -> String {
    let Some(max) = budget_max else {
        return format!("budget: {} (no limit)", format_cost(current_cost));
    };
    let percentage = if max > 0.0 {
        current_cost / max * 100.0
    } else {
        0.0
    };
    let text = format!(
        "budget: {}/{} ({percentage:.0}%)",
        format_cost(current_cost),
        format_cost(max)
    );
    match orchat_core::budget_status(current_cost, budget_max) {
        BudgetStatus::Ok | BudgetStatus::Unbounded => text.green().to_string(),
        BudgetStatus::Warning => text.yellow().to_string(),
        BudgetStatus::Critical | BudgetStatus::Exceeded => text.red().to_string(),
    }
}

/// Truncate for table display, appending an ellipsis
pub fn truncate(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_length.saturating_sub(3)).collect();
    format!("{cut}...")
}

/// Format an optional context length ("128K", "32K", "-")
pub fn format_context_length(context_length: Option<u64>) -> String {
    match context_length {
        Some(n) if n >= 1000 => format!("{}K", n / 1000),
        Some(n) => n.to_string(),
        None => "-".to_string(),
    }
}

/// Display a per-token price as dollars per million tokens
pub fn format_price_per_m(price_per_token: Option<f64>) -> String {
    match price_per_token {
        Some(p) if p == 0.0 => "free".to_string(),
        Some(p) => format!("${:.2}/M", p * 1e6),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cost_precision_tiers() {
        assert_eq!(format_cost(0.0012), "$0.0012");
        assert_eq!(format_cost(0.123), "$0.123");
        assert_eq!(format_cost(1.234), "$1.23");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(456.0), "456ms");
        assert_eq!(format_duration(1234.0), "1.23s");
    }

    #[test]
    fn test_format_tokens() {
        let usage = Usage::new(12, 345);
        assert_eq!(format_tokens(&usage), "12\u{2192}345 (357)");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long sentence", 10), "a very...");
    }

    #[test]
    fn test_format_context_length() {
        assert_eq!(format_context_length(Some(128000)), "128K");
        assert_eq!(format_context_length(Some(512)), "512");
        assert_eq!(format_context_length(None), "-");
    }

    #[test]
    fn test_format_price_per_m() {
        assert_eq!(format_price_per_m(Some(3e-6)), "$3.00/M");
        assert_eq!(format_price_per_m(Some(0.0)), "free");
        assert_eq!(format_price_per_m(None), "-");
    }
}
