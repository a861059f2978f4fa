//! # Percentage Module
//!
//! Usage as a percentage of configured plan limits.

use serde::{Deserialize, Serialize};

use crate::blocks::active_block;
use crate::models::{PlanLimits, PlanTier, SessionBlock};
use crate::window::LimitKind;

/// `current / limit * 100`. A missing or non-positive limit reads as 0, never as
/// "fully used". With `capped_at_100` the result is clamped to `[0, 100]`,
/// otherwise overage shows through.
pub fn percentage(current: f64, limit: f64, capped_at_100: bool) -> f64 {
    if !limit.is_finite() || limit <= 0.0 || !current.is_finite() {
        return 0.0;
    }
    let value = (current / limit * 100.0).max(0.0);
    if capped_at_100 { value.min(100.0) } else { value }
}

/// Percentages for each plan limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LimitUsage {
    pub tokens_percent: f64,
    pub cost_percent: f64,
    pub messages_percent: f64,
}

impl LimitUsage {
    /// All zeros without an active block; historical data is never substituted.
    pub fn for_block(block: Option<&SessionBlock>, limits: &PlanLimits, capped: bool) -> Self {
        let Some(block) = block.filter(|b| b.is_active && !b.is_gap) else {
            return LimitUsage::default();
        };
        LimitUsage {
            tokens_percent: percentage(
                block.tokens.total() as f64,
                limits.token_limit as f64,
                capped,
            ),
            cost_percent: percentage(block.cost.as_f64(), limits.cost_limit, capped),
            messages_percent: percentage(
                block.message_count() as f64,
                limits.message_limit as f64,
                capped,
            ),
        }
    }

    /// The most pressing of the three.
    pub fn max(&self) -> f64 {
        self.tokens_percent
            .max(self.cost_percent)
            .max(self.messages_percent)
    }
}

/// Percentage of one limit consumed by the active block, 0 if none is active.
pub fn active_percentage(blocks: &[SessionBlock], limit: LimitKind, capped: bool) -> f64 {
    let Some(block) = active_block(blocks) else {
        return 0.0;
    };
    match limit {
        LimitKind::Tokens(l) => percentage(block.tokens.total() as f64, l as f64, capped),
        LimitKind::Cost(l) => percentage(block.cost.as_f64(), l, capped),
        LimitKind::Messages(l) => percentage(block.message_count() as f64, l as f64, capped),
    }
}

/// Smallest preset whose token limit covers `window_tokens`.
pub fn detect_plan_tier(window_tokens: u64) -> Option<PlanTier> {
    if window_tokens == 0 {
        return None;
    }
    [PlanTier::Pro, PlanTier::Max5x]
        .into_iter()
        .find(|t| window_tokens <= t.limits().token_limit)
        .or(Some(PlanTier::Max20x))
}
