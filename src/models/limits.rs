use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::models::block::SessionBlock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Pro,
    Max5x,
    Max20x,
    /// Limits come from the caller, usually a historical maximum.
    Custom,
}

impl PlanTier {
    /// Per-window presets (tokens, USD, messages) as used by Claude usage monitors.
    pub fn limits(self) -> PlanLimits {
        match self {
            PlanTier::Pro => PlanLimits::new(19_000, 18.0, 250),
            PlanTier::Max5x => PlanLimits::new(88_000, 35.0, 1_000),
            PlanTier::Max20x => PlanLimits::new(220_000, 140.0, 2_000),
            PlanTier::Custom => PlanLimits::default(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlanTier::Pro => "pro",
            PlanTier::Max5x => "max5x",
            PlanTier::Max20x => "max20x",
            PlanTier::Custom => "custom",
        }
    }
}

impl FromStr for PlanTier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pro" => Ok(PlanTier::Pro),
            "max5x" | "max_5x" | "5x" => Ok(PlanTier::Max5x),
            "max20x" | "max_20x" | "20x" => Ok(PlanTier::Max20x),
            "custom" => Ok(PlanTier::Custom),
            other => {
                anyhow::bail!("unknown plan tier '{other}' (expected pro|max5x|max20x|custom)")
            }
        }
    }
}

/// Per-window limits. A zero limit means "not configured" and always reads as 0%.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanLimits {
    #[serde(default)]
    pub token_limit: u64,
    #[serde(default)]
    pub cost_limit: f64,
    #[serde(default)]
    pub message_limit: u64,
}

impl PlanLimits {
    pub fn new(token_limit: u64, cost_limit: f64, message_limit: u64) -> Self {
        Self {
            token_limit,
            cost_limit,
            message_limit,
        }
    }

    /// Largest totals seen in any completed, non-gap block.
    pub fn from_history(blocks: &[SessionBlock]) -> Self {
        blocks
            .iter()
            .filter(|b| !b.is_gap && !b.is_active)
            .fold(PlanLimits::default(), |acc, b| PlanLimits {
                token_limit: acc.token_limit.max(b.tokens.total()),
                cost_limit: acc.cost_limit.max(b.cost.as_f64()),
                message_limit: acc.message_limit.max(b.message_count() as u64),
            })
    }

    // Priority:
    // 1) CLAUDE_PLAN_MAX_TOKENS / _COST / _MESSAGES (explicit numbers)
    // 2) CLAUDE_PLAN_TIER preset
    // Unset everything to get all-zero limits.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut limits = match env::var("CLAUDE_PLAN_TIER") {
            Ok(t) => t.parse::<PlanTier>()?.limits(),
            Err(_) => PlanLimits::default(),
        };
        if let Ok(s) = env::var("CLAUDE_PLAN_MAX_TOKENS") {
            limits.token_limit = s
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("CLAUDE_PLAN_MAX_TOKENS='{s}': {e}"))?;
        }
        if let Ok(s) = env::var("CLAUDE_PLAN_MAX_COST") {
            let v: f64 = s
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("CLAUDE_PLAN_MAX_COST='{s}': {e}"))?;
            if !v.is_finite() || v < 0.0 {
                anyhow::bail!("CLAUDE_PLAN_MAX_COST must be a non-negative number, got {s}");
            }
            limits.cost_limit = v;
        }
        if let Ok(s) = env::var("CLAUDE_PLAN_MAX_MESSAGES") {
            limits.message_limit = s
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("CLAUDE_PLAN_MAX_MESSAGES='{s}': {e}"))?;
        }
        Ok(limits)
    }
}
