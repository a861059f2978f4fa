use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::block::TokenCounts;
use crate::models::money::Usd;

/// One usage record emitted by the assistant. Parse validity is the caller's job;
/// only the token and cost values are re-checked here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub tokens: TokenCounts,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(
        rename = "costUSD",
        default,
        deserialize_with = "crate::utils::deserialize_cost"
    )]
    pub precomputed_cost_usd: Option<f64>,
    #[serde(rename = "sessionId", default)]
    pub session_key: Option<String>,
    /// Side-branch (sub-agent) traffic; counted in totals but never as the live context.
    #[serde(default)]
    pub is_sidechain: bool,
}

impl UsageEvent {
    pub fn new(timestamp: DateTime<Utc>, tokens: TokenCounts) -> Self {
        Self {
            timestamp,
            tokens,
            model: None,
            precomputed_cost_usd: None,
            session_key: None,
            is_sidechain: false,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_cost(mut self, cost_usd: f64) -> Self {
        self.precomputed_cost_usd = Some(cost_usd);
        self
    }

    pub fn with_session(mut self, key: impl Into<String>) -> Self {
        self.session_key = Some(key.into());
        self
    }

    pub fn sidechain(mut self) -> Self {
        self.is_sidechain = true;
        self
    }

    /// The precomputed cost when it is usable: finite and non-negative.
    pub fn usable_precomputed_cost(&self) -> Option<f64> {
        self.precomputed_cost_usd
            .filter(|c| c.is_finite() && *c >= 0.0)
    }
}

/// Where a resolved cost came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostSource {
    /// Taken from the log's own cost field.
    Precomputed,
    /// Computed from token counts and the price table.
    Calculated,
    /// Display mode with no cost in the log.
    Missing,
}

/// A usage event with its final cost attached.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEvent {
    #[serde(flatten)]
    pub event: UsageEvent,
    pub cost: Usd,
    pub cost_source: CostSource,
    /// The price table had no entry for the model and the default rates were used.
    pub estimated: bool,
}

impl ResolvedEvent {
    pub fn ts(&self) -> DateTime<Utc> {
        self.event.timestamp
    }

    pub fn tokens(&self) -> &TokenCounts {
        &self.event.tokens
    }

    pub fn model(&self) -> Option<&str> {
        self.event.model.as_deref()
    }
}
