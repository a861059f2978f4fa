//! # Cost Module
//!
//! Assigns a USD cost to every usage event according to a [`CostMode`].
//!
//! - `auto` (default): the log's own cost when it is positive, otherwise calculated
//! - `calculate`: always tokens x rates, ignoring the log
//! - `display`: the log's own cost, zero when absent

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::models::{CostSource, ResolvedEvent, TokenCounts, UsageEvent, Usd};
use crate::pricing::{ModelRates, PriceTable};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostMode {
    #[default]
    Auto,
    Calculate,
    Display,
}

impl FromStr for CostMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(CostMode::Auto),
            "calculate" | "calc" => Ok(CostMode::Calculate),
            "display" => Ok(CostMode::Display),
            other => anyhow::bail!("unknown cost mode '{other}' (expected auto|calculate|display)"),
        }
    }
}

/// Tokens x per-token rates. Each product is exact before summing.
pub fn cost_from_tokens(tokens: &TokenCounts, rates: &ModelRates) -> Usd {
    rates.input.times(tokens.input)
        + rates.output.times(tokens.output)
        + rates.cache_creation.times(tokens.cache_creation)
        + rates.cache_read.times(tokens.cache_read)
}

/// Cost of a single event. Events without a model are priced at the table's default.
pub fn resolve(event: &UsageEvent, mode: CostMode, table: &PriceTable) -> Usd {
    resolve_event(event.clone(), mode, table, table.default_model()).cost
}

/// Attach a cost to an event. `default_model` stands in for a missing model id.
pub fn resolve_event(
    event: UsageEvent,
    mode: CostMode,
    table: &PriceTable,
    default_model: &str,
) -> ResolvedEvent {
    let precomputed = event.usable_precomputed_cost();
    let (cost, cost_source, estimated) = match (mode, precomputed) {
        (CostMode::Display, Some(c)) => (Usd::from_f64(c), CostSource::Precomputed, false),
        (CostMode::Display, None) => (Usd::ZERO, CostSource::Missing, false),
        (CostMode::Auto, Some(c)) if c > 0.0 => (Usd::from_f64(c), CostSource::Precomputed, false),
        (CostMode::Auto, _) | (CostMode::Calculate, _) => {
            let model = event.model.as_deref();
            let hit = table.lookup(model.unwrap_or(default_model));
            (
                cost_from_tokens(&event.tokens, &hit.rates),
                CostSource::Calculated,
                hit.fallback || model.is_none(),
            )
        }
    };
    ResolvedEvent {
        event,
        cost,
        cost_source,
        estimated,
    }
}

pub fn resolve_all(
    events: &[UsageEvent],
    mode: CostMode,
    table: &PriceTable,
    default_model: &str,
) -> Vec<ResolvedEvent> {
    events
        .iter()
        .map(|e| resolve_event(e.clone(), mode, table, default_model))
        .collect()
}

/// How much of a total came from the log versus the price table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub total: Usd,
    pub precomputed: Usd,
    pub calculated: Usd,
    pub percent_precomputed: f64,
}

impl CostBreakdown {
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a ResolvedEvent>) -> Self {
        let (precomputed, calculated) =
            events
                .into_iter()
                .fold((Usd::ZERO, Usd::ZERO), |(p, c), e| match e.cost_source {
                    CostSource::Precomputed => (p + e.cost, c),
                    CostSource::Calculated => (p, c + e.cost),
                    CostSource::Missing => (p, c),
                });
        let total = precomputed + calculated;
        let percent_precomputed = if total.is_zero() {
            0.0
        } else {
            (precomputed.as_decimal() / total.as_decimal() * Decimal::ONE_HUNDRED)
                .to_f64()
                .unwrap_or(0.0)
        };
        Self {
            total,
            precomputed,
            calculated,
            percent_precomputed,
        }
    }
}
