//! # Engine Module
//!
//! One synchronous pass from raw events to a finished [`UsageReport`]:
//! resolve costs, assemble blocks, then derive burn rate, projections and limit
//! percentages for the active block. Pure given its inputs; `now` is explicit.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::blocks::{active_block, assemble_with_rollover};
use crate::config::EngineConfig;
use crate::cost::{CostBreakdown, resolve_all};
use crate::models::{PlanLimits, SessionBlock, UsageEvent};
use crate::percentage::LimitUsage;
use crate::pricing::PriceTable;
use crate::window::{
    BurnRate, LimitKind, ProjectedUsage, burn_rate, project_block_usage, project_exhaustion,
};

/// Indicators for the block in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveBlockReport {
    pub block_id: String,
    pub burn_rate: Option<BurnRate>,
    pub projection: Option<ProjectedUsage>,
    /// Minutes until each configured limit runs out at the current pace.
    pub tokens_exhausted_in_minutes: Option<f64>,
    pub cost_exhausted_in_minutes: Option<f64>,
    pub messages_exhausted_in_minutes: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    pub generated_at: DateTime<Utc>,
    pub blocks: Vec<SessionBlock>,
    pub active: Option<ActiveBlockReport>,
    /// Clamped to 100%.
    pub limits: LimitUsage,
    /// Same figures without the clamp, so overage is visible.
    pub limits_uncapped: LimitUsage,
    pub breakdown: CostBreakdown,
    /// Some cost was priced with fallback rates (unknown or missing model).
    pub estimated_costs: bool,
}

impl UsageReport {
    pub fn active_block(&self) -> Option<&SessionBlock> {
        active_block(&self.blocks)
    }
}

fn minutes(d: Option<TimeDelta>) -> Option<f64> {
    d.map(|d| d.num_milliseconds() as f64 / 60_000.0)
}

fn exhaustion_minutes(block: &SessionBlock, configured: bool, limit: LimitKind) -> Option<f64> {
    if !configured {
        return None;
    }
    minutes(project_exhaustion(block, limit))
}

pub fn compute(
    events: &[UsageEvent],
    config: &EngineConfig,
    table: &PriceTable,
    limits: &PlanLimits,
    now: DateTime<Utc>,
) -> UsageReport {
    let span = tracing::debug_span!("compute_usage", events = events.len());
    let _guard = span.enter();

    let resolved = resolve_all(events, config.cost_mode, table, &config.default_model);
    let estimated_costs = resolved.iter().any(|e| e.estimated);
    let breakdown = CostBreakdown::from_events(&resolved);
    let blocks = assemble_with_rollover(
        &resolved,
        config.session_duration_hours,
        now,
        config.rollover,
    );

    let active_ref = active_block(&blocks);
    let active = active_ref.map(|b| ActiveBlockReport {
        block_id: b.id.clone(),
        burn_rate: burn_rate(b),
        projection: project_block_usage(b, now),
        tokens_exhausted_in_minutes: exhaustion_minutes(
            b,
            limits.token_limit > 0,
            LimitKind::Tokens(limits.token_limit),
        ),
        cost_exhausted_in_minutes: exhaustion_minutes(
            b,
            limits.cost_limit > 0.0,
            LimitKind::Cost(limits.cost_limit),
        ),
        messages_exhausted_in_minutes: exhaustion_minutes(
            b,
            limits.message_limit > 0,
            LimitKind::Messages(limits.message_limit),
        ),
    });
    let limit_usage = LimitUsage::for_block(active_ref, limits, true);
    let limits_uncapped = LimitUsage::for_block(active_ref, limits, false);

    tracing::debug!(
        blocks = blocks.len(),
        active = active.is_some(),
        estimated_costs,
        "usage computed"
    );

    UsageReport {
        generated_at: now,
        blocks,
        active,
        limits: limit_usage,
        limits_uncapped,
        breakdown,
        estimated_costs,
    }
}
