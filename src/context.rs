//! # Context Module
//!
//! Live context-window usage. Unlike block totals this is a point-in-time view: the
//! token footprint of the most recent main-chain event, not a running sum.

use serde::{Deserialize, Serialize};

use crate::models::ResolvedEvent;
use crate::percentage::percentage;
use crate::pricing::PriceTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompactionStatus {
    Safe,
    Warning,
    Critical,
    Imminent,
}

impl CompactionStatus {
    pub fn from_percentage(pct: f64) -> Self {
        match pct {
            p if p < 70.0 => CompactionStatus::Safe,
            p if p < 90.0 => CompactionStatus::Warning,
            p if p < 95.0 => CompactionStatus::Critical,
            _ => CompactionStatus::Imminent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextUsage {
    pub tokens: u64,
    pub limit: u64,
    pub percentage: f64,
    pub status: CompactionStatus,
    pub model: Option<String>,
}

/// Context usage from the latest non-sidechain event, optionally restricted to one
/// session. Ties on timestamp go to the later event in input order.
pub fn latest_context(
    events: &[ResolvedEvent],
    session: Option<&str>,
    table: &PriceTable,
) -> Option<ContextUsage> {
    let last = events
        .iter()
        .filter(|e| !e.event.is_sidechain)
        .filter(|e| session.is_none_or(|s| e.event.session_key.as_deref() == Some(s)))
        .max_by_key(|e| e.ts())?;
    let tokens = last.tokens().total();
    let limit = match last.model() {
        Some(m) => table.context_limit_for(m),
        None => table.default_lookup().rates.context_limit,
    };
    let pct = percentage(tokens as f64, limit as f64, true);
    Some(ContextUsage {
        tokens,
        limit,
        percentage: pct,
        status: CompactionStatus::from_percentage(pct),
        model: last.model().map(str::to_string),
    })
}
