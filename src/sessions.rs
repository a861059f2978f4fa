//! Per-session rollups
//!
//! Groups resolved events by their session key so callers can show per-session
//! cost next to the billing blocks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::cost::CostBreakdown;
use crate::metrics::aggregate;
use crate::models::{ResolvedEvent, TokenCounts, Usd};

pub const UNKNOWN_SESSION: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub key: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub tokens: TokenCounts,
    pub cost: Usd,
    pub breakdown: CostBreakdown,
    pub models: BTreeSet<String>,
    pub messages: u64,
}

/// Events without a session key are filed under `fallback` (e.g. the working
/// directory), or [`UNKNOWN_SESSION`]. Most recently active session first.
pub fn group_by_session(events: &[ResolvedEvent], fallback: Option<&str>) -> Vec<SessionSummary> {
    let mut grouped: HashMap<&str, Vec<&ResolvedEvent>> = HashMap::new();
    for e in events {
        let key = e
            .event
            .session_key
            .as_deref()
            .or(fallback)
            .unwrap_or(UNKNOWN_SESSION);
        grouped.entry(key).or_default().push(e);
    }

    let mut sessions: Vec<SessionSummary> = grouped
        .into_iter()
        .filter_map(|(key, entries)| {
            let start = entries.iter().map(|e| e.ts()).min()?;
            let end = entries.iter().map(|e| e.ts()).max()?;
            let totals = aggregate(entries.iter().copied());
            Some(SessionSummary {
                key: key.to_string(),
                start,
                end,
                tokens: totals.tokens,
                cost: totals.cost,
                breakdown: CostBreakdown::from_events(entries.iter().copied()),
                models: totals.models,
                messages: totals.messages,
            })
        })
        .collect();
    sessions.sort_by(|a, b| b.end.cmp(&a.end).then_with(|| a.key.cmp(&b.key)));
    sessions
}
