//! # Blocks Module
//!
//! Partitions a stream of cost-resolved events into fixed-length billing blocks.
//!
//! A block opens at the first event's timestamp floored to the hour and runs for the
//! session duration (5h by default). An event opens a new block when either
//! - more than one session duration passed since the previous event (a *gap*; a
//!   synthetic gap block covering `[last + duration, next)` is emitted), or
//! - more than one session duration passed since the block start (the window
//!   rolled over during continuous use; see [`WindowRollover`]).

use chrono::{DateTime, Duration, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::metrics::aggregate;
use crate::models::{ResolvedEvent, SessionBlock, TokenCounts, Usd};
use crate::utils::{
    DEFAULT_SESSION_DURATION_HOURS, floor_to_hour, hours_to_duration, saturating_add,
};

pub const DEFAULT_RECENT_DAYS: i64 = 3;

/// What happens when continuous use crosses a window boundary without a pause
/// longer than the session duration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowRollover {
    /// Start the next block, no gap block.
    #[default]
    Split,
    /// Start the next block and, when the new floored start lies after the old
    /// block's end, cover the idle hours in between with a gap block.
    SplitWithGap,
}

impl FromStr for WindowRollover {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "split" => Ok(WindowRollover::Split),
            "gap" | "split_with_gap" | "split-with-gap" => Ok(WindowRollover::SplitWithGap),
            other => anyhow::bail!("unknown window rollover '{other}' (expected split|gap)"),
        }
    }
}

/// Session length, substituting the default for unusable values.
pub fn session_duration(hours: f64) -> Duration {
    hours_to_duration(hours).unwrap_or_else(|| {
        tracing::warn!(hours, "invalid session duration, using default");
        TimeDelta::hours(DEFAULT_SESSION_DURATION_HOURS as i64)
    })
}

/// `duration` unless adding it to the latest event overflows, then the default.
fn fitting_duration(duration: Duration, latest: DateTime<Utc>) -> Duration {
    if latest.checked_add_signed(duration).is_some() {
        return duration;
    }
    tracing::warn!(%latest, "session duration overflows the event range, using default");
    TimeDelta::hours(DEFAULT_SESSION_DURATION_HOURS as i64)
}

/// Blocks for `events` with the default [`WindowRollover::Split`] policy.
pub fn assemble(
    events: &[ResolvedEvent],
    session_duration_hours: f64,
    now: DateTime<Utc>,
) -> Vec<SessionBlock> {
    assemble_with_rollover(events, session_duration_hours, now, WindowRollover::Split)
}

struct OpenBlock {
    start: DateTime<Utc>,
    entries: Vec<ResolvedEvent>,
}

impl OpenBlock {
    fn last_ts(&self) -> Option<DateTime<Utc>> {
        self.entries.last().map(|e| e.ts())
    }
}

pub fn assemble_with_rollover(
    events: &[ResolvedEvent],
    session_duration_hours: f64,
    now: DateTime<Utc>,
    rollover: WindowRollover,
) -> Vec<SessionBlock> {
    if events.is_empty() {
        return Vec::new();
    }
    // stable: equal timestamps keep input order
    let mut sorted: Vec<&ResolvedEvent> = events.iter().collect();
    sorted.sort_by_key(|e| e.ts());

    let latest = sorted.last().map(|e| e.ts()).unwrap_or(now);
    let duration = fitting_duration(session_duration(session_duration_hours), latest);

    let (mut blocks, open) = sorted.into_iter().fold(
        (Vec::new(), None::<OpenBlock>),
        |(mut blocks, open), e| {
            let ts = e.ts();
            let open = match open {
                None => OpenBlock {
                    start: floor_to_hour(ts),
                    entries: vec![e.clone()],
                },
                Some(mut cur) => {
                    let last = cur.last_ts().unwrap_or(cur.start);
                    if ts - last > duration {
                        blocks.push(close_block(cur.start, cur.entries, now, duration));
                        blocks.push(gap_block(saturating_add(last, duration), ts));
                        OpenBlock {
                            start: floor_to_hour(ts),
                            entries: vec![e.clone()],
                        }
                    } else if ts - cur.start > duration {
                        let prev_end = saturating_add(cur.start, duration);
                        let next_start = floor_to_hour(ts);
                        blocks.push(close_block(cur.start, cur.entries, now, duration));
                        if rollover == WindowRollover::SplitWithGap && next_start > prev_end {
                            blocks.push(gap_block(prev_end, next_start));
                        }
                        OpenBlock {
                            start: next_start,
                            entries: vec![e.clone()],
                        }
                    } else {
                        cur.entries.push(e.clone());
                        cur
                    }
                }
            };
            (blocks, Some(open))
        },
    );
    if let Some(cur) = open {
        blocks.push(close_block(cur.start, cur.entries, now, duration));
    }
    tracing::debug!(
        events = events.len(),
        blocks = blocks.len(),
        gaps = blocks.iter().filter(|b| b.is_gap).count(),
        "assembled billing blocks"
    );
    blocks
}

fn close_block(
    start: DateTime<Utc>,
    entries: Vec<ResolvedEvent>,
    now: DateTime<Utc>,
    duration: Duration,
) -> SessionBlock {
    let end = saturating_add(start, duration);
    let actual_end = entries.last().map(|e| e.ts()).unwrap_or(start);
    let is_active = now - actual_end < duration && now < end;
    let totals = aggregate(&entries);
    SessionBlock {
        id: start.to_rfc3339(),
        start,
        end,
        actual_end: Some(actual_end),
        is_active,
        is_gap: false,
        entries,
        tokens: totals.tokens,
        cost: totals.cost,
        models: totals.models,
    }
}

fn gap_block(start: DateTime<Utc>, end: DateTime<Utc>) -> SessionBlock {
    SessionBlock {
        id: format!("gap-{}", start.to_rfc3339()),
        start,
        end,
        actual_end: None,
        is_active: false,
        is_gap: true,
        entries: Vec::new(),
        tokens: TokenCounts::default(),
        cost: Usd::ZERO,
        models: BTreeSet::new(),
    }
}

/// The block currently in progress, if any.
pub fn active_block(blocks: &[SessionBlock]) -> Option<&SessionBlock> {
    blocks.iter().rev().find(|b| b.is_active && !b.is_gap)
}

/// Blocks started within the last `days` (default 3), plus any active block.
/// A window too large to represent keeps everything.
pub fn recent_blocks(
    blocks: &[SessionBlock],
    now: DateTime<Utc>,
    days: Option<i64>,
) -> Vec<SessionBlock> {
    let cutoff = TimeDelta::try_days(days.unwrap_or(DEFAULT_RECENT_DAYS))
        .and_then(|window| now.checked_sub_signed(window));
    blocks
        .iter()
        .filter(|b| b.is_active || cutoff.is_none_or(|c| b.start >= c))
        .cloned()
        .collect()
}
