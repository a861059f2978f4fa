//! # Window Module
//!
//! Burn rates and projections for a billing block.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{SessionBlock, Usd};
use crate::utils::minutes_between;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BurnRate {
    pub tokens_per_minute: f64,
    /// Input+output only; the rate worth watching since cache tokens are discounted.
    pub tokens_per_minute_excluding_cache: f64,
    pub cost_per_hour: f64,
    pub messages_per_minute: f64,
}

/// Minutes between the block's first and last event.
fn active_minutes(block: &SessionBlock) -> Option<f64> {
    let first = block.first_event_time()?;
    let last = block.actual_end?;
    Some(minutes_between(first, last))
}

/// `None` for gap blocks, empty blocks, and blocks whose events all share one
/// instant ("no data" rather than a zero or infinite rate).
pub fn burn_rate(block: &SessionBlock) -> Option<BurnRate> {
    if block.is_gap || block.entries.is_empty() {
        return None;
    }
    let minutes = active_minutes(block)?;
    if minutes <= 0.0 {
        return None;
    }
    Some(BurnRate {
        tokens_per_minute: block.tokens.total() as f64 / minutes,
        tokens_per_minute_excluding_cache: block.tokens.non_cache() as f64 / minutes,
        cost_per_hour: (block.cost.as_f64() / minutes) * 60.0,
        messages_per_minute: block.message_count() as f64 / minutes,
    })
}

/// A quantity to project against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "limit")]
pub enum LimitKind {
    Tokens(u64),
    /// USD
    Cost(f64),
    Messages(u64),
}

/// Time until `limit` is reached at the current burn rate.
///
/// `None` when the block is inactive or a gap, when there is no burn rate, or when
/// the relevant rate is not positive. A limit already reached yields zero.
pub fn project_exhaustion(block: &SessionBlock, limit: LimitKind) -> Option<TimeDelta> {
    if !block.is_active || block.is_gap {
        return None;
    }
    let rate = burn_rate(block)?;
    let (remaining, per_minute) = match limit {
        LimitKind::Tokens(l) => (
            l as f64 - block.tokens.total() as f64,
            rate.tokens_per_minute,
        ),
        LimitKind::Cost(l) => (l - block.cost.as_f64(), rate.cost_per_hour / 60.0),
        LimitKind::Messages(l) => (
            l as f64 - block.message_count() as f64,
            rate.messages_per_minute,
        ),
    };
    if !per_minute.is_finite() || per_minute <= 0.0 || !remaining.is_finite() {
        return None;
    }
    if remaining <= 0.0 {
        return Some(TimeDelta::zero());
    }
    let eta_ms = (remaining / per_minute * 60_000.0).round();
    if eta_ms >= i64::MAX as f64 {
        return None;
    }
    TimeDelta::try_milliseconds(eta_ms as i64)
}

/// Where the active block ends up if the current pace holds until its end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectedUsage {
    pub total_tokens: u64,
    pub total_cost: Usd,
    pub remaining_minutes: u64,
}

pub fn project_block_usage(block: &SessionBlock, now: DateTime<Utc>) -> Option<ProjectedUsage> {
    if !block.is_active || block.is_gap {
        return None;
    }
    let rate = burn_rate(block)?;
    let remaining_minutes = minutes_between(now, block.end).max(0.0);
    let projected_tokens = block.tokens.total() as f64 + rate.tokens_per_minute * remaining_minutes;
    let projected_cost = block.cost + Usd::from_f64(rate.cost_per_hour / 60.0 * remaining_minutes);
    Some(ProjectedUsage {
        total_tokens: projected_tokens.round() as u64,
        total_cost: projected_cost,
        remaining_minutes: remaining_minutes.round() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::assemble;
    use crate::models::{CostSource, ResolvedEvent, TokenCounts, UsageEvent};
    use chrono::TimeZone;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
    }

    fn entry(ts: DateTime<Utc>, tokens: TokenCounts, cost: f64) -> ResolvedEvent {
        ResolvedEvent {
            event: UsageEvent::new(ts, tokens),
            cost: Usd::from_f64(cost),
            cost_source: CostSource::Precomputed,
            estimated: false,
        }
    }

    #[test]
    fn test_burn_rate_calculation() {
        let entries = vec![
            entry(base(), TokenCounts::new(1000, 500, 0, 0), 0.01),
            entry(base() + TimeDelta::minutes(1), TokenCounts::new(2000, 1000, 0, 0), 0.02),
        ];
        let blocks = assemble(&entries, 5.0, base() + TimeDelta::minutes(2));
        let rate = burn_rate(&blocks[0]).unwrap();
        assert!((rate.tokens_per_minute - 4500.0).abs() < 0.1);
        assert!((rate.tokens_per_minute_excluding_cache - 4500.0).abs() < 0.1);
        assert!((rate.cost_per_hour - 1.8).abs() < 0.01);
    }

    #[test]
    fn test_burn_rate_uses_first_event_not_floored_start() {
        let t0 = base() + TimeDelta::minutes(37);
        let entries = vec![
            entry(t0, TokenCounts::new(1000, 500, 0, 0), 0.0),
            entry(t0 + TimeDelta::seconds(60), TokenCounts::new(2000, 500, 400, 100), 0.0),
        ];
        let blocks = assemble(&entries, 5.0, t0);
        let rate = burn_rate(&blocks[0]).unwrap();
        assert!((rate.tokens_per_minute - 4500.0).abs() < 0.1);
        assert!((rate.tokens_per_minute_excluding_cache - 4000.0).abs() < 0.1);
    }

    #[test]
    fn test_single_event_has_no_rate() {
        let blocks = assemble(&[entry(base(), TokenCounts::new(1, 1, 0, 0), 0.1)], 5.0, base());
        assert!(burn_rate(&blocks[0]).is_none());
        assert!(project_exhaustion(&blocks[0], LimitKind::Tokens(100)).is_none());
    }

    #[test]
    fn test_gap_block_has_no_rate() {
        let entries = vec![
            entry(base(), TokenCounts::new(1, 1, 0, 0), 0.0),
            entry(base() + TimeDelta::hours(6), TokenCounts::new(1, 1, 0, 0), 0.0),
        ];
        let blocks = assemble(&entries, 5.0, base() + TimeDelta::hours(6));
        assert!(blocks[1].is_gap);
        assert!(burn_rate(&blocks[1]).is_none());
        assert!(project_exhaustion(&blocks[1], LimitKind::Tokens(1)).is_none());
    }

    #[test]
    fn test_project_exhaustion() {
        let entries = vec![
            entry(base(), TokenCounts::new(500, 500, 0, 0), 0.5),
            entry(base() + TimeDelta::minutes(10), TokenCounts::new(500, 500, 0, 0), 0.5),
        ];
        let now = base() + TimeDelta::minutes(11);
        let blocks = assemble(&entries, 5.0, now);
        let block = &blocks[0];
        // 2000 tokens over 10 min = 200/min; 10_000 limit leaves 8000 -> 40 min
        assert_eq!(
            project_exhaustion(block, LimitKind::Tokens(10_000)),
            Some(TimeDelta::minutes(40))
        );
        // $1 over 10 min = $0.1/min; $2 limit -> 10 min
        assert_eq!(
            project_exhaustion(block, LimitKind::Cost(2.0)),
            Some(TimeDelta::minutes(10))
        );
        // 2 messages over 10 min; 4 limit -> 10 min
        assert_eq!(
            project_exhaustion(block, LimitKind::Messages(4)),
            Some(TimeDelta::minutes(10))
        );
        assert_eq!(
            project_exhaustion(block, LimitKind::Tokens(1_000)),
            Some(TimeDelta::zero())
        );
    }

    #[test]
    fn test_zero_rate_never_exhausts() {
        let entries = vec![
            entry(base(), TokenCounts::new(500, 500, 0, 0), 0.0),
            entry(base() + TimeDelta::minutes(10), TokenCounts::new(500, 500, 0, 0), 0.0),
        ];
        let blocks = assemble(&entries, 5.0, base() + TimeDelta::minutes(11));
        assert!(project_exhaustion(&blocks[0], LimitKind::Cost(5.0)).is_none());
    }

    #[test]
    fn test_inactive_block_has_no_projection() {
        let entries = vec![
            entry(base(), TokenCounts::new(500, 500, 0, 0), 0.5),
            entry(base() + TimeDelta::minutes(10), TokenCounts::new(500, 500, 0, 0), 0.5),
        ];
        let now = base() + TimeDelta::hours(6);
        let blocks = assemble(&entries, 5.0, now);
        assert!(project_exhaustion(&blocks[0], LimitKind::Tokens(10_000)).is_none());
        assert!(project_block_usage(&blocks[0], now).is_none());
    }

    #[test]
    fn test_project_block_usage() {
        let entries = vec![
            entry(base(), TokenCounts::new(500, 500, 0, 0), 0.5),
            entry(base() + TimeDelta::minutes(10), TokenCounts::new(500, 500, 0, 0), 0.5),
        ];
        let now = base() + TimeDelta::hours(4);
        let blocks = assemble(&entries, 5.0, now);
        let p = project_block_usage(&blocks[0], now).unwrap();
        assert_eq!(p.remaining_minutes, 60);
        assert_eq!(p.total_tokens, 2000 + 200 * 60);
        assert_eq!(p.total_cost, Usd::from_f64(7.0));
    }
}
