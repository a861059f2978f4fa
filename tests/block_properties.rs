use chrono::{DateTime, TimeDelta, TimeZone, Timelike, Utc};

use claude_blocks::blocks::{WindowRollover, assemble, assemble_with_rollover};
use claude_blocks::cost::{CostMode, resolve_all};
use claude_blocks::models::{ResolvedEvent, TokenCounts, UsageEvent, Usd};
use claude_blocks::pricing::PriceTable;
use claude_blocks::window::burn_rate;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 14, 0, 0).unwrap()
}

fn create_test_event(ts: DateTime<Utc>, input: u64, output: u64, cost: f64) -> UsageEvent {
    UsageEvent::new(ts, TokenCounts::new(input, output, 0, 0))
        .with_model("claude-sonnet-4")
        .with_session("session1")
        .with_cost(cost)
}

fn resolve(events: &[UsageEvent]) -> Vec<ResolvedEvent> {
    resolve_all(events, CostMode::Auto, &PriceTable::builtin(), "claude-sonnet-4")
}

/// Irregular timestamps with short pauses, long pauses and continuous stretches.
fn mixed_events() -> Vec<UsageEvent> {
    let offsets_min = [
        0, 3, 3, 47, 121, 290, 310, 650, 655, 700, 940, 1000, 1010, 1500, 1501, 1502,
    ];
    offsets_min
        .iter()
        .enumerate()
        .map(|(i, m)| {
            create_test_event(
                t0() + TimeDelta::minutes(*m) + TimeDelta::seconds(i as i64 * 7),
                100 + i as u64,
                50,
                0.01,
            )
        })
        .collect()
}

#[test]
fn partition_invariant_holds() {
    let resolved = resolve(&mixed_events());
    let mut sorted = resolved.clone();
    sorted.sort_by_key(|e| e.ts());

    for rollover in [WindowRollover::Split, WindowRollover::SplitWithGap] {
        let blocks = assemble_with_rollover(&resolved, 5.0, t0() + TimeDelta::days(5), rollover);
        let concatenated: Vec<ResolvedEvent> = blocks
            .iter()
            .filter(|b| !b.is_gap)
            .flat_map(|b| b.entries.iter().cloned())
            .collect();
        assert_eq!(concatenated, sorted);
        assert!(blocks.iter().filter(|b| b.is_gap).all(|b| b.entries.is_empty()));
        // billing blocks come out in start order
        let starts: Vec<_> = blocks.iter().filter(|b| !b.is_gap).map(|b| b.start).collect();
        assert!(starts.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn flooring_invariant_holds() {
    let blocks = assemble(&resolve(&mixed_events()), 5.0, t0() + TimeDelta::days(5));
    for b in blocks.iter().filter(|b| !b.is_gap) {
        assert_eq!(b.start.minute(), 0);
        assert_eq!(b.start.second(), 0);
        assert_eq!(b.start.nanosecond(), 0);
        assert_eq!(b.end - b.start, TimeDelta::hours(5));
    }
}

#[test]
fn gap_correctness() {
    let events = vec![
        create_test_event(t0(), 1000, 500, 0.1),
        create_test_event(t0() + TimeDelta::hours(6), 1000, 500, 0.1),
    ];
    let blocks = assemble(&resolve(&events), 5.0, t0() + TimeDelta::days(1));
    assert_eq!(blocks.len(), 3);

    assert!(!blocks[0].is_gap);
    assert_eq!(blocks[0].entries.len(), 1);
    assert_eq!(blocks[0].entries[0].ts(), t0());

    assert!(blocks[1].is_gap);
    assert_eq!(blocks[1].start, t0() + TimeDelta::hours(5));
    assert_eq!(blocks[1].end, t0() + TimeDelta::hours(6));
    assert!(blocks[1].entries.is_empty());
    assert_eq!(blocks[1].cost, Usd::ZERO);
    assert!(!blocks[1].is_active);

    assert!(!blocks[2].is_gap);
    assert_eq!(blocks[2].entries.len(), 1);
    assert_eq!(blocks[2].entries[0].ts(), t0() + TimeDelta::hours(6));
}

#[test]
fn no_gap_for_short_pause() {
    let events = vec![
        create_test_event(t0(), 1000, 500, 0.1),
        create_test_event(t0() + TimeDelta::hours(3), 1000, 500, 0.1),
    ];
    let blocks = assemble(&resolve(&events), 5.0, t0() + TimeDelta::days(1));
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].entries.len(), 2);
    assert_eq!(blocks[0].cost, Usd::from_f64(0.2));
}

#[test]
fn single_event_yields_one_block() {
    let blocks = assemble(
        &resolve(&[create_test_event(t0(), 1, 1, 0.0)]),
        5.0,
        t0() + TimeDelta::days(1),
    );
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].entries.len(), 1);
}

#[test]
fn burn_rate_sanity() {
    let events = vec![
        create_test_event(t0(), 1000, 500, 0.01),
        create_test_event(t0() + TimeDelta::seconds(60), 2000, 1000, 0.02),
    ];
    let blocks = assemble(&resolve(&events), 5.0, t0() + TimeDelta::minutes(2));
    let rate = burn_rate(&blocks[0]).unwrap();
    assert!((rate.tokens_per_minute - 4500.0).abs() < 0.1);
}

#[test]
fn active_flag_tracks_now() {
    let events = vec![
        create_test_event(t0(), 1, 1, 0.0),
        create_test_event(t0() + TimeDelta::hours(2), 1, 1, 0.0),
    ];
    let resolved = resolve(&events);
    assert!(assemble(&resolved, 5.0, t0() + TimeDelta::hours(3))[0].is_active);
    // window over even though the last event was recent
    assert!(!assemble(&resolved, 5.0, t0() + TimeDelta::hours(5))[0].is_active);
}
