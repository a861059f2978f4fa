//! # Snapshot Module
//!
//! A single-slot "latest report" cell for callers that recompute on a timer while
//! another thread reads. Reports are immutable and swapped whole; a recomputation
//! that finishes after a newer one was published is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::engine::UsageReport;

/// Ticket for one recomputation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Generation(u64);

struct Slot {
    generation: u64,
    report: Option<Arc<UsageReport>>,
}

pub struct LatestReport {
    next: AtomicU64,
    slot: Mutex<Slot>,
}

impl Default for LatestReport {
    fn default() -> Self {
        Self::new()
    }
}

impl LatestReport {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            slot: Mutex::new(Slot {
                generation: 0,
                report: None,
            }),
        }
    }

    /// Take a ticket before reading events.
    pub fn begin(&self) -> Generation {
        Generation(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Install `report` unless a newer generation is already published.
    /// Returns whether it was installed.
    pub fn publish(&self, generation: Generation, report: UsageReport) -> bool {
        let Ok(mut slot) = self.slot.lock() else {
            return false;
        };
        if generation.0 <= slot.generation {
            tracing::debug!(
                stale = generation.0,
                current = slot.generation,
                "dropping stale usage report"
            );
            return false;
        }
        slot.generation = generation.0;
        slot.report = Some(Arc::new(report));
        true
    }

    pub fn latest(&self) -> Option<Arc<UsageReport>> {
        self.slot.lock().ok().and_then(|s| s.report.clone())
    }

    pub fn generation(&self) -> Option<Generation> {
        self.slot
            .lock()
            .ok()
            .filter(|s| s.generation > 0)
            .map(|s| Generation(s.generation))
    }

    pub fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            slot.report = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::compute;
    use crate::models::PlanLimits;
    use crate::pricing::PriceTable;
    use chrono::{TimeDelta, TimeZone, Timelike, Utc};

    fn report(minute: i64) -> UsageReport {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap() + TimeDelta::minutes(minute);
        compute(
            &[],
            &EngineConfig::default(),
            &PriceTable::builtin(),
            &PlanLimits::default(),
            now,
        )
    }

    #[test]
    fn test_newer_generation_wins() {
        let cell = LatestReport::new();
        assert!(cell.latest().is_none());
        let slow = cell.begin();
        let fast = cell.begin();
        assert!(cell.publish(fast, report(2)));
        assert!(!cell.publish(slow, report(1)));
        assert_eq!(cell.latest().unwrap().generated_at.minute(), 2);
        assert_eq!(cell.generation(), Some(fast));
    }

    #[test]
    fn test_readers_keep_their_snapshot() {
        let cell = LatestReport::new();
        let g1 = cell.begin();
        cell.publish(g1, report(1));
        let held = cell.latest().unwrap();
        let g2 = cell.begin();
        cell.publish(g2, report(5));
        assert_eq!(held.generated_at.minute(), 1);
        assert_eq!(cell.latest().unwrap().generated_at.minute(), 5);
        cell.clear();
        assert!(cell.latest().is_none());
    }
}
