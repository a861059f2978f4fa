use crate::models::entry::ResolvedEvent;
use crate::models::money::Usd;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::AddAssign;

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCounts {
    #[serde(default, deserialize_with = "crate::utils::deserialize_count")]
    pub input: u64,
    #[serde(default, deserialize_with = "crate::utils::deserialize_count")]
    pub output: u64,
    #[serde(default, deserialize_with = "crate::utils::deserialize_count")]
    pub cache_creation: u64,
    #[serde(default, deserialize_with = "crate::utils::deserialize_count")]
    pub cache_read: u64,
}

impl TokenCounts {
    pub fn new(input: u64, output: u64, cache_creation: u64, cache_read: u64) -> Self {
        Self {
            input,
            output,
            cache_creation,
            cache_read,
        }
    }

    pub fn total(&self) -> u64 {
        self.input
            .saturating_add(self.output)
            .saturating_add(self.cache_creation)
            .saturating_add(self.cache_read)
    }

    /// Input plus output; cache traffic is billed at a discount and skews throughput.
    pub fn non_cache(&self) -> u64 {
        self.input.saturating_add(self.output)
    }
}

impl AddAssign<&TokenCounts> for TokenCounts {
    fn add_assign(&mut self, rhs: &TokenCounts) {
        self.input = self.input.saturating_add(rhs.input);
        self.output = self.output.saturating_add(rhs.output);
        self.cache_creation = self.cache_creation.saturating_add(rhs.cache_creation);
        self.cache_read = self.cache_read.saturating_add(rhs.cache_read);
    }
}

/// A billing window, or a synthetic gap between two of them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionBlock {
    pub id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Timestamp of the last real event; `None` for gap blocks.
    pub actual_end: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub is_gap: bool,
    pub entries: Vec<ResolvedEvent>,
    pub tokens: TokenCounts,
    pub cost: Usd,
    pub models: BTreeSet<String>,
}

impl SessionBlock {
    pub fn first_event_time(&self) -> Option<DateTime<Utc>> {
        self.entries.first().map(|e| e.ts())
    }

    pub fn message_count(&self) -> usize {
        self.entries.len()
    }
}
