use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::{ResolvedEvent, SessionBlock, TokenCounts, Usd};

/// Summed tokens, cost and distinct models over a set of events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub tokens: TokenCounts,
    pub cost: Usd,
    pub models: BTreeSet<String>,
    pub messages: u64,
}

pub fn aggregate<'a>(entries: impl IntoIterator<Item = &'a ResolvedEvent>) -> Totals {
    entries.into_iter().fold(Totals::default(), |mut acc, e| {
        acc.tokens += e.tokens();
        acc.cost += e.cost;
        if let Some(m) = e.model() {
            acc.models.insert(m.to_string());
        }
        acc.messages += 1;
        acc
    })
}

/// Recomputes a block's totals from its entries. Gap blocks fold to zero.
pub fn aggregate_block(block: &SessionBlock) -> Totals {
    aggregate(&block.entries)
}
