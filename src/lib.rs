//! # Claude Blocks
//!
//! Billing-accurate usage statistics for Claude Code usage logs.
//!
//! ## Overview
//!
//! Given timestamped usage events (token counts, optional log-supplied cost) this
//! library produces:
//! - Per-event USD cost under the `auto`, `calculate` or `display` cost modes
//! - 5-hour billing blocks with gap detection, floored to the hour
//! - Burn rates (tokens/minute, cost/hour) and time-to-limit projections
//! - Percentages of plan limits for the active block
//! - Live context-window usage from the latest main-chain event
//!
//! Everything is computed synchronously from an immutable snapshot of events and
//! an explicit `now`; reading logs and rendering output are up to the caller.

/// Billing block assembly with gap detection
pub mod blocks;

/// Engine configuration (defaults, JSON, environment)
pub mod config;

/// Context window view over the event stream
pub mod context;

/// Cost resolution modes
pub mod cost;

/// End-to-end computation of a usage report
pub mod engine;

/// Token, cost and model aggregation
pub mod metrics;

/// Data models for events, blocks, money and plan limits
pub mod models;

/// Limit percentage calculations
pub mod percentage;

/// Model price table and model-name normalization
pub mod pricing;

/// Per-session rollups
pub mod sessions;

/// Latest-result cell for concurrent callers
pub mod snapshot;

/// Time and number helpers
pub mod utils;

/// Burn rate and projections
pub mod window;

pub use config::EngineConfig;
pub use cost::CostMode;
pub use engine::{compute, UsageReport};
pub use models::{PlanLimits, ResolvedEvent, SessionBlock, TokenCounts, UsageEvent, Usd};
pub use pricing::PriceTable;
