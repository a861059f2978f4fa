pub mod block;
pub mod entry;
pub mod limits;
pub mod money;

pub use block::{SessionBlock, TokenCounts};
pub use entry::{CostSource, ResolvedEvent, UsageEvent};
pub use limits::{PlanLimits, PlanTier};
pub use money::Usd;
