// Enhancement quotas: windowed counters keyed by (user, limit type, period bucket).
// Backend outages fail open: the feature stays available, enforcement is skipped.

pub mod handlers;
pub mod limiter;
pub mod store;
pub mod tiers;

pub use limiter::{LimitType, QuotaDecision, RateLimiter, SubscriptionTier, UsageReport};
pub use store::{CounterStore, InMemoryCounterStore, RedisCounterStore};
pub use tiers::{PgTierDirectory, StaticTierDirectory, TierDirectory};
