//! Subscription tier lookup.
//!
//! The tier decides the monthly quota, so it is resolved here from server-side
//! records and never taken from the request.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::warn;

use super::limiter::SubscriptionTier;

#[async_trait]
pub trait TierDirectory: Send + Sync {
    /// Tier for `user_id`. Unknown users, and lookups that fail, are free tier.
    async fn tier_for(&self, user_id: &str) -> SubscriptionTier;
}

/// Fixed user → tier assignments, loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticTierDirectory {
    tiers: HashMap<String, SubscriptionTier>,
}

impl StaticTierDirectory {
    pub fn new(tiers: HashMap<String, SubscriptionTier>) -> Self {
        Self { tiers }
    }
}

#[async_trait]
impl TierDirectory for StaticTierDirectory {
    async fn tier_for(&self, user_id: &str) -> SubscriptionTier {
        self.tiers.get(user_id).copied().unwrap_or_default()
    }
}

/// Reads `user_subscriptions.tier`.
pub struct PgTierDirectory {
    pool: PgPool,
}

impl PgTierDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TierDirectory for PgTierDirectory {
    async fn tier_for(&self, user_id: &str) -> SubscriptionTier {
        let tier: Result<Option<String>, sqlx::Error> =
            sqlx::query_scalar("SELECT tier FROM user_subscriptions WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await;

        match tier {
            Ok(tier) => SubscriptionTier::parse(tier.as_deref()),
            Err(e) => {
                warn!(user_id, error = %e, "Tier lookup failed, treating caller as free tier");
                SubscriptionTier::Free
            }
        }
    }
}
