//! Windowed enhancement quotas.
//!
//! Monthly limits follow the caller's subscription tier, resolved through a
//! [`TierDirectory`]; daily limits are a fixed default with per-user overrides. `check` never mutates, `increment`
//! is issued separately once an enhancement succeeds. Neither operation ever
//! fails: a counter store outage lets the request through.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::store::CounterStore;
use super::tiers::TierDirectory;

/// Sentinel limit meaning "no quota".
pub const UNLIMITED: i64 = -1;

pub const DEFAULT_DAILY_LIMIT: i64 = 10;

const DAILY_TTL: Duration = Duration::from_secs(60 * 60 * 48);
const MONTHLY_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitType {
    Daily,
    Monthly,
}

impl LimitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitType::Daily => "daily",
            LimitType::Monthly => "monthly",
        }
    }

    fn ttl(&self) -> Duration {
        match self {
            LimitType::Daily => DAILY_TTL,
            LimitType::Monthly => MONTHLY_TTL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Basic,
    Premium,
    Enterprise,
}

impl SubscriptionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Basic => "basic",
            SubscriptionTier::Premium => "premium",
            SubscriptionTier::Enterprise => "enterprise",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "Free",
            SubscriptionTier::Basic => "Basic",
            SubscriptionTier::Premium => "Premium",
            SubscriptionTier::Enterprise => "Enterprise",
        }
    }

    /// Unknown or missing tiers are treated as free.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("basic") => SubscriptionTier::Basic,
            Some("premium") => SubscriptionTier::Premium,
            Some("enterprise") => SubscriptionTier::Enterprise,
            _ => SubscriptionTier::Free,
        }
    }

    pub fn monthly_limit(&self) -> i64 {
        match self {
            SubscriptionTier::Free => 3,
            SubscriptionTier::Basic => 10,
            SubscriptionTier::Premium => 50,
            SubscriptionTier::Enterprise => UNLIMITED,
        }
    }
}

/// Daily quota settings: a default plus exact-match per-user overrides.
#[derive(Debug, Clone)]
pub struct DailyLimits {
    pub default: i64,
    pub overrides: HashMap<String, i64>,
}

impl Default for DailyLimits {
    fn default() -> Self {
        Self {
            default: DEFAULT_DAILY_LIMIT,
            overrides: HashMap::from([("test@example.com".to_string(), 10)]),
        }
    }
}

impl DailyLimits {
    pub fn limit_for(&self, user_id: &str) -> i64 {
        self.overrides.get(user_id).copied().unwrap_or(self.default)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaDecision {
    pub allowed: bool,
    /// Requests counted in the current window; 0 when not metered or unreadable.
    pub usage: i64,
    pub remaining: i64,
    pub limit: i64,
    /// Unix seconds at which the window rolls over. `None` when unlimited or
    /// when the store could not be read.
    pub reset_at: Option<i64>,
    /// Seconds until `reset_at`, only set on denial.
    pub retry_after: Option<i64>,
}

impl QuotaDecision {
    fn open(limit: i64) -> Self {
        Self {
            allowed: true,
            usage: 0,
            remaining: limit,
            limit,
            reset_at: None,
            retry_after: None,
        }
    }
}

/// One window of a [`UsageReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowUsage {
    pub usage: i64,
    pub limit: i64,
    pub remaining: i64,
    pub reset_at: Option<i64>,
    pub unlimited: bool,
}

impl From<QuotaDecision> for WindowUsage {
    fn from(d: QuotaDecision) -> Self {
        Self {
            usage: d.usage,
            limit: d.limit,
            remaining: d.remaining,
            reset_at: d.reset_at,
            unlimited: d.limit == UNLIMITED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageReport {
    pub user_id: String,
    pub tier: SubscriptionTier,
    pub monthly: WindowUsage,
    pub daily: WindowUsage,
}

pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    daily: DailyLimits,
    tiers: Arc<dyn TierDirectory>,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn CounterStore>,
        daily: DailyLimits,
        tiers: Arc<dyn TierDirectory>,
    ) -> Self {
        Self {
            store,
            daily,
            tiers,
        }
    }

    pub async fn tier_for(&self, user_id: &str) -> SubscriptionTier {
        self.tiers.tier_for(user_id).await
    }

    /// Read-only view of both windows for `user_id`.
    pub async fn usage(&self, user_id: &str) -> UsageReport {
        let tier = self.tier_for(user_id).await;
        let monthly = self.check(user_id, tier, LimitType::Monthly).await;
        let daily = self.check(user_id, tier, LimitType::Daily).await;
        UsageReport {
            user_id: user_id.to_string(),
            tier,
            monthly: monthly.into(),
            daily: daily.into(),
        }
    }

    pub fn limit_for(&self, user_id: &str, tier: SubscriptionTier, limit_type: LimitType) -> i64 {
        match limit_type {
            LimitType::Daily => self.daily.limit_for(user_id),
            LimitType::Monthly => tier.monthly_limit(),
        }
    }

    pub async fn check(
        &self,
        user_id: &str,
        tier: SubscriptionTier,
        limit_type: LimitType,
    ) -> QuotaDecision {
        self.check_at(user_id, tier, limit_type, Utc::now()).await
    }

    pub async fn check_at(
        &self,
        user_id: &str,
        tier: SubscriptionTier,
        limit_type: LimitType,
        now: DateTime<Utc>,
    ) -> QuotaDecision {
        let limit = self.limit_for(user_id, tier, limit_type);
        if limit == UNLIMITED {
            return QuotaDecision::open(UNLIMITED);
        }

        let key = counter_key(user_id, limit_type, now);
        let usage = match self.store.get(&key).await {
            Ok(usage) => usage,
            Err(e) => {
                warn!(user_id, key = %key, error = %e, "Counter store unavailable, allowing request");
                return QuotaDecision::open(limit);
            }
        };

        let reset_at = window_reset(limit_type, now).timestamp();
        let remaining = limit - usage;
        let allowed = remaining > 0;

        QuotaDecision {
            allowed,
            usage,
            remaining: remaining.max(0),
            limit,
            reset_at: Some(reset_at),
            retry_after: (!allowed).then(|| reset_at - now.timestamp()),
        }
    }

    pub async fn increment(&self, user_id: &str, limit_type: LimitType) {
        self.increment_at(user_id, limit_type, Utc::now()).await
    }

    pub async fn increment_at(&self, user_id: &str, limit_type: LimitType, now: DateTime<Utc>) {
        let key = counter_key(user_id, limit_type, now);

        let result = async {
            self.store.incr(&key).await?;
            self.store.expire(&key, limit_type.ttl()).await
        }
        .await;

        match result {
            Ok(()) => info!(user_id, key = %key, limit_type = limit_type.as_str(), "Usage incremented"),
            Err(e) => error!(user_id, key = %key, error = %e, "Usage increment failed"),
        }
    }
}

/// Counter key for the period bucket containing `now`. Month and day are not
/// zero-padded.
pub fn counter_key(user_id: &str, limit_type: LimitType, now: DateTime<Utc>) -> String {
    match limit_type {
        LimitType::Daily => format!(
            "rate_limit:daily:{}:{}:{}:{}",
            user_id,
            now.year(),
            now.month(),
            now.day()
        ),
        LimitType::Monthly => format!("rate_limit:{}:{}:{}", user_id, now.year(), now.month()),
    }
}

/// Next UTC midnight for daily windows; 23:59:59 on the month's last day for
/// monthly windows.
pub fn window_reset(limit_type: LimitType, now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive();
    match limit_type {
        LimitType::Daily => {
            let tomorrow = today.succ_opt().unwrap_or(today);
            Utc.from_utc_datetime(&tomorrow.and_time(chrono::NaiveTime::MIN))
        }
        LimitType::Monthly => {
            let (year, month) = if today.month() == 12 {
                (today.year() + 1, 1)
            } else {
                (today.year(), today.month() + 1)
            };
            let next_month = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(today);
            Utc.from_utc_datetime(&next_month.and_time(chrono::NaiveTime::MIN))
                - chrono::Duration::seconds(1)
        }
    }
}
