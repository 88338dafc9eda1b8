use axum::{extract::State, Json};
use serde::Serialize;

use crate::models::CallerIdentity;
use crate::quota::{LimitType, SubscriptionTier, UsageReport};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TierLimits {
    /// -1 means unlimited.
    pub enhancements_per_month: i64,
    pub enhancements_per_day: i64,
    pub tier_name: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TierResponse {
    pub user_id: String,
    pub tier: SubscriptionTier,
    pub limits: TierLimits,
}

/// GET /api/v1/user/tier
pub async fn handle_tier(State(state): State<AppState>, caller: CallerIdentity) -> Json<TierResponse> {
    let tier = state.limiter.tier_for(&caller.user_id).await;
    let limits = TierLimits {
        enhancements_per_month: tier.monthly_limit(),
        enhancements_per_day: state
            .limiter
            .limit_for(&caller.user_id, tier, LimitType::Daily),
        tier_name: tier.display_name(),
    };

    Json(TierResponse {
        user_id: caller.user_id,
        tier,
        limits,
    })
}

/// GET /api/v1/user/usage
/// Reads both quota windows without consuming either.
pub async fn handle_usage(State(state): State<AppState>, caller: CallerIdentity) -> Json<UsageReport> {
    Json(state.limiter.usage(&caller.user_id).await)
}
