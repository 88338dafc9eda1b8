use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::enhancement::RetryPolicy;
use crate::quota::limiter::{DailyLimits, DEFAULT_DAILY_LIMIT};
use crate::quota::SubscriptionTier;

/// Application configuration loaded from environment variables.
/// Every backend is optional; unset URLs and keys select the in-process fallbacks.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub llm_timeout: Duration,
    pub llm_max_attempts: u32,
    pub llm_backoff: Duration,
    pub daily_limits: DailyLimits,
    /// Tier assignments used when no database is configured.
    pub user_tiers: HashMap<String, SubscriptionTier>,
    pub counter_store_capacity: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let daily_overrides = std::env::var("DAILY_LIMIT_OVERRIDES")
            .unwrap_or_else(|_| "test@example.com=10".to_string());

        Ok(Config {
            database_url: optional_env("DATABASE_URL"),
            redis_url: optional_env("REDIS_URL"),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            llm_timeout: Duration::from_secs(parse_env("LLM_TIMEOUT_SECONDS", 30)?),
            llm_max_attempts: parse_env("LLM_MAX_ATTEMPTS", 3)?,
            llm_backoff: Duration::from_millis(parse_env("LLM_BACKOFF_MS", 500)?),
            daily_limits: DailyLimits {
                default: parse_env("DAILY_ENHANCE_LIMIT", DEFAULT_DAILY_LIMIT)?,
                overrides: parse_overrides(&daily_overrides)?,
            },
            user_tiers: parse_tiers(&std::env::var("USER_TIERS").unwrap_or_default())?,
            counter_store_capacity: parse_env("COUNTER_STORE_CAPACITY", 10_000)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.llm_max_attempts,
            backoff_base: self.llm_backoff,
            timeout: self.llm_timeout,
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        None => Ok(default),
    }
}

/// Parses `user=limit` pairs separated by commas.
fn parse_overrides(raw: &str) -> Result<HashMap<String, i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (user, limit) = pair
                .rsplit_once('=')
                .with_context(|| format!("Daily limit override '{pair}' must be user=limit"))?;
            let limit = limit
                .trim()
                .parse::<i64>()
                .with_context(|| format!("Daily limit override '{pair}' has a non-numeric limit"))?;
            Ok((user.trim().to_string(), limit))
        })
        .collect()
}

/// Parses `user=tier` pairs separated by commas. Tier names must be known.
fn parse_tiers(raw: &str) -> Result<HashMap<String, SubscriptionTier>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (user, tier) = pair
                .rsplit_once('=')
                .with_context(|| format!("User tier '{pair}' must be user=tier"))?;
            let parsed = SubscriptionTier::parse(Some(tier));
            if parsed.as_str() != tier.trim().to_ascii_lowercase() {
                anyhow::bail!("User tier '{pair}' names an unknown tier");
            }
            Ok((user.trim().to_string(), parsed))
        })
        .collect()
}
