mod config;
mod db;
mod documents;
mod enhancement;
mod errors;
mod llm_client;
mod models;
mod quota;
mod routes;
mod state;
mod telemetry;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::Config;
use crate::db::{create_pool, run_migrations};
use crate::documents::{DocumentStore, InMemoryDocumentStore, PgDocumentStore};
use crate::enhancement::{AgentCaller, EnhancementService};
use crate::llm_client::{LlmClient, OfflineProvider, TextProvider};
use crate::quota::{
    CounterStore, InMemoryCounterStore, PgTierDirectory, RateLimiter, RedisCounterStore,
    StaticTierDirectory, TierDirectory,
};
use crate::routes::build_router;
use crate::state::AppState;
use crate::telemetry::AgentMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting resume enhancer v{}", env!("CARGO_PKG_VERSION"));

    let state = build_state(&config).await?;

    let app = build_router(state).layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Picks each backend from configuration and wires the enhancement service.
async fn build_state(config: &Config) -> Result<AppState> {
    let (documents, tiers): (Arc<dyn DocumentStore>, Arc<dyn TierDirectory>) =
        match &config.database_url {
            Some(url) => {
                let pool = create_pool(url).await?;
                run_migrations(&pool).await?;
                (
                    Arc::new(PgDocumentStore::new(pool.clone())),
                    Arc::new(PgTierDirectory::new(pool)),
                )
            }
            None => {
                warn!(
                    configured_tiers = config.user_tiers.len(),
                    "DATABASE_URL not set, documents are kept in memory and tiers come from USER_TIERS"
                );
                (
                    Arc::new(InMemoryDocumentStore::new()),
                    Arc::new(StaticTierDirectory::new(config.user_tiers.clone())),
                )
            }
        };

    let counters: Arc<dyn CounterStore> = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            info!("Redis counter store configured");
            Arc::new(RedisCounterStore::new(client))
        }
        None => {
            warn!(
                capacity = config.counter_store_capacity,
                "REDIS_URL not set, quota counters are kept in memory"
            );
            Arc::new(InMemoryCounterStore::new(config.counter_store_capacity))
        }
    };

    let provider: Arc<dyn TextProvider> = match &config.anthropic_api_key {
        Some(key) => {
            let client = LlmClient::new(key.clone(), config.llm_timeout)?;
            info!("LLM client initialized (model: {})", llm_client::MODEL);
            Arc::new(client)
        }
        None => {
            warn!("ANTHROPIC_API_KEY not set, using offline echo provider");
            Arc::new(OfflineProvider)
        }
    };

    let metrics = Arc::new(AgentMetrics::new()?);
    let policy = config.retry_policy();
    info!(
        max_attempts = policy.max_attempts,
        backoff_ms = policy.backoff_base.as_millis() as u64,
        timeout_s = policy.timeout.as_secs(),
        "Agent retry policy"
    );

    let limiter = Arc::new(RateLimiter::new(
        counters,
        config.daily_limits.clone(),
        tiers,
    ));
    let service = EnhancementService::new(
        documents,
        limiter.clone(),
        AgentCaller::new(provider, policy, metrics.clone()),
    );

    Ok(AppState {
        service: Arc::new(service),
        limiter,
        metrics,
    })
}
