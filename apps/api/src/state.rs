use std::sync::Arc;

use crate::enhancement::EnhancementService;
use crate::quota::RateLimiter;
use crate::telemetry::AgentMetrics;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<EnhancementService>,
    /// Same limiter the service enforces with; the usage routes only read it.
    pub limiter: Arc<RateLimiter>,
    /// Same instance the agent caller records into; rendered by `/metrics`.
    pub metrics: Arc<AgentMetrics>,
}
