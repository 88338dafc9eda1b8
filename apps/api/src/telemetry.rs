//! Prometheus metrics for agent calls.
//!
//! Each `AgentMetrics` owns its registry, so tests and multiple services in one
//! process never collide on metric registration.

use axum::{extract::State, http::header, response::IntoResponse};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::errors::AppError;
use crate::state::AppState;

/// LLM latency buckets (seconds). Provider calls are slow; go up to a minute.
const LLM_LATENCY_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0];

pub struct AgentMetrics {
    registry: Registry,
    /// labels: agent, status (success/error)
    calls_total: IntCounterVec,
    /// labels: agent
    latency_seconds: HistogramVec,
}

impl AgentMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let calls_total = IntCounterVec::new(
            Opts::new("enhancer_llm_calls_total", "Total number of LLM agent calls"),
            &["agent", "status"],
        )?;
        let latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "enhancer_llm_request_latency_seconds",
                "Latency of LLM agent calls including retries",
            )
            .buckets(LLM_LATENCY_BUCKETS.to_vec()),
            &["agent"],
        )?;

        registry.register(Box::new(calls_total.clone()))?;
        registry.register(Box::new(latency_seconds.clone()))?;

        Ok(Self {
            registry,
            calls_total,
            latency_seconds,
        })
    }

    /// Record one agent call outcome.
    pub fn record_call(&self, agent: &str, success: bool) {
        let status = if success { "success" } else { "error" };
        self.calls_total.with_label_values(&[agent, status]).inc();
    }

    pub fn observe_latency(&self, agent: &str, seconds: f64) {
        self.latency_seconds
            .with_label_values(&[agent])
            .observe(seconds);
    }

    pub fn call_count(&self, agent: &str, success: bool) -> u64 {
        let status = if success { "success" } else { "error" };
        self.calls_total.with_label_values(&[agent, status]).get()
    }

    pub fn latency_samples(&self, agent: &str) -> u64 {
        self.latency_seconds
            .with_label_values(&[agent])
            .get_sample_count()
    }

    /// Prometheus text exposition format.
    pub fn render(&self) -> Result<String, AppError> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode metrics: {e}")))?;
        String::from_utf8(buffer)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Metrics are not UTF-8: {e}")))
    }
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state.metrics.render()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}
