//! Agent Caller: invokes the text provider for one role under a retry policy.
//!
//! Each call owns its own timeout and backoff state, so the three roles can be
//! dispatched concurrently without one role's retries delaying another.
//! Exhausting every attempt never fails the caller: a degraded response is
//! returned instead and the outcome is recorded in metrics.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::time::{sleep, timeout, Instant};
use tracing::{info, warn};

use crate::llm_client::{LlmError, TextProvider};
use crate::telemetry::AgentMetrics;

/// Prompt characters kept in the degraded fallback text.
pub const FALLBACK_PROMPT_CHARS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentRole {
    #[serde(rename = "resume_writer")]
    Writer,
    #[serde(rename = "ats_optimizer")]
    AtsOptimizer,
    #[serde(rename = "industry_expert")]
    IndustryExpert,
}

impl AgentRole {
    pub const ALL: [AgentRole; 3] = [
        AgentRole::Writer,
        AgentRole::AtsOptimizer,
        AgentRole::IndustryExpert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Writer => "resume_writer",
            AgentRole::AtsOptimizer => "ats_optimizer",
            AgentRole::IndustryExpert => "industry_expert",
        }
    }
}

/// Timeout per attempt, attempt budget, and linear backoff (`base * attempt`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base * attempt
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Untrusted provider output plus how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentResponse {
    pub role: AgentRole,
    /// Provider body as a JSON string value, or the degraded fallback object.
    pub raw: Value,
    pub attempts: u32,
    pub degraded: bool,
}

impl AgentResponse {
    /// Opaque metadata carried on the normalized output.
    pub fn meta(&self, provider: &str) -> Value {
        json!({
            "provider": provider,
            "attempts": self.attempts,
            "degraded": self.degraded,
            "raw": self.raw,
        })
    }
}

#[derive(Clone)]
pub struct AgentCaller {
    provider: Arc<dyn TextProvider>,
    policy: RetryPolicy,
    metrics: Arc<AgentMetrics>,
}

impl AgentCaller {
    pub fn new(
        provider: Arc<dyn TextProvider>,
        policy: RetryPolicy,
        metrics: Arc<AgentMetrics>,
    ) -> Self {
        Self {
            provider,
            policy,
            metrics,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Calls the provider for `role`, retrying per policy. Never returns an error.
    pub async fn call(&self, prompt: &str, role: AgentRole) -> AgentResponse {
        let started = Instant::now();
        let max_attempts = self.policy.attempts();
        let mut attempt = 0;

        let outcome: Result<String, LlmError> = loop {
            attempt += 1;

            let last_error = match timeout(self.policy.timeout, self.provider.complete(prompt, role)).await {
                Ok(Ok(body)) => break Ok(body),
                Ok(Err(e)) => e,
                Err(_) => LlmError::Timeout(self.policy.timeout),
            };

            if attempt >= max_attempts {
                break Err(last_error);
            }

            let delay = self.policy.backoff(attempt);
            warn!(
                role = role.as_str(),
                attempt,
                error = %last_error,
                "Agent call failed, retrying after {}ms",
                delay.as_millis()
            );
            sleep(delay).await;
        };

        self.metrics
            .observe_latency(role.as_str(), started.elapsed().as_secs_f64());

        match outcome {
            Ok(body) => {
                self.metrics.record_call(role.as_str(), true);
                info!(role = role.as_str(), attempt, "Agent call succeeded");
                AgentResponse {
                    role,
                    raw: Value::String(body),
                    attempts: attempt,
                    degraded: false,
                }
            }
            Err(e) => {
                self.metrics.record_call(role.as_str(), false);
                warn!(
                    role = role.as_str(),
                    attempts = attempt,
                    error = %e,
                    "Agent call exhausted retries, using degraded fallback"
                );
                AgentResponse {
                    role,
                    raw: degraded_fallback(prompt),
                    attempts: attempt,
                    degraded: true,
                }
            }
        }
    }
}

/// `{text: <head of prompt>, suggestions: [], confidence: 0}`.
pub fn degraded_fallback(prompt: &str) -> Value {
    let text: String = prompt.chars().take(FALLBACK_PROMPT_CHARS).collect();
    json!({
        "text": text,
        "suggestions": [],
        "confidence": 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    enum Step {
        Ok(&'static str),
        Fail,
        Hang,
    }

    /// Plays back a fixed script; the last step repeats once the script runs out.
    struct ScriptedProvider {
        steps: Mutex<VecDeque<Step>>,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(steps.into()),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextProvider for ScriptedProvider {
        async fn complete(&self, _prompt: &str, _role: AgentRole) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = {
                let mut steps = self.steps.lock().unwrap();
                if steps.len() > 1 {
                    steps.pop_front().unwrap()
                } else {
                    match steps.front().unwrap() {
                        Step::Ok(s) => Step::Ok(*s),
                        Step::Fail => Step::Fail,
                        Step::Hang => Step::Hang,
                    }
                }
            };
            match step {
                Step::Ok(body) => Ok(body.to_string()),
                Step::Fail => Err(LlmError::Api {
                    status: 503,
                    message: "overloaded".to_string(),
                }),
                Step::Hang => {
                    sleep(Duration::from_secs(3600)).await;
                    Ok("too late".to_string())
                }
            }
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff_base: Duration::from_millis(500),
            timeout: Duration::from_secs(2),
        }
    }

    fn caller(provider: Arc<ScriptedProvider>) -> (AgentCaller, Arc<AgentMetrics>) {
        let metrics = Arc::new(AgentMetrics::new().unwrap());
        (AgentCaller::new(provider, policy(), metrics.clone()), metrics)
    }

    fn assert_elapsed_near(started: Instant, expected: Duration) {
        let elapsed = started.elapsed();
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(50),
            "expected ~{expected:?}, got {elapsed:?}"
        );
    }

    #[test]
    fn test_backoff_is_linear() {
        let p = policy();
        assert_eq!(p.backoff(1), Duration::from_millis(500));
        assert_eq!(p.backoff(2), Duration::from_millis(1000));
        assert_eq!(p.backoff(3), Duration::from_millis(1500));
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let p = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        assert_eq!(p.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success() {
        let provider = ScriptedProvider::new(vec![Step::Ok(r#"{"text":"ok"}"#)]);
        let (caller, metrics) = caller(provider.clone());

        let response = caller.call("prompt", AgentRole::Writer).await;

        assert!(!response.degraded);
        assert_eq!(response.attempts, 1);
        assert_eq!(response.raw, Value::String(r#"{"text":"ok"}"#.to_string()));
        assert_eq!(provider.calls(), 1);
        assert_eq!(metrics.call_count("resume_writer", true), 1);
        assert_eq!(metrics.latency_samples("resume_writer"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let provider = ScriptedProvider::new(vec![Step::Fail, Step::Fail, Step::Ok("fine")]);
        let (caller, metrics) = caller(provider.clone());

        let started = Instant::now();
        let response = caller.call("prompt", AgentRole::AtsOptimizer).await;

        assert!(!response.degraded);
        assert_eq!(response.attempts, 3);
        assert_eq!(provider.calls(), 3);
        // 500ms + 1000ms of backoff
        assert_elapsed_near(started, Duration::from_millis(1500));
        assert_eq!(metrics.call_count("ats_optimizer", true), 1);
        assert_eq!(metrics.call_count("ats_optimizer", false), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_degraded_fallback() {
        let provider = ScriptedProvider::new(vec![Step::Fail]);
        let (caller, metrics) = caller(provider.clone());
        let prompt = "p".repeat(2500);

        let response = caller.call(&prompt, AgentRole::IndustryExpert).await;

        assert!(response.degraded);
        assert_eq!(response.attempts, 3);
        assert_eq!(provider.calls(), 3);
        assert_eq!(
            response.raw["text"].as_str().unwrap().chars().count(),
            FALLBACK_PROMPT_CHARS
        );
        assert_eq!(response.raw["suggestions"], json!([]));
        assert_eq!(response.raw["confidence"], json!(0.0));
        assert_eq!(metrics.call_count("industry_expert", false), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_attempt_is_bounded_by_timeout() {
        let provider = ScriptedProvider::new(vec![Step::Hang]);
        let (caller, _) = caller(provider.clone());

        let started = Instant::now();
        let response = caller.call("prompt", AgentRole::Writer).await;

        assert!(response.degraded);
        assert_eq!(provider.calls(), 3);
        // 3 × 2s timeouts + 500ms + 1000ms backoff
        assert_elapsed_near(started, Duration::from_millis(7500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_success() {
        let provider = ScriptedProvider::new(vec![Step::Hang, Step::Ok("late but fine")]);
        let (caller, _) = caller(provider.clone());

        let response = caller.call("prompt", AgentRole::Writer).await;

        assert!(!response.degraded);
        assert_eq!(response.attempts, 2);
        assert_eq!(response.raw, Value::String("late but fine".to_string()));
    }

    #[test]
    fn test_role_labels() {
        assert_eq!(AgentRole::Writer.as_str(), "resume_writer");
        assert_eq!(
            serde_json::to_value(AgentRole::AtsOptimizer).unwrap(),
            json!("ats_optimizer")
        );
    }

    #[test]
    fn test_meta_carries_raw_and_attempts() {
        let response = AgentResponse {
            role: AgentRole::Writer,
            raw: json!("body"),
            attempts: 2,
            degraded: false,
        };
        let meta = response.meta("scripted");
        assert_eq!(meta["attempts"], 2);
        assert_eq!(meta["raw"], "body");
        assert_eq!(meta["provider"], "scripted");
    }
}
