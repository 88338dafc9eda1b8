//! Enhancement orchestration.
//!
//! Order of operations for one request:
//! 1. validate the body
//! 2. load the document and check ownership
//! 3. daily then monthly quota checks (nothing external has run yet)
//! 4. anonymize, build three role prompts, call the agents concurrently
//! 5. normalize, synthesize, score before/after
//! 6. best-effort history and version writes, then usage increments
//!
//! Dropping the future before step 6 leaves no partial history behind.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::documents::{
    append_history, DocumentStore, EnhancementHistoryEntry, NewVersion, AI_ENHANCEMENT_SOURCE,
};
use crate::enhancement::agents::{AgentCaller, AgentRole};
use crate::enhancement::anonymizer::anonymize;
use crate::enhancement::ats::{self, compute_keywords_added, AtsScore};
use crate::enhancement::models::{EnhanceContext, EnhanceRequest, SectionKind};
use crate::enhancement::normalizer::{normalize, AgentOutput};
use crate::enhancement::prompts::build_prompt;
use crate::enhancement::synthesizer::{synthesize, RoleOutputs, SynthesisResult};
use crate::errors::AppError;
use crate::models::CallerIdentity;
use crate::quota::limiter::UNLIMITED;
use crate::quota::{LimitType, RateLimiter};

/// Suggestions returned to the caller; synthesis keeps more.
pub const RESPONSE_SUGGESTIONS: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct EnhanceResponse {
    pub enhanced_text: String,
    pub suggestions: Vec<String>,
    pub ats_score_before: AtsScore,
    pub ats_score_after: AtsScore,
    pub keywords_added: Vec<String>,
    pub confidence: f64,
    pub pii_anonymized: bool,
    pub processing_time_ms: u64,
}

pub struct EnhancementService {
    documents: Arc<dyn DocumentStore>,
    limiter: Arc<RateLimiter>,
    agents: AgentCaller,
}

impl EnhancementService {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        limiter: Arc<RateLimiter>,
        agents: AgentCaller,
    ) -> Self {
        Self {
            documents,
            limiter,
            agents,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.agents.provider_name()
    }

    pub async fn enhance(
        &self,
        caller: &CallerIdentity,
        document_id: Uuid,
        request: EnhanceRequest,
    ) -> Result<EnhanceResponse, AppError> {
        let started = Instant::now();
        let request = request.validate()?;

        let document = self
            .documents
            .get_document(document_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Resume {document_id} not found")))?;

        if document.owner_id != caller.user_id {
            return Err(AppError::Forbidden(
                "Not authorized to enhance this resume".to_string(),
            ));
        }

        let enforced = self.enforce_quotas(caller).await?;

        let context = request.context_or_default();
        let ats_before = ats::score(&request.text, Some(&context));

        let synthesis = self
            .orchestrate(request.section, &request.text, &context)
            .await;

        let ats_after = ats::score(&synthesis.text, Some(&context));
        let keywords_added = compute_keywords_added(&request.text, &synthesis.text);
        let confidence = round2(synthesis.confidence);

        let entry = EnhancementHistoryEntry {
            timestamp: Utc::now(),
            section: request.section,
            ats_score_before: ats_before.score,
            ats_score_after: ats_after.score,
            confidence: synthesis.confidence,
            keywords_added: keywords_added.clone(),
            context: context.clone(),
        };
        append_history(
            self.documents.as_ref(),
            document_id,
            entry,
            ats_after.score,
            ats_after.score,
        )
        .await;

        self.append_version(document_id, request.section, &context, &synthesis.text, ats_after.score)
            .await;

        for limit_type in enforced {
            self.limiter.increment(&caller.user_id, limit_type).await;
        }

        let processing_time_ms = started.elapsed().as_millis() as u64;
        info!(
            user_id = %caller.user_id,
            %document_id,
            section = request.section.as_str(),
            ats_before = ats_before.score,
            ats_after = ats_after.score,
            processing_time_ms,
            "Section enhanced"
        );

        Ok(EnhanceResponse {
            enhanced_text: synthesis.text,
            suggestions: synthesis
                .suggestions
                .into_iter()
                .take(RESPONSE_SUGGESTIONS)
                .collect(),
            ats_score_before: ats_before,
            ats_score_after: ats_after,
            keywords_added,
            confidence,
            pii_anonymized: synthesis.pii_anonymized,
            processing_time_ms,
        })
    }

    /// Checks daily then monthly quota against the caller's stored tier.
    /// Returns the limit types that are actually metered for this caller, to
    /// be incremented on success.
    async fn enforce_quotas(&self, caller: &CallerIdentity) -> Result<Vec<LimitType>, AppError> {
        let tier = self.limiter.tier_for(&caller.user_id).await;
        let mut enforced = Vec::with_capacity(2);

        for limit_type in [LimitType::Daily, LimitType::Monthly] {
            let decision = self.limiter.check(&caller.user_id, tier, limit_type).await;

            if !decision.allowed {
                info!(
                    user_id = %caller.user_id,
                    limit_type = limit_type.as_str(),
                    limit = decision.limit,
                    "Enhancement quota exhausted"
                );
                return Err(AppError::RateLimited {
                    limit: decision.limit,
                    remaining: decision.remaining,
                    reset_at: decision.reset_at,
                    retry_after: decision.retry_after,
                    limit_type,
                });
            }

            if decision.limit != UNLIMITED {
                enforced.push(limit_type);
            }
        }

        Ok(enforced)
    }

    /// Anonymize, fan out to the three roles, and merge. Never fails.
    pub async fn orchestrate(
        &self,
        section: SectionKind,
        text: &str,
        context: &EnhanceContext,
    ) -> SynthesisResult {
        let anonymized = anonymize(text);
        if anonymized.found_pii() {
            debug!(
                kinds = ?anonymized.mapping.keys().collect::<Vec<_>>(),
                "PII replaced before agent dispatch"
            );
        }

        let [writer_prompt, ats_prompt, industry_prompt] =
            AgentRole::ALL.map(|role| build_prompt(role, section, &anonymized.text, context));

        let (writer, ats, industry) = tokio::join!(
            self.run_agent(AgentRole::Writer, &writer_prompt),
            self.run_agent(AgentRole::AtsOptimizer, &ats_prompt),
            self.run_agent(AgentRole::IndustryExpert, &industry_prompt),
        );

        synthesize(
            RoleOutputs {
                writer,
                ats,
                industry,
            },
            &anonymized.text,
            text,
        )
    }

    async fn run_agent(&self, role: AgentRole, prompt: &str) -> AgentOutput {
        let response = self.agents.call(prompt, role).await;
        let meta = response.meta(self.agents.provider_name());
        normalize(role, &response.raw, meta)
    }

    async fn append_version(
        &self,
        document_id: Uuid,
        section: SectionKind,
        context: &EnhanceContext,
        text: &str,
        ats_score: f64,
    ) {
        let version = NewVersion {
            section,
            section_index: context.section_index,
            text: text.to_string(),
            ats_score,
            created_at: Utc::now(),
            source: AI_ENHANCEMENT_SOURCE.to_string(),
        };

        match self.documents.append_version(document_id, version).await {
            Ok(version_id) => debug!(%document_id, %version_id, "Enhanced version stored"),
            Err(e) => error!(%document_id, error = %e, "Failed to store enhanced version"),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
