//! Synthesizer: merges the three role outputs into one result.
//!
//! Final text comes from the writer. Suggestions are the ordered union
//! writer → ats → industry. Confidence is a fixed-weight average.
//! The weights are carried over as-is and are tunable, not derived.

use serde::Serialize;

use crate::enhancement::agents::AgentRole;
use crate::enhancement::normalizer::{dedup_capped, AgentOutput, MAX_SUGGESTIONS};

pub const WEIGHT_WRITER: f64 = 0.5;
pub const WEIGHT_ATS: f64 = 0.3;
pub const WEIGHT_INDUSTRY: f64 = 0.2;

/// The three normalized outputs a synthesis needs. No partial synthesis.
#[derive(Debug, Clone)]
pub struct RoleOutputs {
    pub writer: AgentOutput,
    pub ats: AgentOutput,
    pub industry: AgentOutput,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleBreakdown {
    pub resume_writer: AgentOutput,
    pub ats_optimizer: AgentOutput,
    pub industry_expert: AgentOutput,
}

#[derive(Debug, Clone, Serialize)]
pub struct SynthesisResult {
    pub text: String,
    /// At most `MAX_SUGGESTIONS`, no duplicates.
    pub suggestions: Vec<String>,
    /// 0.0 – 1.0
    pub confidence: f64,
    pub breakdown: RoleBreakdown,
    /// PII was anonymized before any agent call and is not restored.
    pub pii_anonymized: bool,
}

impl SynthesisResult {
    pub fn output_for(&self, role: AgentRole) -> &AgentOutput {
        match role {
            AgentRole::Writer => &self.breakdown.resume_writer,
            AgentRole::AtsOptimizer => &self.breakdown.ats_optimizer,
            AgentRole::IndustryExpert => &self.breakdown.industry_expert,
        }
    }
}

fn bounded(confidence: f64) -> f64 {
    if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Merges role outputs. `anonymized_input` and `raw_input` are the text
/// fallbacks, in that order, when the writer returned nothing.
pub fn synthesize(outputs: RoleOutputs, anonymized_input: &str, raw_input: &str) -> SynthesisResult {
    let RoleOutputs {
        writer,
        ats,
        industry,
    } = outputs;

    let text = [writer.text.as_str(), anonymized_input, raw_input]
        .into_iter()
        .map(str::trim)
        .find(|t| !t.is_empty())
        .unwrap_or_default()
        .to_string();

    let suggestions = dedup_capped(
        writer
            .suggestions
            .iter()
            .chain(&ats.suggestions)
            .chain(&industry.suggestions)
            .cloned(),
        MAX_SUGGESTIONS,
    );

    let confidence = bounded(
        WEIGHT_WRITER * bounded(writer.confidence)
            + WEIGHT_ATS * bounded(ats.confidence)
            + WEIGHT_INDUSTRY * bounded(industry.confidence),
    );

    SynthesisResult {
        text,
        suggestions,
        confidence,
        breakdown: RoleBreakdown {
            resume_writer: writer,
            ats_optimizer: ats,
            industry_expert: industry,
        },
        pii_anonymized: true,
    }
}
