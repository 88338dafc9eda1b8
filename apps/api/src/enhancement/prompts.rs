// Role prompts for the three enhancement agents.
// Every template ends with the JSON output contract; the normalizer still
// tolerates providers that ignore it.

use crate::enhancement::agents::AgentRole;
use crate::enhancement::anonymizer::{anonymize_with, PiiKind};
use crate::enhancement::models::{EnhanceContext, SectionKind};

const DEFAULT_INDUSTRY: &str = "Software Engineering";

/// Shared output contract appended to every role prompt.
pub const OUTPUT_CONTRACT: &str = r#"IMPORTANT: Return ONLY a JSON object with exactly these fields:
{"text": "<the improved section as PLAIN TEXT, not JSON and not a sections structure>", "suggestions": ["<short actionable suggestion>"], "confidence": 0.9}
- "text" must be a plain string. Use \n for line breaks.
- "suggestions" must be an array of strings.
- "confidence" must be a number between 0 and 1.
- Keep placeholder tokens such as [NAME], [EMAIL], [PHONE], [URL], [ADDRESS] exactly as written."#;

/// Resume writer template. Replace: {section}, {target}, {input}, {contract}
pub const WRITER_PROMPT_TEMPLATE: &str = r#"Improve this résumé {section} section by rewriting it with stronger language and metrics.
{target}
TEXT TO IMPROVE:
{input}

Your task:
1. Replace weak verbs with power verbs (Led, Engineered, Spearheaded, Delivered)
2. Quantify achievements with numbers, percentages and scale where the text supports it
3. Make every bullet follow: Action Verb + Task + Result
4. Do not fabricate facts; present the existing ones better

{contract}"#;

/// ATS optimizer template. Replace: {section}, {target}, {input}, {contract}
pub const ATS_PROMPT_TEMPLATE: &str = r#"Optimize this résumé {section} section for Applicant Tracking Systems.
{target}
TEXT:
{input}

Your task:
1. Add relevant job keywords naturally (no keyword stuffing)
2. Expand acronyms on first mention, e.g. "ML (Machine Learning)"
3. Use standard headers and simple dashes instead of decorative bullets
4. Do not rewrite for tone or style; that is another reviewer's job

{contract}"#;

/// Industry expert template. Replace: {industry}, {section}, {target}, {input}, {contract}
pub const INDUSTRY_PROMPT_TEMPLATE: &str = r#"You are reviewing a résumé {section} section as a {industry} industry expert.
{target}
TEXT:
{input}

Your task:
1. Use accurate, current {industry} terminology and tools where the text supports them
2. Emphasize skills and projects valuable to {industry} employers
3. Keep the same structure and do not add generic buzzwords

{contract}"#;

/// Request context is user-supplied free text and reaches the provider too,
/// so contact details in it are tokenized like the section body.
fn scrub(field: Option<&str>) -> Option<String> {
    field
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(|f| anonymize_with(f, &PiiKind::CONTACT).text)
}

fn target_line(title: Option<&str>, industry: Option<&str>) -> String {
    match (title, industry) {
        (Some(title), Some(industry)) => format!("Target role: {title} ({industry}).\n"),
        (Some(title), None) => format!("Target role: {title}.\n"),
        (None, Some(industry)) => format!("Target industry: {industry}.\n"),
        (None, None) => String::new(),
    }
}

/// Builds the instruction string for `role`. `anonymized_text` must already be
/// anonymized; this function never sees raw input.
pub fn build_prompt(
    role: AgentRole,
    section: SectionKind,
    anonymized_text: &str,
    context: &EnhanceContext,
) -> String {
    let template = match role {
        AgentRole::Writer => WRITER_PROMPT_TEMPLATE,
        AgentRole::AtsOptimizer => ATS_PROMPT_TEMPLATE,
        AgentRole::IndustryExpert => INDUSTRY_PROMPT_TEMPLATE,
    };
    let title = scrub(context.job_title.as_deref());
    let industry = scrub(context.industry.as_deref());

    template
        .replace("{section}", section.as_str())
        .replace(
            "{industry}",
            industry.as_deref().unwrap_or(DEFAULT_INDUSTRY),
        )
        .replace("{target}", &target_line(title.as_deref(), industry.as_deref()))
        .replace("{contract}", OUTPUT_CONTRACT)
        .replace("{input}", anonymized_text)
}
