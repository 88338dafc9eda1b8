use serde::{Deserialize, Serialize};

use crate::errors::AppError;

pub const MIN_TEXT_CHARS: usize = 10;
pub const MAX_TEXT_CHARS: usize = 5000;
pub const MAX_JOB_TITLE_CHARS: usize = 200;
pub const MAX_INDUSTRY_CHARS: usize = 100;

/// Résumé section being enhanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Summary,
    Experience,
    Education,
    Skills,
    Projects,
    Certifications,
    Other,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Summary => "summary",
            SectionKind::Experience => "experience",
            SectionKind::Education => "education",
            SectionKind::Skills => "skills",
            SectionKind::Projects => "projects",
            SectionKind::Certifications => "certifications",
            SectionKind::Other => "other",
        }
    }
}

/// Optional targeting hints supplied with a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnhanceContext {
    pub job_title: Option<String>,
    pub industry: Option<String>,
    pub section_index: Option<i64>,
}

/// Body of `POST /api/v1/resumes/:id/enhance`.
#[derive(Debug, Clone, Deserialize)]
pub struct EnhanceRequest {
    pub section: SectionKind,
    pub text: String,
    pub context: Option<EnhanceContext>,
}

impl EnhanceRequest {
    /// Trims the text and checks every length bound. Returns the request that
    /// the pipeline will work on; nothing downstream re-validates.
    pub fn validate(self) -> Result<Self, AppError> {
        let text = self.text.trim().to_string();
        if text.is_empty() {
            return Err(AppError::Validation(
                "text cannot be empty or whitespace only".to_string(),
            ));
        }

        let len = text.chars().count();
        if len < MIN_TEXT_CHARS {
            return Err(AppError::Validation(format!(
                "text must be at least {MIN_TEXT_CHARS} characters (got {len})"
            )));
        }
        if len > MAX_TEXT_CHARS {
            return Err(AppError::Validation(format!(
                "text must be at most {MAX_TEXT_CHARS} characters (got {len})"
            )));
        }

        if let Some(ctx) = &self.context {
            if let Some(title) = &ctx.job_title {
                if title.chars().count() > MAX_JOB_TITLE_CHARS {
                    return Err(AppError::Validation(format!(
                        "context.job_title must be at most {MAX_JOB_TITLE_CHARS} characters"
                    )));
                }
            }
            if let Some(industry) = &ctx.industry {
                if industry.chars().count() > MAX_INDUSTRY_CHARS {
                    return Err(AppError::Validation(format!(
                        "context.industry must be at most {MAX_INDUSTRY_CHARS} characters"
                    )));
                }
            }
            if matches!(ctx.section_index, Some(i) if i < 0) {
                return Err(AppError::Validation(
                    "context.section_index must be >= 0".to_string(),
                ));
            }
        }

        Ok(Self { text, ..self })
    }

    pub fn context_or_default(&self) -> EnhanceContext {
        self.context.clone().unwrap_or_default()
    }
}
