//! Résumé document persistence consumed by the enhancement pipeline.
//!
//! The pipeline only needs three operations: read a document with its owner,
//! append a section version, and record an enhancement in the document's
//! analysis block. Storage layout is owned by the implementations.

pub mod history;
pub mod memory;
pub mod postgres;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::enhancement::models::{EnhanceContext, SectionKind};

pub use history::{append_history, MAX_HISTORY};
pub use memory::InMemoryDocumentStore;
pub use postgres::PgDocumentStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Stored document is malformed: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeDocument {
    pub id: Uuid,
    /// Identity of the owning user, as sent in `x-user-id`.
    pub owner_id: String,
    pub sections: Value,
    pub ai_analysis: AiAnalysis,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiAnalysis {
    /// Oldest first, never longer than [`MAX_HISTORY`].
    pub enhancement_history: Vec<EnhancementHistoryEntry>,
    pub section_scores: BTreeMap<String, f64>,
    pub overall_ats_score: Option<f64>,
    pub last_analyzed: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancementHistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub section: SectionKind,
    pub ats_score_before: f64,
    pub ats_score_after: f64,
    pub confidence: f64,
    pub keywords_added: Vec<String>,
    pub context: EnhanceContext,
}

/// Enhanced section text appended to a document's version log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewVersion {
    pub section: SectionKind,
    pub section_index: Option<i64>,
    pub text: String,
    pub ats_score: f64,
    pub created_at: DateTime<Utc>,
    pub source: String,
}

pub const AI_ENHANCEMENT_SOURCE: &str = "ai_enhancement";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    NotFound,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_document(&self, id: Uuid) -> Result<Option<ResumeDocument>, StoreError>;

    /// Appends a version and returns its id.
    async fn append_version(&self, id: Uuid, version: NewVersion) -> Result<Uuid, StoreError>;

    /// Pushes `entry` onto the capped history, merges `section_scores`, sets
    /// the overall score and refreshes timestamps, all as one update.
    async fn update_analysis(
        &self,
        id: Uuid,
        entry: EnhancementHistoryEntry,
        section_scores: BTreeMap<String, f64>,
        overall_score: f64,
    ) -> Result<UpdateOutcome, StoreError>;
}
