//! Process-local document store used when no database is configured.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::history::push_capped;
use super::{
    AiAnalysis, DocumentStore, EnhancementHistoryEntry, NewVersion, ResumeDocument, StoreError,
    UpdateOutcome,
};

#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<Uuid, ResumeDocument>>,
    versions: RwLock<HashMap<Uuid, Vec<(Uuid, NewVersion)>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty-analysis document owned by `owner_id`.
    pub async fn insert_document(&self, owner_id: &str, sections: Value) -> Uuid {
        let now = Utc::now();
        let doc = ResumeDocument {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            sections,
            ai_analysis: AiAnalysis::default(),
            created_at: now,
            updated_at: now,
        };
        let id = doc.id;
        self.documents.write().await.insert(id, doc);
        id
    }

    pub async fn versions(&self, id: Uuid) -> Vec<NewVersion> {
        self.versions
            .read()
            .await
            .get(&id)
            .map(|v| v.iter().map(|(_, version)| version.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get_document(&self, id: Uuid) -> Result<Option<ResumeDocument>, StoreError> {
        Ok(self.documents.read().await.get(&id).cloned())
    }

    async fn append_version(&self, id: Uuid, version: NewVersion) -> Result<Uuid, StoreError> {
        let version_id = Uuid::new_v4();
        self.versions
            .write()
            .await
            .entry(id)
            .or_default()
            .push((version_id, version));
        Ok(version_id)
    }

    async fn update_analysis(
        &self,
        id: Uuid,
        entry: EnhancementHistoryEntry,
        section_scores: BTreeMap<String, f64>,
        overall_score: f64,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut documents = self.documents.write().await;
        let Some(doc) = documents.get_mut(&id) else {
            return Ok(UpdateOutcome::NotFound);
        };

        let now = Utc::now();
        let analysis = &mut doc.ai_analysis;
        push_capped(&mut analysis.enhancement_history, entry);
        analysis.section_scores.extend(section_scores);
        analysis.overall_ats_score = Some(overall_score);
        analysis.last_analyzed = Some(now);
        doc.updated_at = now;

        Ok(UpdateOutcome::Updated)
    }
}
