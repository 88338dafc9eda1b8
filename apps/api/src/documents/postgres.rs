use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{
    AiAnalysis, DocumentStore, EnhancementHistoryEntry, NewVersion, ResumeDocument, StoreError,
    UpdateOutcome, MAX_HISTORY,
};

#[derive(Debug, FromRow)]
struct ResumeRow {
    id: Uuid,
    owner_id: String,
    sections: Value,
    section_scores: Value,
    overall_ats_score: Option<f64>,
    last_analyzed: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get_document(&self, id: Uuid) -> Result<Option<ResumeDocument>, StoreError> {
        let Some(row) = sqlx::query_as::<_, ResumeRow>(
            r#"
            SELECT id, owner_id, sections, section_scores, overall_ats_score,
                   last_analyzed, created_at, updated_at
            FROM resumes
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let entries: Vec<Value> = sqlx::query_scalar(
            "SELECT entry FROM enhancement_history WHERE resume_id = $1 ORDER BY id ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let enhancement_history = entries
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<EnhancementHistoryEntry>, _>>()?;

        Ok(Some(ResumeDocument {
            id: row.id,
            owner_id: row.owner_id,
            sections: row.sections,
            ai_analysis: AiAnalysis {
                enhancement_history,
                section_scores: serde_json::from_value(row.section_scores)?,
                overall_ats_score: row.overall_ats_score,
                last_analyzed: row.last_analyzed,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }

    async fn append_version(&self, id: Uuid, version: NewVersion) -> Result<Uuid, StoreError> {
        let version_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO resume_versions
                (id, resume_id, section, section_index, text, ats_score, source, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(version_id)
        .bind(id)
        .bind(version.section.as_str())
        .bind(version.section_index)
        .bind(&version.text)
        .bind(version.ats_score)
        .bind(&version.source)
        .bind(version.created_at)
        .execute(&self.pool)
        .await?;

        Ok(version_id)
    }

    async fn update_analysis(
        &self,
        id: Uuid,
        entry: EnhancementHistoryEntry,
        section_scores: BTreeMap<String, f64>,
        overall_score: f64,
    ) -> Result<UpdateOutcome, StoreError> {
        let scores = serde_json::to_value(&section_scores)?;
        let entry = serde_json::to_value(&entry)?;

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE resumes
            SET section_scores = section_scores || $2,
                overall_ats_score = $3,
                last_analyzed = now(),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&scores)
        .bind(overall_score)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(UpdateOutcome::NotFound);
        }

        sqlx::query("INSERT INTO enhancement_history (resume_id, entry) VALUES ($1, $2)")
            .bind(id)
            .bind(&entry)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            DELETE FROM enhancement_history
            WHERE resume_id = $1
              AND id NOT IN (
                  SELECT id FROM enhancement_history
                  WHERE resume_id = $1
                  ORDER BY id DESC
                  LIMIT $2
              )
            "#,
        )
        .bind(id)
        .bind(MAX_HISTORY as i64)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(UpdateOutcome::Updated)
    }
}
