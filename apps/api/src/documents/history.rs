use std::collections::BTreeMap;

use tracing::{error, info, warn};
use uuid::Uuid;

use super::{DocumentStore, EnhancementHistoryEntry, UpdateOutcome};

/// Most recent entries kept per document.
pub const MAX_HISTORY: usize = 50;

/// Appends `entry`, evicting the oldest entries beyond [`MAX_HISTORY`].
pub fn push_capped(history: &mut Vec<EnhancementHistoryEntry>, entry: EnhancementHistoryEntry) {
    history.push(entry);
    if history.len() > MAX_HISTORY {
        let excess = history.len() - MAX_HISTORY;
        history.drain(..excess);
    }
}

/// Records an enhancement against a document. Best-effort: store failures
/// and missing documents are logged, never raised. `None` means the store
/// errored.
pub async fn append_history(
    store: &dyn DocumentStore,
    document_id: Uuid,
    entry: EnhancementHistoryEntry,
    section_score: f64,
    overall_score: f64,
) -> Option<UpdateOutcome> {
    let section = entry.section.as_str().to_string();
    let scores = BTreeMap::from([(section.clone(), section_score)]);

    match store
        .update_analysis(document_id, entry, scores, overall_score)
        .await
    {
        Ok(UpdateOutcome::Updated) => {
            info!(%document_id, section = %section, "Enhancement history updated");
            Some(UpdateOutcome::Updated)
        }
        Ok(UpdateOutcome::NotFound) => {
            warn!(%document_id, "Enhancement history target not found");
            Some(UpdateOutcome::NotFound)
        }
        Err(e) => {
            error!(%document_id, error = %e, "Failed to update enhancement history");
            None
        }
    }
}
