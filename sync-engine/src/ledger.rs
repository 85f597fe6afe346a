use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{
    error::AppError,
    storage::{db::SurrealDbClient, types::ledger_record::LedgerRecord},
};

/// A key plus its source-document grouping, as recorded per chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub key: String,
    pub group_id: String,
}

/// Namespace-scoped view over the ledger table. Only the reconcilers mutate
/// it; the pipeline never touches it.
pub struct RecordLedger {
    db: Arc<SurrealDbClient>,
    namespace: String,
}

impl RecordLedger {
    pub fn new(db: Arc<SurrealDbClient>, namespace: impl Into<String>) -> Self {
        Self {
            db,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Which of the given keys the namespace already tracks.
    pub async fn exists(&self, keys: &[String]) -> Result<HashSet<String>, AppError> {
        LedgerRecord::exists(&self.db, &self.namespace, keys).await
    }

    /// Upserts the given entries: existing keys get their `last_seen`
    /// refreshed to `seen_at`, unseen keys are inserted with it.
    pub async fn update(
        &self,
        entries: &[LedgerEntry],
        seen_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if entries.is_empty() {
            return Ok(());
        }

        let keys: Vec<String> = entries.iter().map(|entry| entry.key.clone()).collect();
        let existing = self.exists(&keys).await?;

        LedgerRecord::touch(&self.db, &self.namespace, &keys, seen_at).await?;

        for entry in entries.iter().filter(|entry| !existing.contains(&entry.key)) {
            self.db
                .store_item(LedgerRecord::new(
                    entry.key.clone(),
                    self.namespace.clone(),
                    entry.group_id.clone(),
                    seen_at,
                ))
                .await?;
        }

        Ok(())
    }

    pub async fn list_keys(
        &self,
        group_ids: Option<&[String]>,
        before: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<String>, AppError> {
        LedgerRecord::list_keys(&self.db, &self.namespace, group_ids, before, limit).await
    }

    pub async fn delete_keys(&self, keys: &[String]) -> Result<(), AppError> {
        LedgerRecord::delete_keys(&self.db, &self.namespace, keys).await
    }
}
