use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{
    document::Chunk,
    error::AppError,
    storage::db::SurrealDbClient,
    utils::config::CleanupMode,
};
use dataset_pipeline::{cache_writer, Dataset, IndexMode};
use futures::StreamExt;
use tracing::info;

use crate::{
    fingerprint,
    ledger::{LedgerEntry, RecordLedger},
    store::VectorStore,
};

/// Chunks are pushed to the store in fixed-size batches.
pub const INDEX_BATCH_SIZE: usize = 100;

/// Page size for end-of-run retirement sweeps.
const CLEANUP_BATCH_SIZE: usize = 1_000;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexCounters {
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
    pub deleted: usize,
}

/// Terminal state of one dataset run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Indexing is disabled for the dataset.
    Skipped,
    /// The dataset is cache-only; chunks went to the cache writer.
    Cached { written: usize },
    /// Append-only path against a store without delete support; update,
    /// skip and delete counts do not apply.
    AppendOnly { added: usize },
    Reconciled(IndexCounters),
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IndexOptions {
    /// Re-write chunks whose keys are already ledgered, counting them as
    /// updated instead of skipped.
    pub force: bool,
}

/// Runs one dataset through the index reconciler.
pub async fn index_dataset(
    db: &Arc<SurrealDbClient>,
    store: &dyn VectorStore,
    dataset: &Dataset,
    project: &str,
    options: IndexOptions,
) -> Result<ReconcileOutcome, AppError> {
    match dataset.index_mode {
        IndexMode::Disabled => {
            info!(dataset = %dataset.id, "skipping dataset, indexing disabled");
            return Ok(ReconcileOutcome::Skipped);
        }
        IndexMode::CacheOnly => {
            let written = cache_writer::write_files(dataset, project).await?;
            return Ok(ReconcileOutcome::Cached { written });
        }
        IndexMode::Reconcile => {}
    }

    if !store.supports_delete() {
        // Capability gate: a non-deleting store can only take additive
        // writes, so any cleanup mode is a configuration error.
        if let Some(cleanup) = dataset.cleanup {
            return Err(AppError::Validation(format!(
                "dataset '{}' requests {cleanup} cleanup but the vector store cannot delete by key",
                dataset.id
            )));
        }
        return append_only(store, dataset, project).await;
    }

    reconcile(db, store, dataset, project, options).await
}

/// Full-cleanup reconciliation of an empty incoming sequence: retires every
/// ledgered chunk of the dataset's namespace.
pub async fn clear_dataset(
    db: &Arc<SurrealDbClient>,
    store: &dyn VectorStore,
    dataset: &Dataset,
    project: &str,
) -> Result<ReconcileOutcome, AppError> {
    if dataset.index_mode != IndexMode::Reconcile {
        info!(dataset = %dataset.id, "skipping dataset, nothing ledgered to clear");
        return Ok(ReconcileOutcome::Skipped);
    }
    if !store.supports_delete() {
        return Err(AppError::Validation(format!(
            "clearing dataset '{}' requires a vector store with delete support",
            dataset.id
        )));
    }

    let ledger = RecordLedger::new(Arc::clone(db), dataset.namespace(project));
    let started = Utc::now();

    let deleted = purge_stale(&ledger, store, started).await?;
    let counters = IndexCounters {
        deleted,
        ..IndexCounters::default()
    };

    info!(dataset = %dataset.id, deleted, "dataset cleared");
    Ok(ReconcileOutcome::Reconciled(counters))
}

async fn append_only(
    store: &dyn VectorStore,
    dataset: &Dataset,
    project: &str,
) -> Result<ReconcileOutcome, AppError> {
    let mut added = 0usize;
    let mut keys = Vec::with_capacity(INDEX_BATCH_SIZE);
    let mut chunks = Vec::with_capacity(INDEX_BATCH_SIZE);

    let mut stream = dataset.stream(project);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        keys.push(fingerprint::chunk_key(&chunk));
        chunks.push(chunk);

        if chunks.len() == INDEX_BATCH_SIZE {
            store.add_chunks(&keys, &chunks).await?;
            added += chunks.len();
            keys.clear();
            chunks.clear();
        }
    }

    if !chunks.is_empty() {
        store.add_chunks(&keys, &chunks).await?;
        added += chunks.len();
    }

    info!(dataset = %dataset.id, added, "dataset appended without ledger");
    Ok(ReconcileOutcome::AppendOnly { added })
}

async fn reconcile(
    db: &Arc<SurrealDbClient>,
    store: &dyn VectorStore,
    dataset: &Dataset,
    project: &str,
    options: IndexOptions,
) -> Result<ReconcileOutcome, AppError> {
    let namespace = dataset.namespace(project);
    let ledger = RecordLedger::new(Arc::clone(db), namespace);
    let index_started = Utc::now();
    let mut counters = IndexCounters::default();

    let mut batch: Vec<Chunk> = Vec::with_capacity(INDEX_BATCH_SIZE);
    let mut stream = dataset.stream(project);
    while let Some(chunk) = stream.next().await {
        batch.push(chunk?);
        if batch.len() == INDEX_BATCH_SIZE {
            reconcile_batch(
                &ledger,
                store,
                dataset,
                &batch,
                index_started,
                options,
                &mut counters,
            )
            .await?;
            batch.clear();
        }
    }
    if !batch.is_empty() {
        reconcile_batch(
            &ledger,
            store,
            dataset,
            &batch,
            index_started,
            options,
            &mut counters,
        )
        .await?;
    }

    if dataset.cleanup == Some(CleanupMode::Full) {
        counters.deleted += purge_stale(&ledger, store, index_started).await?;
    }

    info!(
        dataset = %dataset.id,
        cleanup = %dataset.cleanup_label(),
        added = counters.added,
        updated = counters.updated,
        skipped = counters.skipped,
        deleted = counters.deleted,
        "dataset reconciled"
    );
    Ok(ReconcileOutcome::Reconciled(counters))
}

async fn reconcile_batch(
    ledger: &RecordLedger,
    store: &dyn VectorStore,
    dataset: &Dataset,
    batch: &[Chunk],
    index_started: DateTime<Utc>,
    options: IndexOptions,
    counters: &mut IndexCounters,
) -> Result<(), AppError> {
    // Fingerprint the batch, dropping intra-batch duplicate keys. A missing
    // source-id field would silently corrupt the grouping, so it is fatal.
    let mut entries: Vec<(LedgerEntry, &Chunk)> = Vec::with_capacity(batch.len());
    let mut seen_in_batch = HashSet::new();
    for chunk in batch {
        let key = fingerprint::chunk_key(chunk);
        if !seen_in_batch.insert(key.clone()) {
            continue;
        }
        let group_id = chunk.metadata_str(&dataset.source_id_key).ok_or_else(|| {
            AppError::Processing(format!(
                "chunk in dataset '{}' is missing metadata field '{}' required for source grouping",
                dataset.id, dataset.source_id_key
            ))
        })?;
        entries.push((LedgerEntry { key, group_id }, chunk));
    }

    let keys: Vec<String> = entries.iter().map(|(entry, _)| entry.key.clone()).collect();
    let existing = ledger.exists(&keys).await?;

    let mut add_keys = Vec::new();
    let mut add_chunks: Vec<Chunk> = Vec::new();
    let mut refreshed: Vec<String> = Vec::new();
    for (entry, chunk) in &entries {
        if existing.contains(&entry.key) {
            refreshed.push(entry.key.clone());
            if options.force {
                add_keys.push(entry.key.clone());
                add_chunks.push((*chunk).clone());
            }
        } else {
            add_keys.push(entry.key.clone());
            add_chunks.push((*chunk).clone());
            counters.added += 1;
        }
    }

    if options.force {
        counters.updated += refreshed.len();
        if !refreshed.is_empty() {
            store.delete_by_keys(&refreshed).await?;
        }
    } else {
        counters.skipped += refreshed.len();
    }

    if !add_keys.is_empty() {
        store.add_chunks(&add_keys, &add_chunks).await?;
    }

    let ledger_entries: Vec<LedgerEntry> =
        entries.into_iter().map(|(entry, _)| entry).collect();
    ledger.update(&ledger_entries, index_started).await?;

    // Incremental cleanup retires, per batch, the keys of the sources seen
    // in that batch that this run did not reconfirm.
    if dataset.cleanup == Some(CleanupMode::Incremental) {
        let mut group_ids: Vec<String> = ledger_entries
            .iter()
            .map(|entry| entry.group_id.clone())
            .collect();
        group_ids.sort();
        group_ids.dedup();

        let stale = ledger
            .list_keys(Some(&group_ids), Some(index_started), None)
            .await?;
        if !stale.is_empty() {
            store.delete_by_keys(&stale).await?;
            ledger.delete_keys(&stale).await?;
            counters.deleted += stale.len();
        }
    }

    Ok(())
}

/// Deletes, store first then ledger, every key in the namespace whose
/// `last_seen` predates `before`.
async fn purge_stale(
    ledger: &RecordLedger,
    store: &dyn VectorStore,
    before: DateTime<Utc>,
) -> Result<usize, AppError> {
    let mut deleted = 0usize;
    loop {
        let stale = ledger
            .list_keys(None, Some(before), Some(CLEANUP_BATCH_SIZE))
            .await?;
        if stale.is_empty() {
            break;
        }
        store.delete_by_keys(&stale).await?;
        ledger.delete_keys(&stale).await?;
        deleted += stale.len();
    }
    Ok(deleted)
}
