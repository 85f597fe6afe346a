use std::collections::BTreeMap;
use std::sync::Arc;

use common::{document::Chunk, error::AppError, storage::db::SurrealDbClient};
use dataset_pipeline::{Dataset, IndexMode};
use tracing::{debug, info};

use crate::{ledger::RecordLedger, store::VectorStore};

/// Page size for the delete fixed-point loop.
pub const DELETE_PAGE_SIZE: usize = 10;

/// Removes every chunk matching the metadata filter from every namespace a
/// managed dataset owns, retiring sibling fragments of matched sources along
/// the way. Returns the total number of deleted chunks.
///
/// The loop searches, deletes, and searches again until a pass deletes
/// nothing; matches in namespaces no dataset manages are left untouched.
pub async fn delete_by_filter(
    db: &Arc<SurrealDbClient>,
    store: &dyn VectorStore,
    datasets: &[Dataset],
    project: &str,
    filters: &[(String, String)],
    dataset_id: Option<&str>,
) -> Result<usize, AppError> {
    if filters.is_empty() {
        return Err(AppError::Validation("Missing delete filter value".into()));
    }
    if !store.supports_delete() {
        return Err(AppError::Validation(
            "delete by filter requires a vector store with delete support".into(),
        ));
    }

    let mut total_deleted = 0usize;

    loop {
        let page = store.metadata_search(filters, DELETE_PAGE_SIZE).await?;
        if page.is_empty() {
            break;
        }

        let mut by_namespace: BTreeMap<String, Vec<&Chunk>> = BTreeMap::new();
        for chunk in &page {
            if let Some(namespace) = chunk.namespace() {
                by_namespace.entry(namespace.to_owned()).or_default().push(chunk);
            }
        }

        let mut deleted_this_pass = 0usize;
        for (namespace, chunks) in by_namespace {
            let Some(dataset) = resolve_dataset(datasets, project, &namespace, dataset_id)
            else {
                debug!(%namespace, "no managed dataset for namespace, leaving matches untouched");
                continue;
            };

            // Retire whole source groups, not just the returned fragments.
            let mut group_ids: Vec<String> = chunks
                .iter()
                .filter_map(|chunk| chunk.metadata_str(&dataset.source_id_key))
                .collect();
            group_ids.sort();
            group_ids.dedup();
            if group_ids.is_empty() {
                continue;
            }

            let ledger = RecordLedger::new(Arc::clone(db), namespace);
            let keys = ledger.list_keys(Some(&group_ids), None, None).await?;
            if keys.is_empty() {
                continue;
            }

            store.delete_by_keys(&keys).await?;
            ledger.delete_keys(&keys).await?;
            deleted_this_pass += keys.len();
        }

        total_deleted += deleted_this_pass;
        if deleted_this_pass == 0 {
            // Every remaining match is outside this process's management.
            break;
        }
    }

    info!(deleted = total_deleted, "delete query processed");
    Ok(total_deleted)
}

fn resolve_dataset<'a>(
    datasets: &'a [Dataset],
    project: &str,
    namespace: &str,
    dataset_id: Option<&str>,
) -> Option<&'a Dataset> {
    datasets.iter().find(|dataset| {
        dataset_id.map_or(true, |id| dataset.id == id)
            && dataset.index_mode == IndexMode::Reconcile
            && dataset.namespace(project) == namespace
    })
}
