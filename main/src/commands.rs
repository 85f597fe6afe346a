use common::{document::Chunk, error::AppError};
use dataset_pipeline::cache_writer;
use serde_json::Value;
use sync_engine::{
    clear_dataset, delete_by_filter, index_dataset, IndexOptions, ReconcileOutcome, VectorStore,
};

use crate::context::AppContext;

struct IndexRow {
    dataset: String,
    cleanup: String,
    outcome: ReconcileOutcome,
}

/// `index [--id]`: reconcile one or all datasets and print the counter table.
pub async fn index(ctx: &AppContext, id: Option<&str>, force: bool) -> Result<(), AppError> {
    let options = IndexOptions { force };
    let mut rows = Vec::new();

    for dataset in ctx.select_datasets(id)? {
        let outcome =
            index_dataset(&ctx.db, &ctx.store, dataset, &ctx.config.project, options).await?;
        match outcome {
            ReconcileOutcome::Skipped => {
                println!("Skipping dataset '{}'", dataset.id);
            }
            ReconcileOutcome::Cached { written } => {
                println!(
                    "Wrote {written} cache files for '{}' dataset",
                    dataset.id
                );
            }
            outcome => rows.push(IndexRow {
                dataset: dataset.id.clone(),
                cleanup: dataset.cleanup_label(),
                outcome,
            }),
        }
    }

    print_index_table("Dataset Indexing", &rows);
    Ok(())
}

/// `cache [--id]`: force the cache-writer path for datasets with an output
/// folder.
pub async fn cache(ctx: &AppContext, id: Option<&str>) -> Result<(), AppError> {
    for dataset in ctx.select_datasets(id)? {
        if !dataset.can_cache() {
            println!("No output configured for dataset '{}'", dataset.id);
            continue;
        }
        let written = cache_writer::write_files(dataset, &ctx.config.project).await?;
        println!("Wrote {written} cache files for '{}' dataset", dataset.id);
    }
    Ok(())
}

/// `clear [--id]`: full-cleanup reconciliation against an empty sequence.
pub async fn clear(ctx: &AppContext, id: Option<&str>) -> Result<(), AppError> {
    let mut rows = Vec::new();

    for dataset in ctx.select_datasets(id)? {
        let outcome = clear_dataset(&ctx.db, &ctx.store, dataset, &ctx.config.project).await?;
        match outcome {
            ReconcileOutcome::Skipped => println!("Skipping dataset '{}'", dataset.id),
            outcome => rows.push(IndexRow {
                dataset: dataset.id.clone(),
                cleanup: "full".to_owned(),
                outcome,
            }),
        }
    }

    print_index_table("Dataset Clearing", &rows);
    Ok(())
}

/// `delete --filter k:v [...]`: drain every matching chunk from managed
/// namespaces and print the total.
pub async fn delete(
    ctx: &AppContext,
    filters: &[(String, String)],
    id: Option<&str>,
) -> Result<(), AppError> {
    let deleted = delete_by_filter(
        &ctx.db,
        &ctx.store,
        &ctx.datasets,
        &ctx.config.project,
        filters,
        id,
    )
    .await?;

    println!("{deleted} chunk(s) deleted from database");
    Ok(())
}

/// `ls`: one line per dataset with its capabilities.
pub fn ls(ctx: &AppContext) {
    let id_width = column_width("ID", ctx.datasets.iter().map(|dataset| dataset.id.len()));

    println!("{:<id_width$}  {:<10}  {:<10}", "ID", "Can index?", "Can cache?");
    for dataset in &ctx.datasets {
        println!(
            "{:<id_width$}  {:<10}  {:<10}",
            dataset.id,
            dataset.index_label(),
            dataset.can_cache()
        );
    }
}

/// `search <query>`: similarity search printout.
pub async fn search(
    ctx: &AppContext,
    query: &str,
    filters: &[(String, String)],
    k: usize,
) -> Result<(), AppError> {
    let hits = ctx.store.similarity_search(query, filters, k).await?;

    if hits.is_empty() {
        println!("No results for '{query}'");
        return Ok(());
    }

    for (position, chunk) in hits.iter().enumerate() {
        println!("[{position}] {}", preview(&chunk.page_content, 200));
        println!("    metadata: {}", Value::Object(chunk.metadata.clone()));
    }
    Ok(())
}

/// `metadata [--id]`: first chunk's metadata per dataset, a development aid.
pub async fn metadata(ctx: &AppContext, id: Option<&str>) -> Result<(), AppError> {
    for dataset in ctx.select_datasets(id)? {
        let Some(chunk) = dataset.first_chunk(&ctx.config.project).await? else {
            println!("Dataset '{}' produced no chunks", dataset.id);
            continue;
        };

        println!("Metadata for {}", dataset.id);
        print_metadata_table(&chunk);
    }
    Ok(())
}

fn print_metadata_table(chunk: &Chunk) {
    let key_width = column_width("Key", chunk.metadata.keys().map(String::len));

    println!("{:<key_width$}  {:<8}  Value", "Key", "Type");
    for (key, value) in &chunk.metadata {
        println!("{key:<key_width$}  {:<8}  {value}", value_type(value));
    }
}

fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn preview(content: &str, limit: usize) -> String {
    if content.chars().count() <= limit {
        return content.replace('\n', " ");
    }
    let truncated: String = content.chars().take(limit).collect();
    format!("{}…", truncated.replace('\n', " "))
}

fn column_width(header: &str, lengths: impl Iterator<Item = usize>) -> usize {
    lengths.chain(std::iter::once(header.len())).max().unwrap_or(header.len())
}

fn print_index_table(title: &str, rows: &[IndexRow]) {
    if rows.is_empty() {
        return;
    }

    let id_width = column_width("Dataset", rows.iter().map(|row| row.dataset.len()));

    println!("{title}");
    println!(
        "{:<id_width$}  {:<12}  {:>8}  {:>8}  {:>8}  {:>8}",
        "Dataset", "Cleanup", "Added", "Updated", "Skipped", "Deleted"
    );
    for row in rows {
        let (cleanup, added, updated, skipped, deleted) = match &row.outcome {
            ReconcileOutcome::AppendOnly { added } => (
                "none".to_owned(),
                added.to_string(),
                "-".to_owned(),
                "-".to_owned(),
                "-".to_owned(),
            ),
            ReconcileOutcome::Reconciled(counters) => (
                row.cleanup.clone(),
                counters.added.to_string(),
                counters.updated.to_string(),
                counters.skipped.to_string(),
                counters.deleted.to_string(),
            ),
            // skipped/cached runs never reach the table
            _ => continue,
        };
        println!(
            "{:<id_width$}  {cleanup:<12}  {added:>8}  {updated:>8}  {skipped:>8}  {deleted:>8}",
            row.dataset
        );
    }
}
