use std::sync::Arc;

use async_stream::try_stream;
use async_trait::async_trait;
use common::{
    document::Chunk,
    error::AppError,
    storage::{db::SurrealDbClient, types::indexed_chunk::IndexedChunk},
    utils::{config::CleanupMode, embedding::EmbeddingProvider},
};
use dataset_pipeline::{ChunkStream, Dataset, DocumentLoader, IndexMode};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    deleter::delete_by_filter,
    indexer::{clear_dataset, index_dataset, IndexCounters, IndexOptions, ReconcileOutcome},
    store::{SurrealVectorStore, VectorStore},
};

struct StaticLoader {
    chunks: Vec<Chunk>,
}

impl DocumentLoader for StaticLoader {
    fn lazy_load(&self) -> ChunkStream {
        let chunks = self.chunks.clone();
        Box::pin(try_stream! {
            for chunk in chunks {
                yield chunk;
            }
        })
    }
}

/// Records add-batch sizes and refuses deletes, standing in for a vector
/// store adapter without delete-by-key support.
struct AppendOnlyStore {
    batches: Mutex<Vec<usize>>,
}

impl AppendOnlyStore {
    fn new() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VectorStore for AppendOnlyStore {
    fn supports_delete(&self) -> bool {
        false
    }

    async fn add_chunks(&self, _keys: &[String], chunks: &[Chunk]) -> Result<(), AppError> {
        self.batches.lock().await.push(chunks.len());
        Ok(())
    }

    async fn delete_by_keys(&self, _keys: &[String]) -> Result<(), AppError> {
        Err(AppError::Processing(
            "append-only store cannot delete".into(),
        ))
    }

    async fn metadata_search(
        &self,
        _filters: &[(String, String)],
        _k: usize,
    ) -> Result<Vec<Chunk>, AppError> {
        Ok(Vec::new())
    }

    async fn similarity_search(
        &self,
        _query: &str,
        _filters: &[(String, String)],
        _k: usize,
    ) -> Result<Vec<Chunk>, AppError> {
        Ok(Vec::new())
    }
}

/// Pass-through store that counts metadata searches, to observe the delete
/// loop's paging behaviour.
struct CountingStore {
    inner: SurrealVectorStore,
    searches: Mutex<usize>,
}

impl CountingStore {
    fn new(inner: SurrealVectorStore) -> Self {
        Self {
            inner,
            searches: Mutex::new(0),
        }
    }
}

#[async_trait]
impl VectorStore for CountingStore {
    fn supports_delete(&self) -> bool {
        self.inner.supports_delete()
    }

    async fn add_chunks(&self, keys: &[String], chunks: &[Chunk]) -> Result<(), AppError> {
        self.inner.add_chunks(keys, chunks).await
    }

    async fn delete_by_keys(&self, keys: &[String]) -> Result<(), AppError> {
        self.inner.delete_by_keys(keys).await
    }

    async fn metadata_search(
        &self,
        filters: &[(String, String)],
        k: usize,
    ) -> Result<Vec<Chunk>, AppError> {
        *self.searches.lock().await += 1;
        self.inner.metadata_search(filters, k).await
    }

    async fn similarity_search(
        &self,
        query: &str,
        filters: &[(String, String)],
        k: usize,
    ) -> Result<Vec<Chunk>, AppError> {
        self.inner.similarity_search(query, filters, k).await
    }
}

async fn harness() -> (Arc<SurrealDbClient>, SurrealVectorStore) {
    let database = Uuid::new_v4().to_string();
    let db = Arc::new(
        SurrealDbClient::memory("test_ns", &database)
            .await
            .expect("Failed to start in-memory surrealdb"),
    );
    db.ensure_initialized(8).await.expect("init indexes");

    let embedder =
        Arc::new(EmbeddingProvider::new_hashed(8).expect("hashed embedding provider"));
    let store = SurrealVectorStore::new(Arc::clone(&db), embedder);
    (db, store)
}

fn source_chunk(content: &str, source: &str) -> Chunk {
    let mut chunk = Chunk::new(content);
    chunk.insert_metadata("source", source);
    chunk
}

fn dataset(chunks: Vec<Chunk>, cleanup: Option<CleanupMode>) -> Dataset {
    Dataset::new("docs", Arc::new(StaticLoader { chunks })).with_cleanup(cleanup)
}

fn two_source_corpus() -> Vec<Chunk> {
    vec![
        source_chunk("alpha one", "A"),
        source_chunk("alpha two", "A"),
        source_chunk("beta one", "B"),
        source_chunk("beta two", "B"),
    ]
}

async fn stored_contents(db: &SurrealDbClient) -> Vec<String> {
    let mut contents: Vec<String> = db
        .get_all_stored_items::<IndexedChunk>()
        .await
        .expect("list indexed chunks")
        .into_iter()
        .map(|chunk| chunk.page_content)
        .collect();
    contents.sort();
    contents
}

fn expect_counters(outcome: ReconcileOutcome) -> IndexCounters {
    match outcome {
        ReconcileOutcome::Reconciled(counters) => counters,
        other => panic!("expected reconciled outcome, got {other:?}"),
    }
}

#[tokio::test]
async fn unchanged_input_is_idempotent_under_full_cleanup() {
    let (db, store) = harness().await;

    let first = dataset(two_source_corpus(), Some(CleanupMode::Full));
    let counters = expect_counters(
        index_dataset(&db, &store, &first, "kb", IndexOptions::default())
            .await
            .expect("first run"),
    );
    assert_eq!(
        counters,
        IndexCounters {
            added: 4,
            updated: 0,
            skipped: 0,
            deleted: 0
        }
    );

    let second = dataset(two_source_corpus(), Some(CleanupMode::Full));
    let counters = expect_counters(
        index_dataset(&db, &store, &second, "kb", IndexOptions::default())
            .await
            .expect("second run"),
    );
    assert_eq!(
        counters,
        IndexCounters {
            added: 0,
            updated: 0,
            skipped: 4,
            deleted: 0
        }
    );

    assert_eq!(stored_contents(&db).await.len(), 4);
}

#[tokio::test]
async fn incremental_cleanup_retires_only_the_changed_fragment() {
    let (db, store) = harness().await;

    let first = dataset(two_source_corpus(), Some(CleanupMode::Incremental));
    index_dataset(&db, &store, &first, "kb", IndexOptions::default())
        .await
        .expect("first run");

    // one fragment of A is replaced; B and the other fragment of A stay
    let second = dataset(
        vec![
            source_chunk("alpha one", "A"),
            source_chunk("alpha two revised", "A"),
            source_chunk("beta one", "B"),
            source_chunk("beta two", "B"),
        ],
        Some(CleanupMode::Incremental),
    );
    let counters = expect_counters(
        index_dataset(&db, &store, &second, "kb", IndexOptions::default())
            .await
            .expect("second run"),
    );
    assert_eq!(
        counters,
        IndexCounters {
            added: 1,
            updated: 0,
            skipped: 3,
            deleted: 1
        }
    );

    let contents = stored_contents(&db).await;
    assert!(contents.contains(&"alpha two revised".to_string()));
    assert!(!contents.contains(&"alpha two".to_string()));
    assert_eq!(contents.len(), 4);
}

#[tokio::test]
async fn incremental_cleanup_leaves_untouched_sources_alone() {
    let (db, store) = harness().await;

    let first = dataset(two_source_corpus(), Some(CleanupMode::Incremental));
    index_dataset(&db, &store, &first, "kb", IndexOptions::default())
        .await
        .expect("first run");

    // B disappears from the input entirely; incremental cleanup never saw
    // group B this run, so its chunks survive
    let second = dataset(
        vec![
            source_chunk("alpha one", "A"),
            source_chunk("alpha two", "A"),
        ],
        Some(CleanupMode::Incremental),
    );
    let counters = expect_counters(
        index_dataset(&db, &store, &second, "kb", IndexOptions::default())
            .await
            .expect("second run"),
    );
    assert_eq!(
        counters,
        IndexCounters {
            added: 0,
            updated: 0,
            skipped: 2,
            deleted: 0
        }
    );
    assert_eq!(stored_contents(&db).await.len(), 4);
}

#[tokio::test]
async fn full_cleanup_retires_removed_sources() {
    let (db, store) = harness().await;

    let first = dataset(two_source_corpus(), Some(CleanupMode::Full));
    index_dataset(&db, &store, &first, "kb", IndexOptions::default())
        .await
        .expect("first run");

    let second = dataset(
        vec![
            source_chunk("alpha one", "A"),
            source_chunk("alpha two", "A"),
        ],
        Some(CleanupMode::Full),
    );
    let counters = expect_counters(
        index_dataset(&db, &store, &second, "kb", IndexOptions::default())
            .await
            .expect("second run"),
    );
    assert_eq!(
        counters,
        IndexCounters {
            added: 0,
            updated: 0,
            skipped: 2,
            deleted: 2
        }
    );

    let contents = stored_contents(&db).await;
    assert_eq!(contents, vec!["alpha one".to_string(), "alpha two".to_string()]);
}

#[tokio::test]
async fn append_only_store_takes_fixed_size_batches() {
    let (db, _) = harness().await;
    let store = AppendOnlyStore::new();

    let chunks: Vec<Chunk> = (0..250)
        .map(|index| source_chunk(&format!("chunk number {index}"), &format!("s{index}")))
        .collect();
    let dataset = dataset(chunks, None);

    let outcome = index_dataset(&db, &store, &dataset, "kb", IndexOptions::default())
        .await
        .expect("append run");
    assert_eq!(outcome, ReconcileOutcome::AppendOnly { added: 250 });
    assert_eq!(*store.batches.lock().await, vec![100, 100, 50]);
}

#[tokio::test]
async fn cleanup_against_append_only_store_fails_before_any_write() {
    let (db, _) = harness().await;
    let store = AppendOnlyStore::new();

    let dataset = dataset(two_source_corpus(), Some(CleanupMode::Full));
    let result = index_dataset(&db, &store, &dataset, "kb", IndexOptions::default()).await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(store.batches.lock().await.is_empty());
}

#[tokio::test]
async fn force_rewrites_existing_chunks_as_updates() {
    let (db, store) = harness().await;

    let first = dataset(two_source_corpus(), Some(CleanupMode::Full));
    index_dataset(&db, &store, &first, "kb", IndexOptions::default())
        .await
        .expect("first run");

    let second = dataset(two_source_corpus(), Some(CleanupMode::Full));
    let counters = expect_counters(
        index_dataset(&db, &store, &second, "kb", IndexOptions { force: true })
            .await
            .expect("forced run"),
    );
    assert_eq!(
        counters,
        IndexCounters {
            added: 0,
            updated: 4,
            skipped: 0,
            deleted: 0
        }
    );
    assert_eq!(stored_contents(&db).await.len(), 4);
}

#[tokio::test]
async fn clear_retires_the_whole_namespace() {
    let (db, store) = harness().await;

    let first = dataset(two_source_corpus(), Some(CleanupMode::Full));
    index_dataset(&db, &store, &first, "kb", IndexOptions::default())
        .await
        .expect("index run");

    let counters = expect_counters(
        clear_dataset(&db, &store, &first, "kb")
            .await
            .expect("clear run"),
    );
    assert_eq!(counters.deleted, 4);
    assert!(stored_contents(&db).await.is_empty());
}

#[tokio::test]
async fn disabled_dataset_is_skipped() {
    let (db, store) = harness().await;

    let dataset =
        dataset(two_source_corpus(), None).with_index_mode(IndexMode::Disabled);
    let outcome = index_dataset(&db, &store, &dataset, "kb", IndexOptions::default())
        .await
        .expect("run");
    assert_eq!(outcome, ReconcileOutcome::Skipped);
    assert!(stored_contents(&db).await.is_empty());
}

#[tokio::test]
async fn delete_by_filter_drains_matches_in_pages() {
    let (db, store) = harness().await;

    let chunks: Vec<Chunk> = (0..25)
        .map(|index| {
            let mut chunk = source_chunk(&format!("chunk number {index}"), &format!("s{index}"));
            chunk.insert_metadata("tag", "purge");
            chunk
        })
        .collect();
    let docs = dataset(chunks, Some(CleanupMode::Full));
    index_dataset(&db, &store, &docs, "kb", IndexOptions::default())
        .await
        .expect("index run");

    let counting = CountingStore::new(store);
    let deleted = delete_by_filter(
        &db,
        &counting,
        std::slice::from_ref(&docs),
        "kb",
        &[("tag".to_string(), "purge".to_string())],
        None,
    )
    .await
    .expect("delete run");

    assert_eq!(deleted, 25);
    // three deleting passes of 10/10/5 plus the final empty page
    assert_eq!(*counting.searches.lock().await, 4);
    assert!(stored_contents(&db).await.is_empty());
}

#[tokio::test]
async fn delete_by_filter_retires_sibling_fragments() {
    let (db, store) = harness().await;

    let mut marked = source_chunk("alpha one", "A");
    marked.insert_metadata("marker", "hit");
    let docs = dataset(
        vec![
            marked,
            source_chunk("alpha two", "A"),
            source_chunk("beta one", "B"),
        ],
        Some(CleanupMode::Full),
    );
    index_dataset(&db, &store, &docs, "kb", IndexOptions::default())
        .await
        .expect("index run");

    let deleted = delete_by_filter(
        &db,
        &store,
        std::slice::from_ref(&docs),
        "kb",
        &[("marker".to_string(), "hit".to_string())],
        None,
    )
    .await
    .expect("delete run");

    // the matched fragment and its sibling from source A are both gone
    assert_eq!(deleted, 2);
    assert_eq!(stored_contents(&db).await, vec!["beta one".to_string()]);
}

#[tokio::test]
async fn delete_by_filter_leaves_unmanaged_namespaces_untouched() {
    let (db, store) = harness().await;

    let mut managed = source_chunk("managed chunk", "A");
    managed.insert_metadata("tag", "x");
    let docs = dataset(vec![managed], Some(CleanupMode::Full));
    index_dataset(&db, &store, &docs, "kb", IndexOptions::default())
        .await
        .expect("index run");

    // a chunk from a namespace no dataset manages, matching the same filter
    let mut foreign = Chunk::new("foreign chunk");
    foreign.set_namespace("kb/foreign");
    foreign.insert_metadata("source", "F");
    foreign.insert_metadata("tag", "x");
    store
        .add_chunks(&["foreign-key".to_string()], &[foreign])
        .await
        .expect("insert foreign chunk");

    let deleted = delete_by_filter(
        &db,
        &store,
        std::slice::from_ref(&docs),
        "kb",
        &[("tag".to_string(), "x".to_string())],
        None,
    )
    .await
    .expect("delete run");

    assert_eq!(deleted, 1);
    assert_eq!(stored_contents(&db).await, vec!["foreign chunk".to_string()]);
}

#[tokio::test]
async fn delete_scoped_to_another_dataset_removes_nothing() {
    let (db, store) = harness().await;

    let mut managed = source_chunk("managed chunk", "A");
    managed.insert_metadata("tag", "x");
    let docs = dataset(vec![managed], Some(CleanupMode::Full));
    index_dataset(&db, &store, &docs, "kb", IndexOptions::default())
        .await
        .expect("index run");

    let deleted = delete_by_filter(
        &db,
        &store,
        std::slice::from_ref(&docs),
        "kb",
        &[("tag".to_string(), "x".to_string())],
        Some("other"),
    )
    .await
    .expect("delete run");

    assert_eq!(deleted, 0);
    assert_eq!(stored_contents(&db).await.len(), 1);
}

#[tokio::test]
async fn delete_without_filter_is_a_usage_error() {
    let (db, store) = harness().await;
    let docs = dataset(Vec::new(), Some(CleanupMode::Full));

    let result = delete_by_filter(&db, &store, std::slice::from_ref(&docs), "kb", &[], None).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn missing_source_id_metadata_is_fatal() {
    let (db, store) = harness().await;

    let docs = dataset(vec![Chunk::new("no source field")], Some(CleanupMode::Full));
    let result = index_dataset(&db, &store, &docs, "kb", IndexOptions::default()).await;

    assert!(matches!(result, Err(AppError::Processing(_))));
}
