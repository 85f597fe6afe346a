use std::sync::Arc;

use async_trait::async_trait;
use common::{
    document::Chunk,
    error::AppError,
    storage::{db::SurrealDbClient, types::indexed_chunk::IndexedChunk},
    utils::embedding::EmbeddingProvider,
};

/// Capability surface of a vector store as seen by the reconcilers.
///
/// Adapters that cannot delete by key report `supports_delete() == false` and
/// must only ever receive additive writes; the index reconciler rejects any
/// cleanup mode against them before writing anything.
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn supports_delete(&self) -> bool;

    /// Adds chunks under the given keys; `keys` and `chunks` are parallel
    /// slices.
    async fn add_chunks(&self, keys: &[String], chunks: &[Chunk]) -> Result<(), AppError>;

    async fn delete_by_keys(&self, keys: &[String]) -> Result<(), AppError>;

    /// Up to `k` chunks matching every metadata equality constraint.
    async fn metadata_search(
        &self,
        filters: &[(String, String)],
        k: usize,
    ) -> Result<Vec<Chunk>, AppError>;

    /// Nearest neighbours of the embedded query text.
    async fn similarity_search(
        &self,
        query: &str,
        filters: &[(String, String)],
        k: usize,
    ) -> Result<Vec<Chunk>, AppError>;
}

/// SurrealDB-backed store: chunks live in the `indexed_chunk` table with an
/// HNSW index over their embeddings.
pub struct SurrealVectorStore {
    db: Arc<SurrealDbClient>,
    embedder: Arc<EmbeddingProvider>,
}

impl SurrealVectorStore {
    pub fn new(db: Arc<SurrealDbClient>, embedder: Arc<EmbeddingProvider>) -> Self {
        Self { db, embedder }
    }
}

#[async_trait]
impl VectorStore for SurrealVectorStore {
    fn supports_delete(&self) -> bool {
        true
    }

    async fn add_chunks(&self, keys: &[String], chunks: &[Chunk]) -> Result<(), AppError> {
        if keys.len() != chunks.len() {
            return Err(AppError::Processing(
                "mismatched key and chunk counts in vector store add".into(),
            ));
        }
        if chunks.is_empty() {
            return Ok(());
        }

        let contents: Vec<String> = chunks
            .iter()
            .map(|chunk| chunk.page_content.clone())
            .collect();
        let embeddings = self.embedder.embed_batch(contents).await?;

        for ((key, chunk), embedding) in keys.iter().zip(chunks).zip(embeddings) {
            self.db
                .store_item(IndexedChunk::new(key.clone(), chunk.clone(), embedding))
                .await?;
        }

        Ok(())
    }

    async fn delete_by_keys(&self, keys: &[String]) -> Result<(), AppError> {
        IndexedChunk::delete_by_keys(&self.db, keys).await
    }

    async fn metadata_search(
        &self,
        filters: &[(String, String)],
        k: usize,
    ) -> Result<Vec<Chunk>, AppError> {
        let hits = IndexedChunk::search_by_metadata(&self.db, filters, k).await?;
        Ok(hits.into_iter().map(IndexedChunk::into_chunk).collect())
    }

    async fn similarity_search(
        &self,
        query: &str,
        filters: &[(String, String)],
        k: usize,
    ) -> Result<Vec<Chunk>, AppError> {
        let embedding = self.embedder.embed(query).await?;
        let hits = IndexedChunk::search_similar(&self.db, embedding, filters, k).await?;
        Ok(hits.into_iter().map(IndexedChunk::into_chunk).collect())
    }
}
