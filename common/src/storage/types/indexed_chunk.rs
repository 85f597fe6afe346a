use crate::{document::Chunk, error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(IndexedChunk, "indexed_chunk", {
    page_content: String,
    metadata: serde_json::Map<String, serde_json::Value>,
    embedding: Vec<f32>
});

impl IndexedChunk {
    /// `key` is the chunk's content fingerprint; it doubles as the record id
    /// so reconcilers can delete entries by key.
    pub fn new(key: String, chunk: Chunk, embedding: Vec<f32>) -> Self {
        let now = Utc::now();
        Self {
            id: key,
            created_at: now,
            updated_at: now,
            page_content: chunk.page_content,
            metadata: chunk.metadata,
            embedding,
        }
    }

    pub fn into_chunk(self) -> Chunk {
        Chunk::with_metadata(self.page_content, self.metadata)
    }

    pub async fn delete_by_keys(db: &SurrealDbClient, keys: &[String]) -> Result<(), AppError> {
        if keys.is_empty() {
            return Ok(());
        }

        let things: Vec<Thing> = keys
            .iter()
            .map(|key| Thing::from((Self::table_name(), key.as_str())))
            .collect();

        db.query(format!(
            "DELETE {} WHERE id IN $things",
            Self::table_name()
        ))
        .bind(("things", things))
        .await?;

        Ok(())
    }

    /// Fetches up to `k` chunks whose metadata matches every `(key, value)`
    /// equality constraint. Results are ordered by record id so repeated
    /// pages are deterministic.
    pub async fn search_by_metadata(
        db: &SurrealDbClient,
        filters: &[(String, String)],
        k: usize,
    ) -> Result<Vec<IndexedChunk>, AppError> {
        let mut query = format!("SELECT * FROM {}", Self::table_name());
        for (position, (key, _)) in filters.iter().enumerate() {
            let clause = if position == 0 { " WHERE" } else { " AND" };
            let escaped = key.replace('\'', "\\'");
            query.push_str(&format!("{clause} metadata['{escaped}'] = $value{position}"));
        }
        query.push_str(&format!(" ORDER BY id LIMIT {k}"));

        let mut request = db.query(query);
        for (position, (_, value)) in filters.iter().enumerate() {
            request = request.bind((format!("value{position}"), value.clone()));
        }

        Ok(request.await?.take(0)?)
    }

    /// K-nearest-neighbour search over the HNSW index, optionally narrowed by
    /// metadata equality constraints.
    pub async fn search_similar(
        db: &SurrealDbClient,
        embedding: Vec<f32>,
        filters: &[(String, String)],
        k: usize,
    ) -> Result<Vec<IndexedChunk>, AppError> {
        let mut clauses = String::new();
        for (position, (key, _)) in filters.iter().enumerate() {
            let escaped = key.replace('\'', "\\'");
            clauses.push_str(&format!("metadata['{escaped}'] = $value{position} AND "));
        }

        let query = format!(
            "SELECT *, vector::distance::knn() AS distance FROM {table} \
             WHERE {clauses}embedding <|{k},40|> $embedding ORDER BY distance",
            table = Self::table_name(),
        );

        let mut request = db.query(query).bind(("embedding", embedding));
        for (position, (_, value)) in filters.iter().enumerate() {
            request = request.bind((format!("value{position}"), value.clone()));
        }

        Ok(request.await?.take(0)?)
    }
}
