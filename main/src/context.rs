use std::sync::Arc;

use common::{
    error::AppError,
    storage::db::SurrealDbClient,
    utils::{config::AppConfig, embedding::EmbeddingProvider},
};
use dataset_pipeline::{build_datasets, Dataset};
use sync_engine::SurrealVectorStore;
use tracing::info;

/// Everything a command needs, constructed once at process start and passed
/// by reference into each operation.
pub struct AppContext {
    pub config: AppConfig,
    pub db: Arc<SurrealDbClient>,
    pub store: SurrealVectorStore,
    pub datasets: Vec<Dataset>,
}

impl AppContext {
    pub async fn initialize(config: AppConfig) -> Result<Self, AppError> {
        let db = Arc::new(
            SurrealDbClient::new(
                &config.surrealdb_address,
                &config.surrealdb_username,
                &config.surrealdb_password,
                &config.surrealdb_namespace,
                &config.surrealdb_database,
            )
            .await?,
        );

        let embedding = Arc::new(EmbeddingProvider::from_config(&config).await?);
        info!(
            embedding_backend = embedding.backend_label(),
            embedding_dimension = embedding.dimension(),
            "Embedding provider initialized"
        );

        Self::with_db(config, db, embedding).await
    }

    /// Wires a context onto an already-connected database, used by
    /// `initialize` and by tests running against an in-memory instance.
    pub async fn with_db(
        config: AppConfig,
        db: Arc<SurrealDbClient>,
        embedding: Arc<EmbeddingProvider>,
    ) -> Result<Self, AppError> {
        db.ensure_initialized(embedding.dimension()).await?;

        let datasets = build_datasets(&config.dataset)?;
        let store = SurrealVectorStore::new(Arc::clone(&db), embedding);

        Ok(Self {
            config,
            db,
            store,
            datasets,
        })
    }

    /// The datasets an operation applies to: all of them, or the one named by
    /// `--id`. Naming an unknown dataset is an error rather than a no-op.
    pub fn select_datasets(&self, id: Option<&str>) -> Result<Vec<&Dataset>, AppError> {
        match id {
            None => Ok(self.datasets.iter().collect()),
            Some(id) => {
                let dataset = self
                    .datasets
                    .iter()
                    .find(|dataset| dataset.id == id)
                    .ok_or_else(|| AppError::NotFound(format!("dataset '{id}'")))?;
                Ok(vec![dataset])
            }
        }
    }
}
