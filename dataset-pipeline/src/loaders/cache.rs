use std::path::PathBuf;

use async_stream::try_stream;
use common::{document::Chunk, error::AppError};
use serde::Deserialize;

use super::{fs::collect_files, ChunkStream, DocumentLoader};

#[derive(Debug, Deserialize)]
pub struct CacheLoaderParams {
    pub path: String,
}

/// Re-reads a cache-writer output folder as a document source, turning a
/// previously expensive dataset into a cheap local one.
pub struct CacheLoader {
    root: PathBuf,
}

impl CacheLoader {
    pub fn new(params: CacheLoaderParams) -> Self {
        Self {
            root: PathBuf::from(params.path),
        }
    }
}

impl DocumentLoader for CacheLoader {
    fn lazy_load(&self) -> ChunkStream {
        let root = self.root.clone();

        Box::pin(try_stream! {
            let files = collect_files(&root).await?;
            for path in files {
                if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                    continue;
                }
                let raw = tokio::fs::read(&path).await?;
                let chunk: Chunk = serde_json::from_slice(&raw).map_err(|err| {
                    AppError::Processing(format!(
                        "invalid cache file {}: {err}",
                        path.display()
                    ))
                })?;
                yield chunk;
            }
        })
    }
}
