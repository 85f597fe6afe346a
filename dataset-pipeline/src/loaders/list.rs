use async_stream::try_stream;
use common::{document::Chunk, error::AppError, utils::config::ProviderConfig};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;

use super::{ChunkStream, DocumentLoader};
use crate::registry;

#[derive(Debug, Deserialize)]
pub struct ListLoaderParams {
    pub targets: Vec<String>,
    #[serde(default = "default_varname")]
    pub varname: String,
    pub loader: ProviderConfig,
}

fn default_varname() -> String {
    "path".to_string()
}

/// Turns a single-target loader into a multi-target one: the inner loader
/// configuration is instantiated once per target, with the target substituted
/// into its parameters under `varname`.
pub struct ListLoader {
    targets: Vec<String>,
    varname: String,
    inner: ProviderConfig,
}

impl ListLoader {
    pub fn new(params: ListLoaderParams) -> Self {
        Self {
            targets: params.targets,
            varname: params.varname,
            inner: params.loader,
        }
    }
}

impl DocumentLoader for ListLoader {
    fn lazy_load(&self) -> ChunkStream {
        let targets = self.targets.clone();
        let varname = self.varname.clone();
        let inner = self.inner.clone();

        Box::pin(try_stream! {
            for target in targets {
                let mut target_config = inner.clone();
                target_config
                    .extra
                    .insert(varname.clone(), Value::String(target.clone()));
                let loader = registry::build_loader(&target_config)?;
                let mut documents = loader.lazy_load();
                while let Some(document) = documents.next().await {
                    yield document?;
                }
            }
        })
    }
}
