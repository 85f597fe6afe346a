use std::sync::Arc;

use async_stream::try_stream;
use common::{
    document::Chunk,
    error::AppError,
    utils::config::CleanupMode,
};
use futures::StreamExt;
use serde_json::{Map, Value};

use crate::{
    loaders::{ChunkStream, DocumentLoader},
    splitters::DocumentSplitter,
    template::ContentTemplate,
    transformers::DocumentTransformer,
};

/// What the index reconciler should do with a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    /// Indexing disabled, the dataset is skipped.
    Disabled,
    /// The dataset only feeds the cache writer.
    CacheOnly,
    /// Normal reconciliation against ledger and vector store.
    Reconcile,
}

/// Where the cache writer puts this dataset's files.
#[derive(Debug, Clone)]
pub struct CacheOutput {
    pub folder: std::path::PathBuf,
    pub varname: String,
}

/// A document source composed with its optional transformer, splitter, static
/// metadata and content template. Built once from configuration, immutable
/// afterwards; the reconcilers only ever pull from `stream()`.
pub struct Dataset {
    pub id: String,
    pub name: String,
    pub index_mode: IndexMode,
    pub cleanup: Option<CleanupMode>,
    pub source_id_key: String,
    pub output: Option<CacheOutput>,
    loader: Arc<dyn DocumentLoader>,
    transformer: Option<Arc<dyn DocumentTransformer>>,
    splitter: Option<Arc<dyn DocumentSplitter>>,
    static_metadata: Option<Map<String, Value>>,
    template: Option<Arc<ContentTemplate>>,
}

impl Dataset {
    pub fn new(id: impl Into<String>, loader: Arc<dyn DocumentLoader>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            index_mode: IndexMode::Reconcile,
            cleanup: None,
            source_id_key: "source".to_owned(),
            output: None,
            loader,
            transformer: None,
            splitter: None,
            static_metadata: None,
            template: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_index_mode(mut self, index_mode: IndexMode) -> Self {
        self.index_mode = index_mode;
        self
    }

    pub fn with_cleanup(mut self, cleanup: Option<CleanupMode>) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn with_source_id_key(mut self, key: impl Into<String>) -> Self {
        self.source_id_key = key.into();
        self
    }

    pub fn with_transformer(mut self, transformer: Arc<dyn DocumentTransformer>) -> Self {
        self.transformer = Some(transformer);
        self
    }

    pub fn with_splitter(mut self, splitter: Arc<dyn DocumentSplitter>) -> Self {
        self.splitter = Some(splitter);
        self
    }

    pub fn with_static_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.static_metadata = Some(metadata);
        self
    }

    pub fn with_template(mut self, source: &str) -> Result<Self, AppError> {
        self.template = Some(Arc::new(ContentTemplate::new(source)?));
        Ok(self)
    }

    pub fn with_output(mut self, folder: impl Into<std::path::PathBuf>, varname: impl Into<String>) -> Self {
        self.output = Some(CacheOutput {
            folder: folder.into(),
            varname: varname.into(),
        });
        self
    }

    pub fn namespace(&self, project: &str) -> String {
        format!("{project}/{}", self.name)
    }

    pub fn has_splitter(&self) -> bool {
        self.splitter.is_some()
    }

    pub fn can_cache(&self) -> bool {
        self.output.is_some()
    }

    pub fn index_label(&self) -> &'static str {
        match self.index_mode {
            IndexMode::Disabled => "false",
            IndexMode::CacheOnly => "cache",
            IndexMode::Reconcile => "true",
        }
    }

    pub fn cleanup_label(&self) -> String {
        match self.cleanup {
            Some(mode) => mode.to_string(),
            None => "none".to_owned(),
        }
    }

    /// The finalized chunk sequence: load, merge static metadata, transform,
    /// split, then tag the namespace and apply the content template. Every
    /// call produces a fresh stream; nothing is pulled until polled.
    pub fn stream(&self, project: &str) -> ChunkStream {
        let loader = Arc::clone(&self.loader);
        let transformer = self.transformer.clone();
        let splitter = self.splitter.clone();
        let static_metadata = self.static_metadata.clone();
        let template = self.template.clone();
        let namespace = self.namespace(project);

        Box::pin(try_stream! {
            let mut documents = loader.lazy_load();
            while let Some(document) = documents.next().await {
                let mut document = document?;
                if let Some(extra) = &static_metadata {
                    document.merge_metadata(extra);
                }

                let transformed = match &transformer {
                    Some(transformer) => transformer.transform(document)?,
                    None => vec![document],
                };

                for document in transformed {
                    let fragments = match &splitter {
                        Some(splitter) => splitter.split(&document)?,
                        None => vec![document],
                    };

                    for mut chunk in fragments {
                        chunk.set_namespace(&namespace);
                        if let Some(template) = &template {
                            chunk.page_content = template.render(&chunk)?;
                        }
                        yield chunk;
                    }
                }
            }
        })
    }

    /// First chunk of the dataset, mostly useful to inspect metadata.
    pub async fn first_chunk(&self, project: &str) -> Result<Option<Chunk>, AppError> {
        let mut stream = self.stream(project);
        match stream.next().await {
            Some(chunk) => Ok(Some(chunk?)),
            None => Ok(None),
        }
    }
}
