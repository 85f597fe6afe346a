use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata key carrying the `"<project>/<dataset-name>"` partition value.
pub const NAMESPACE_KEY: &str = "namespace";

/// Metadata key injected by splitters with the chunk's byte offset in its
/// parent document.
pub const START_INDEX_KEY: &str = "start_index";

/// A unit of content plus metadata, ready for transformation, splitting,
/// caching or indexing.
///
/// The serialized form (`{"page_content": ..., "metadata": ...}`) doubles as
/// the cache file format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub page_content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Chunk {
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(page_content: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata,
        }
    }

    /// Merges `extra` into the chunk's metadata, overwriting existing keys.
    pub fn merge_metadata(&mut self, extra: &Map<String, Value>) {
        for (key, value) in extra {
            self.metadata.insert(key.clone(), value.clone());
        }
    }

    pub fn insert_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata.get(NAMESPACE_KEY).and_then(Value::as_str)
    }

    pub fn set_namespace(&mut self, namespace: &str) {
        self.metadata
            .insert(NAMESPACE_KEY.to_owned(), Value::String(namespace.to_owned()));
    }

    /// Reads the metadata field named by `key` as a string, stringifying
    /// scalar values. Used for source-id grouping and cache file naming.
    pub fn metadata_str(&self, key: &str) -> Option<String> {
        match self.metadata.get(key)? {
            Value::String(value) => Some(value.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Byte offset of this chunk within its parent document, zero when the
    /// chunk was never split.
    pub fn start_index(&self) -> u64 {
        self.metadata
            .get(START_INDEX_KEY)
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }
}
