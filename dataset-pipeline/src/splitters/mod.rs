use common::{
    document::{Chunk, START_INDEX_KEY},
    error::AppError,
};
use serde::Deserialize;
use text_splitter::{MarkdownSplitter, TextSplitter};

/// Maps one document to many smaller documents. Splitting runs after
/// transformation; each fragment inherits the parent metadata plus a
/// `start_index` byte offset.
pub trait DocumentSplitter: Send + Sync {
    fn split(&self, chunk: &Chunk) -> Result<Vec<Chunk>, AppError>;
}

#[derive(Debug, Deserialize)]
pub struct SplitterParams {
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

fn default_min_chars() -> usize {
    500
}

fn default_max_chars() -> usize {
    2_000
}

fn validate_bounds(min_chars: usize, max_chars: usize) -> Result<(), AppError> {
    if min_chars == 0 || max_chars == 0 || min_chars > max_chars {
        return Err(AppError::Validation(
            "invalid splitter bounds; ensure 0 < min_chars <= max_chars".into(),
        ));
    }
    Ok(())
}

fn fragment(parent: &Chunk, offset: usize, content: &str) -> Chunk {
    let mut chunk = Chunk::with_metadata(content, parent.metadata.clone());
    chunk.insert_metadata(START_INDEX_KEY, offset as u64);
    chunk
}

/// Character-range splitter over plain text.
pub struct CharacterSplitter {
    min_chars: usize,
    max_chars: usize,
}

impl CharacterSplitter {
    pub fn new(params: SplitterParams) -> Result<Self, AppError> {
        validate_bounds(params.min_chars, params.max_chars)?;
        Ok(Self {
            min_chars: params.min_chars,
            max_chars: params.max_chars,
        })
    }
}

impl DocumentSplitter for CharacterSplitter {
    fn split(&self, chunk: &Chunk) -> Result<Vec<Chunk>, AppError> {
        let splitter = TextSplitter::new(self.min_chars..self.max_chars);
        Ok(splitter
            .chunk_indices(&chunk.page_content)
            .map(|(offset, content)| fragment(chunk, offset, content))
            .collect())
    }
}

/// Structure-aware splitter for markdown documents.
pub struct MarkdownDocumentSplitter {
    min_chars: usize,
    max_chars: usize,
}

impl MarkdownDocumentSplitter {
    pub fn new(params: SplitterParams) -> Result<Self, AppError> {
        validate_bounds(params.min_chars, params.max_chars)?;
        Ok(Self {
            min_chars: params.min_chars,
            max_chars: params.max_chars,
        })
    }
}

impl DocumentSplitter for MarkdownDocumentSplitter {
    fn split(&self, chunk: &Chunk) -> Result<Vec<Chunk>, AppError> {
        let splitter = MarkdownSplitter::new(self.min_chars..self.max_chars);
        Ok(splitter
            .chunk_indices(&chunk.page_content)
            .map(|(offset, content)| fragment(chunk, offset, content))
            .collect())
    }
}
