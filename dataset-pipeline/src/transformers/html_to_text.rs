use common::{document::Chunk, error::AppError};
use dom_smoothie::{Article, Readability, TextMode};
use serde::Deserialize;

use super::DocumentTransformer;

#[derive(Debug, Default, Deserialize)]
pub struct HtmlToTextParams {
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExtractionMode {
    Raw,
    Formatted,
    Markdown,
}

impl ExtractionMode {
    fn text_mode(self) -> TextMode {
        match self {
            Self::Raw => TextMode::Raw,
            Self::Formatted => TextMode::Formatted,
            Self::Markdown => TextMode::Markdown,
        }
    }
}

/// Extracts readable text from HTML documents, keeping the chunk's metadata
/// and recording the article title when one is found.
pub struct HtmlToTextTransformer {
    mode: ExtractionMode,
}

impl HtmlToTextTransformer {
    pub fn new(params: HtmlToTextParams) -> Result<Self, AppError> {
        let mode = match params.mode.as_deref() {
            None | Some("markdown") => ExtractionMode::Markdown,
            Some("formatted") => ExtractionMode::Formatted,
            Some("raw") => ExtractionMode::Raw,
            Some(other) => {
                return Err(AppError::Validation(format!(
                    "invalid html2text mode '{other}', use 'raw', 'formatted' or 'markdown'"
                )))
            }
        };

        Ok(Self { mode })
    }
}

impl DocumentTransformer for HtmlToTextTransformer {
    fn transform(&self, chunk: Chunk) -> Result<Vec<Chunk>, AppError> {
        let config = dom_smoothie::Config {
            text_mode: self.mode.text_mode(),
            ..Default::default()
        };

        let source_url = chunk.metadata_str("source");
        let mut readability =
            Readability::new(chunk.page_content.clone(), source_url.as_deref(), Some(config))?;
        let article: Article = readability.parse()?;

        let mut transformed = Chunk::with_metadata(article.text_content.to_string(), chunk.metadata);
        if !article.title.is_empty() && !transformed.metadata.contains_key("title") {
            transformed.insert_metadata("title", article.title.clone());
        }

        Ok(vec![transformed])
    }
}
