use async_stream::try_stream;
use common::{document::Chunk, error::AppError};
use serde::Deserialize;

use super::{ChunkStream, DocumentLoader};

#[derive(Debug, Deserialize)]
pub struct UrlLoaderParams {
    pub url: String,
}

/// Fetches a single URL and emits its body as one document. HTML extraction
/// belongs to a downstream transformer, not the loader.
pub struct UrlLoader {
    url: String,
    client: reqwest::Client,
}

impl UrlLoader {
    pub fn new(params: UrlLoaderParams) -> Result<Self, AppError> {
        url::Url::parse(&params.url)
            .map_err(|err| AppError::Validation(format!("invalid loader url '{}': {err}", params.url)))?;

        Ok(Self {
            url: params.url,
            client: reqwest::Client::new(),
        })
    }
}

impl DocumentLoader for UrlLoader {
    fn lazy_load(&self) -> ChunkStream {
        let url = self.url.clone();
        let client = self.client.clone();

        Box::pin(try_stream! {
            let response = client.get(&url).send().await?.error_for_status()?;
            let body = response.text().await?;
            let mut chunk = Chunk::new(body);
            chunk.insert_metadata("source", url.clone());
            yield chunk;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_urls() {
        let result = UrlLoader::new(UrlLoaderParams {
            url: "not a url".into(),
        });
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
