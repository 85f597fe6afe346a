pub mod html_to_text;

use std::sync::Arc;

use common::{document::Chunk, error::AppError};

/// Maps one document to zero or more documents, preserving relative order.
/// Transformers run before splitting so they always see whole documents.
pub trait DocumentTransformer: Send + Sync {
    fn transform(&self, chunk: Chunk) -> Result<Vec<Chunk>, AppError>;
}

/// Applies a sequence of transformers, feeding each output of one stage into
/// the next.
pub struct ChainedTransformer {
    stages: Vec<Arc<dyn DocumentTransformer>>,
}

impl ChainedTransformer {
    pub fn new(stages: Vec<Arc<dyn DocumentTransformer>>) -> Self {
        Self { stages }
    }
}

impl DocumentTransformer for ChainedTransformer {
    fn transform(&self, chunk: Chunk) -> Result<Vec<Chunk>, AppError> {
        let mut current = vec![chunk];
        for stage in &self.stages {
            let mut next = Vec::with_capacity(current.len());
            for chunk in current {
                next.extend(stage.transform(chunk)?);
            }
            current = next;
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Suffixer(&'static str);

    impl DocumentTransformer for Suffixer {
        fn transform(&self, mut chunk: Chunk) -> Result<Vec<Chunk>, AppError> {
            chunk.page_content.push_str(self.0);
            Ok(vec![chunk])
        }
    }

    struct Duplicator;

    impl DocumentTransformer for Duplicator {
        fn transform(&self, chunk: Chunk) -> Result<Vec<Chunk>, AppError> {
            Ok(vec![chunk.clone(), chunk])
        }
    }

    #[test]
    fn chain_applies_stages_in_order() {
        let chain = ChainedTransformer::new(vec![
            Arc::new(Duplicator),
            Arc::new(Suffixer("!")),
        ]);

        let out = chain.transform(Chunk::new("doc")).expect("transform");
        let contents: Vec<_> = out.iter().map(|chunk| chunk.page_content.as_str()).collect();
        assert_eq!(contents, vec!["doc!", "doc!"]);
    }
}
