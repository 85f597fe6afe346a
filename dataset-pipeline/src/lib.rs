#![allow(clippy::result_large_err)]

pub mod cache_writer;
pub mod dataset;
pub mod loaders;
pub mod registry;
pub mod splitters;
pub mod template;
pub mod transformers;

pub use dataset::{CacheOutput, Dataset, IndexMode};
pub use loaders::{ChunkStream, DocumentLoader};
pub use registry::{build_dataset, build_datasets};
pub use splitters::DocumentSplitter;
pub use transformers::DocumentTransformer;
