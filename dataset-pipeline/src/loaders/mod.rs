pub mod cache;
pub mod fs;
pub mod list;
pub mod url;

use common::{document::Chunk, error::AppError};
use futures::stream::BoxStream;

/// A lazily-evaluated, finite sequence of chunks. Nothing is pulled from the
/// underlying source until the stream is polled.
pub type ChunkStream = BoxStream<'static, Result<Chunk, AppError>>;

/// Produces raw documents from an external source.
///
/// `lazy_load` returns a fresh stream on every call, so the same loader can
/// back repeated dataset runs.
pub trait DocumentLoader: Send + Sync {
    fn lazy_load(&self) -> ChunkStream;
}
