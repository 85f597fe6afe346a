use std::path::{Component, Path, PathBuf};

use common::{document::Chunk, error::AppError};
use futures::StreamExt;
use tracing::info;

use crate::dataset::Dataset;

/// Writes every chunk of a dataset run to a JSON file named by the dataset's
/// addressing metadata field, returning the number of files written.
pub async fn write_files(dataset: &Dataset, project: &str) -> Result<usize, AppError> {
    let output = dataset.output.as_ref().ok_or_else(|| {
        AppError::Validation(format!(
            "no output folder configured for dataset '{}'",
            dataset.id
        ))
    })?;

    let mut written = 0usize;
    let mut chunks = dataset.stream(project);
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        write_chunk(
            &output.folder,
            &output.varname,
            dataset.has_splitter(),
            &chunk,
        )
        .await?;
        written += 1;
    }

    info!(dataset = %dataset.id, files = written, "wrote cache files");
    Ok(written)
}

async fn write_chunk(
    root: &Path,
    varname: &str,
    split_suffix: bool,
    chunk: &Chunk,
) -> Result<(), AppError> {
    let stem = chunk.metadata_str(varname).ok_or_else(|| {
        AppError::Processing(format!(
            "chunk is missing metadata field '{varname}' required for cache file naming"
        ))
    })?;

    let mut relative = stem;
    if split_suffix {
        relative.push_str(&format!("-{}", chunk.start_index()));
    }
    relative.push_str(".json");

    let path = resolve_inside(root, &relative)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let body = serde_json::to_vec(chunk)?;
    tokio::fs::write(&path, body).await?;
    Ok(())
}

/// Joins `relative` onto `root`, rejecting anything that would escape the
/// root folder (absolute paths, `..` traversal above the root).
fn resolve_inside(root: &Path, relative: &str) -> Result<PathBuf, AppError> {
    let mut depth = 0usize;
    let mut resolved = root.to_path_buf();

    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(AppError::Validation(format!(
                        "cache file path '{relative}' is not inside output folder {}",
                        root.display()
                    )));
                }
                resolved.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(AppError::Validation(format!(
                    "cache file path '{relative}' is not inside output folder {}",
                    root.display()
                )));
            }
        }
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        loaders::{ChunkStream, DocumentLoader},
        splitters::{CharacterSplitter, SplitterParams},
    };
    use async_stream::try_stream;
    use std::sync::Arc;

    struct StaticLoader {
        chunks: Vec<Chunk>,
    }

    impl DocumentLoader for StaticLoader {
        fn lazy_load(&self) -> ChunkStream {
            let chunks = self.chunks.clone();
            Box::pin(try_stream! {
                for chunk in chunks {
                    yield chunk;
                }
            })
        }
    }

    fn loader(chunks: Vec<Chunk>) -> Arc<StaticLoader> {
        Arc::new(StaticLoader { chunks })
    }

    fn source_chunk(content: &str, source: &str) -> Chunk {
        let mut chunk = Chunk::new(content);
        chunk.insert_metadata("source", source);
        chunk
    }

    #[tokio::test]
    async fn writes_one_json_file_per_chunk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dataset = Dataset::new(
            "docs",
            loader(vec![
                source_chunk("first", "a"),
                source_chunk("second", "b"),
            ]),
        )
        .with_output(dir.path(), "source");

        let written = write_files(&dataset, "kb").await.expect("write files");
        assert_eq!(written, 2);

        let raw = tokio::fs::read(dir.path().join("a.json"))
            .await
            .expect("read a.json");
        let chunk: Chunk = serde_json::from_slice(&raw).expect("parse cache file");
        assert_eq!(chunk.page_content, "first");
        assert_eq!(chunk.namespace(), Some("kb/docs"));
    }

    #[tokio::test]
    async fn split_fragments_get_offset_suffixes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dataset = Dataset::new(
            "docs",
            loader(vec![source_chunk("alpha beta gamma delta epsilon", "a")]),
        )
        .with_splitter(Arc::new(
            CharacterSplitter::new(SplitterParams {
                min_chars: 1,
                max_chars: 12,
            })
            .expect("splitter"),
        ))
        .with_output(dir.path(), "source");

        let written = write_files(&dataset, "kb").await.expect("write files");
        assert!(written > 1);

        // the first fragment starts at offset zero
        let first = dir.path().join("a-0.json");
        assert!(tokio::fs::try_exists(&first).await.expect("stat"));
    }

    #[tokio::test]
    async fn traversal_outside_output_folder_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dataset = Dataset::new(
            "docs",
            loader(vec![source_chunk("escape attempt", "../escape")]),
        )
        .with_output(dir.path().join("cache"), "source");

        let result = write_files(&dataset, "kb").await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        // nothing was written
        assert!(!tokio::fs::try_exists(dir.path().join("escape.json"))
            .await
            .expect("stat"));
    }

    #[tokio::test]
    async fn missing_addressing_field_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dataset = Dataset::new("docs", loader(vec![Chunk::new("no source metadata")]))
            .with_output(dir.path(), "source");

        let result = write_files(&dataset, "kb").await;
        assert!(matches!(result, Err(AppError::Processing(_))));
    }

    #[test]
    fn resolve_inside_allows_subfolders() {
        let root = Path::new("/tmp/cache");
        let path = resolve_inside(root, "sub/dir/file.json").expect("resolve");
        assert_eq!(path, PathBuf::from("/tmp/cache/sub/dir/file.json"));

        assert!(resolve_inside(root, "sub/../file.json").is_ok());
        assert!(resolve_inside(root, "../file.json").is_err());
        assert!(resolve_inside(root, "sub/../../file.json").is_err());
        assert!(resolve_inside(root, "/absolute.json").is_err());
    }
}
