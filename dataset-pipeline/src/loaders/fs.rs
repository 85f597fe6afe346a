use std::path::{Path, PathBuf};

use async_stream::try_stream;
use common::{document::Chunk, error::AppError};
use serde::Deserialize;

use super::{ChunkStream, DocumentLoader};

#[derive(Debug, Deserialize)]
pub struct FsLoaderParams {
    pub path: String,
    #[serde(default)]
    pub suffixes: Option<Vec<String>>,
    #[serde(default)]
    pub glob: Option<String>,
}

/// Loads one document per file under a root directory, depth-first, in
/// lexicographic path order. The `source` metadata field carries the path
/// relative to the root.
pub struct FsLoader {
    root: PathBuf,
    suffixes: Option<Vec<String>>,
    glob: Option<String>,
}

impl FsLoader {
    pub fn new(params: FsLoaderParams) -> Self {
        Self {
            root: PathBuf::from(params.path),
            suffixes: params.suffixes,
            glob: params.glob,
        }
    }

    fn matches(&self, path: &Path) -> bool {
        let file_name = match path.file_name().and_then(|name| name.to_str()) {
            Some(name) => name,
            None => return false,
        };

        if let Some(suffixes) = &self.suffixes {
            if !suffixes.iter().any(|suffix| file_name.ends_with(suffix)) {
                return false;
            }
        }

        if let Some(pattern) = &self.glob {
            if !wildcard_match(pattern, file_name) {
                return false;
            }
        }

        true
    }
}

impl DocumentLoader for FsLoader {
    fn lazy_load(&self) -> ChunkStream {
        let root = self.root.clone();
        let suffixes = self.suffixes.clone();
        let glob = self.glob.clone();

        Box::pin(try_stream! {
            let filter = FsLoader { root: root.clone(), suffixes, glob };
            let files = collect_files(&root).await?;
            for path in files {
                if !filter.matches(&path) {
                    continue;
                }
                let page_content = tokio::fs::read_to_string(&path).await?;
                let source = path
                    .strip_prefix(&root)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .into_owned();
                let mut chunk = Chunk::new(page_content);
                chunk.insert_metadata("source", source);
                yield chunk;
            }
        })
    }
}

/// Collects every regular file below `root`, sorted by full path so repeated
/// runs see an identical order.
pub(crate) async fn collect_files(root: &Path) -> Result<Vec<PathBuf>, AppError> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut read_dir = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                pending.push(path);
            } else {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// `*`-only wildcard match against a file name.
fn wildcard_match(pattern: &str, candidate: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == candidate;
    }

    let segments: Vec<&str> = pattern.split('*').collect();
    let last = segments.len().saturating_sub(1);
    let mut remainder = candidate;

    for (position, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        if position == 0 {
            remainder = match remainder.strip_prefix(segment) {
                Some(rest) => rest,
                None => return false,
            };
        } else if position == last {
            return remainder.ends_with(segment);
        } else {
            match remainder.find(segment) {
                Some(index) => {
                    remainder = remainder.get(index + segment.len()..).unwrap_or("");
                }
                None => return false,
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[test]
    fn wildcard_patterns() {
        assert!(wildcard_match("*.md", "notes.md"));
        assert!(!wildcard_match("*.md", "notes.txt"));
        assert!(wildcard_match("report-*.json", "report-2024.json"));
        assert!(wildcard_match("a*b*c", "a-x-b-y-c"));
        assert!(!wildcard_match("a*b*c", "a-x-c"));
        assert!(wildcard_match("exact.txt", "exact.txt"));
    }

    #[tokio::test]
    async fn walks_files_in_stable_order_with_relative_sources() {
        let dir = tempfile::tempdir().expect("tempdir");
        tokio::fs::create_dir(dir.path().join("sub"))
            .await
            .expect("mkdir");
        tokio::fs::write(dir.path().join("b.md"), "beta")
            .await
            .expect("write b");
        tokio::fs::write(dir.path().join("a.md"), "alpha")
            .await
            .expect("write a");
        tokio::fs::write(dir.path().join("sub/c.md"), "gamma")
            .await
            .expect("write c");
        tokio::fs::write(dir.path().join("skip.txt"), "skipped")
            .await
            .expect("write skip");

        let loader = FsLoader::new(FsLoaderParams {
            path: dir.path().to_string_lossy().into_owned(),
            suffixes: Some(vec![".md".into()]),
            glob: None,
        });

        let chunks: Vec<Chunk> = loader.lazy_load().try_collect().await.expect("load");
        let sources: Vec<_> = chunks
            .iter()
            .filter_map(|chunk| chunk.metadata_str("source"))
            .collect();

        assert_eq!(sources, vec!["a.md", "b.md", "sub/c.md"]);
        assert_eq!(
            chunks.first().map(|chunk| chunk.page_content.as_str()),
            Some("alpha")
        );
    }

    #[tokio::test]
    async fn restartable_stream_yields_same_documents() {
        let dir = tempfile::tempdir().expect("tempdir");
        tokio::fs::write(dir.path().join("only.md"), "content")
            .await
            .expect("write");

        let loader = FsLoader::new(FsLoaderParams {
            path: dir.path().to_string_lossy().into_owned(),
            suffixes: None,
            glob: None,
        });

        let first: Vec<Chunk> = loader.lazy_load().try_collect().await.expect("first run");
        let second: Vec<Chunk> = loader.lazy_load().try_collect().await.expect("second run");
        assert_eq!(first, second);
    }
}
