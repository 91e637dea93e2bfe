//! Chapter persistence collaborator.

use crate::error::ApiError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Stores accepted chapter content
#[async_trait]
pub trait ChapterStore: Send + Sync {
    /// Persist one accepted chapter, returning where it landed.
    async fn save_chapter(&self, number: u32, content: &str) -> Result<PathBuf, ApiError>;
}

/// Writes `chapter_{NN}.md` files into an output directory.
pub struct FileChapterStore {
    root: PathBuf,
}

impl FileChapterStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn chapter_path(&self, number: u32) -> PathBuf {
        self.root.join(format!("chapter_{:02}.md", number))
    }
}

#[async_trait]
impl ChapterStore for FileChapterStore {
    async fn save_chapter(&self, number: u32, content: &str) -> Result<PathBuf, ApiError> {
        let path = self.chapter_path(number);
        let failed = |e: std::io::Error| ApiError::PersistenceFailed {
            chapter: number,
            message: format!("{}: {}", path.display(), e),
        };
        tokio::fs::create_dir_all(&self.root).await.map_err(failed)?;

        // Write to a sibling temp file, then rename over the target.
        let tmp = path.with_extension("md.tmp");
        tokio::fs::write(&tmp, content.as_bytes()).await.map_err(failed)?;
        tokio::fs::rename(&tmp, &path).await.map_err(failed)?;

        debug!(chapter = number, path = %path.display(), bytes = content.len(), "chapter saved");
        Ok(path)
    }
}
