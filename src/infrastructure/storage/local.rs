use crate::common::upload::stream_to_file;
use anyhow::{Context, Result};
use bytes::Bytes;
use futures_util::Stream;
use std::fmt::Display;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// Every artifact of one analysis, addressed purely by its content id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentPaths {
    pub content_id: Uuid,
    pub source: PathBuf,
    pub normalized: PathBuf,
    pub overlay: PathBuf,
    pub final_video: PathBuf,
    pub summary: PathBuf,
}

impl ContentPaths {
    pub fn final_video_name(content_id: Uuid) -> String {
        format!("{}_overlay_fixed.mp4", content_id)
    }
}

/// Upload and result roots on a filesystem shared by the API and the workers.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    upload_dir: PathBuf,
    result_dir: PathBuf,
}

impl LocalStorage {
    pub fn new(upload_dir: impl Into<PathBuf>, result_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            result_dir: result_dir.into(),
        }
    }

    pub async fn ensure_dirs(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.upload_dir.display()))?;
        tokio::fs::create_dir_all(&self.result_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.result_dir.display()))?;

        info!("UPLOAD_DIR={}", self.upload_dir.display());
        info!("RESULT_DIR={}", self.result_dir.display());
        Ok(())
    }

    pub fn result_dir(&self) -> &Path {
        &self.result_dir
    }

    pub fn paths(&self, content_id: Uuid) -> ContentPaths {
        ContentPaths {
            content_id,
            source: self.upload_dir.join(format!("{}.mp4", content_id)),
            normalized: self.upload_dir.join(format!("{}_upscaled.mp4", content_id)),
            overlay: self.result_dir.join(format!("{}_overlay.mp4", content_id)),
            final_video: self.result_dir.join(ContentPaths::final_video_name(content_id)),
            summary: self.result_dir.join(format!("{}.json", content_id)),
        }
    }

    /// Mints a fresh content id and streams the blob to its source path.
    pub async fn persist_upload<S, E>(&self, stream: S) -> Result<(Uuid, u64)>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Display,
    {
        let content_id = Uuid::new_v4();
        let paths = self.paths(content_id);
        let written = stream_to_file(stream, &paths.source).await?;
        info!("File saved to: {} ({} bytes)", paths.source.display(), written);
        Ok((content_id, written))
    }

    pub async fn remove_source(&self, content_id: Uuid) {
        let _ = tokio::fs::remove_file(self.paths(content_id).source).await;
    }
}

/// Writes to a sibling temp file and renames it over `path`, so readers only
/// ever observe a complete file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let result = (|| {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
        std::fs::rename(&tmp, path)
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}
