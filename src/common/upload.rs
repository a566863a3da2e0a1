use anyhow::{Result, anyhow};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::error;

/// Content types accepted for an uploaded clip. Browsers sometimes send no type
/// or a generic binary one for `.mp4` files, so both are let through.
pub fn is_accepted_content_type(content_type: Option<&str>) -> bool {
    let Some(raw) = content_type else {
        return true;
    };
    match raw.parse::<mime::Mime>() {
        Ok(m) => m.type_() == mime::VIDEO || m.essence_str() == mime::APPLICATION_OCTET_STREAM.essence_str(),
        Err(_) => false,
    }
}

/// Streams into `<dest>.part` and renames into place on completion.
pub struct FileUploader {
    dest: PathBuf,
    part: PathBuf,
    file: File,
    written: u64,
}

impl FileUploader {
    pub async fn new(dest: &Path) -> Result<Self> {
        let mut part = dest.as_os_str().to_owned();
        part.push(".part");
        let part = PathBuf::from(part);

        let file = File::create(&part)
            .await
            .map_err(|e| anyhow!("Failed to create {}: {}", part.display(), e))?;

        Ok(Self {
            dest: dest.to_path_buf(),
            part,
            file,
            written: 0,
        })
    }

    pub async fn write_chunk(&mut self, chunk: Bytes) -> Result<()> {
        self.file
            .write_all(&chunk)
            .await
            .map_err(|e| anyhow!("Failed to write chunk: {}", e))?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    pub async fn finish(mut self) -> Result<u64> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        drop(self.file);

        tokio::fs::rename(&self.part, &self.dest)
            .await
            .map_err(|e| anyhow!("Failed to move upload into place: {}", e))?;
        Ok(self.written)
    }

    pub async fn abort(self) {
        drop(self.file);
        let _ = tokio::fs::remove_file(&self.part).await;
    }
}

pub async fn stream_to_file<S, E>(mut stream: S, dest: &Path) -> Result<u64>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    let mut uploader = FileUploader::new(dest).await?;

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                error!("Stream error: {}", e);
                uploader.abort().await;
                return Err(anyhow!("Upload stream interrupted: {}", e));
            }
        };

        if let Err(e) = uploader.write_chunk(chunk).await {
            error!("Upload error: {}", e);
            uploader.abort().await;
            return Err(e);
        }
    }

    if uploader.written == 0 {
        uploader.abort().await;
        return Err(anyhow!("Uploaded file is empty"));
    }

    uploader.finish().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[test]
    fn video_and_binary_types_are_accepted() {
        assert!(is_accepted_content_type(None));
        assert!(is_accepted_content_type(Some("video/mp4")));
        assert!(is_accepted_content_type(Some("video/quicktime")));
        assert!(is_accepted_content_type(Some("application/octet-stream")));
        assert!(!is_accepted_content_type(Some("image/png")));
        assert!(!is_accepted_content_type(Some("not a mime")));
    }

    #[tokio::test]
    async fn interrupted_stream_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("clip.mp4");
        let chunks = stream::iter(vec![
            Ok(Bytes::from_static(b"abc")),
            Err("connection reset"),
        ]);

        let err = stream_to_file(chunks, &dest).await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
        assert!(!dest.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("clip.mp4");
        let chunks = stream::iter(Vec::<Result<Bytes, std::io::Error>>::new());

        assert!(stream_to_file(chunks, &dest).await.is_err());
        assert!(!dest.exists());
    }
}
