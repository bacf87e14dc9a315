//! Materializes fetched artifacts on disk.
//!
//! Layout is `base_dir / destination_path... / target_filename`. Writes go to
//! a hidden temp file in the destination directory and are renamed into place
//! only after the stream completes, so the final path never holds a partial
//! file. An existing file at the final path is never overwritten.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};

use crate::artifact::ResolvedArtifact;
use crate::download::{ByteStream, DownloadError};

/// Result of a write attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Bytes were written to this path.
    Written(PathBuf),
    /// A file already existed at this path; nothing was written.
    Skipped(PathBuf),
}

impl WriteOutcome {
    /// Final path in either case.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Written(path) | Self::Skipped(path) => path,
        }
    }
}

/// Writes artifacts below a fixed output root.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    base_dir: PathBuf,
}

impl ArtifactWriter {
    /// Creates a writer rooted at `base_dir`.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Output root.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Full target path for `resolved`.
    #[must_use]
    pub fn target_path(&self, resolved: &ResolvedArtifact) -> PathBuf {
        let mut path = self.base_dir.clone();
        path.extend(&resolved.task.destination_path);
        path.push(&resolved.target_filename);
        path
    }

    /// Returns the target path if a file is already there.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Io`] when existence cannot be determined.
    pub async fn existing(
        &self,
        resolved: &ResolvedArtifact,
    ) -> Result<Option<PathBuf>, DownloadError> {
        let path = self.target_path(resolved);
        match tokio::fs::try_exists(&path).await {
            Ok(true) => Ok(Some(path)),
            Ok(false) => Ok(None),
            Err(e) => Err(DownloadError::io(path, e)),
        }
    }

    /// Streams `body` to the target path of `resolved`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] if the directories or file cannot be
    /// written, or the stream yields an error. No file is left at the target
    /// path in either case.
    #[instrument(skip(self, resolved, body), fields(path = %self.target_path(resolved).display()))]
    pub async fn write(
        &self,
        resolved: &ResolvedArtifact,
        body: ByteStream,
    ) -> Result<WriteOutcome, DownloadError> {
        if let Some(path) = self.existing(resolved).await? {
            debug!("target exists, skipping write");
            return Ok(WriteOutcome::Skipped(path));
        }

        let target = self.target_path(resolved);
        let dir = target
            .parent()
            .map_or_else(|| self.base_dir.clone(), Path::to_path_buf);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| DownloadError::io(dir.clone(), e))?;

        let temp = TempFileGuard::new(dir.join(temp_file_name(&resolved.target_filename)));
        let bytes = stream_to_file(temp.path(), body).await?;

        // A concurrent writer may have landed the same file meanwhile.
        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            debug!("target appeared during write, discarding temp file");
            return Ok(WriteOutcome::Skipped(target));
        }

        tokio::fs::rename(temp.path(), &target)
            .await
            .map_err(|e| DownloadError::io(target.clone(), e))?;
        temp.disarm();

        info!(path = %target.display(), bytes, "artifact written");
        Ok(WriteOutcome::Written(target))
    }
}

/// Streams body to file, returning bytes written.
async fn stream_to_file(path: &Path, mut body: ByteStream) -> Result<u64, DownloadError> {
    let file = File::create(path)
        .await
        .map_err(|e| DownloadError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer.flush().await.map_err(|e| DownloadError::io(path, e))?;
    writer
        .get_ref()
        .sync_all()
        .await
        .map_err(|e| DownloadError::io(path, e))?;
    Ok(bytes_written)
}

fn temp_file_name(target_filename: &str) -> String {
    format!(".{target_filename}.{:08x}.part", rand::random::<u32>())
}

/// Removes the temp file unless disarmed after a successful rename.
///
/// Runs on error returns and when the owning future is dropped mid-write.
struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            debug!(path = %self.path.display(), "removing temp file");
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
