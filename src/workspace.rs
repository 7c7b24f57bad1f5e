//! Per-request temporary workspace.
//!
//! Each conversion gets its own uniquely named directory, so concurrent
//! requests never see each other's files. The directory is a [`TempDir`] and
//! is removed when the [`Workspace`] is dropped, which covers every early
//! return and a cancelled request as well as the happy path.

use crate::error::SapebookError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// File name the converter is told to write.
pub const PDF_OUT_NAME: &str = "ebook.pdf";

/// An exclusively owned scratch directory for one request.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh workspace under `root` (or the OS temp dir).
    pub fn create(root: Option<&Path>, prefix: &str) -> Result<Self, SapebookError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix);
        let dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|source| SapebookError::WorkspaceCreateFailed { source })?;

        debug!("Created workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the converter writes the finished PDF.
    pub fn pdf_out(&self) -> PathBuf {
        self.path().join(PDF_OUT_NAME)
    }

    /// Write the uploaded file into the workspace under its own base name.
    pub async fn save_upload(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, SapebookError> {
        let name = upload_file_name(file_name)?;
        let path = self.path().join(name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| SapebookError::UploadWriteFailed {
                path: path.clone(),
                source,
            })?;
        debug!("Saved {} bytes to {}", bytes.len(), path.display());
        Ok(path)
    }

    /// Remove the workspace on the blocking pool instead of on drop.
    ///
    /// Dropping a `Workspace` still removes it, but inline on the calling
    /// thread; request handlers close explicitly so the async workers never
    /// block on `remove_dir_all`. Failures are logged, not returned: by the
    /// time a request closes its workspace the response is already decided.
    pub async fn close(self) {
        let path = self.path().to_path_buf();
        let dir = self.dir;
        match tokio::task::spawn_blocking(move || dir.close()).await {
            Ok(Ok(())) => debug!("Removed workspace {}", path.display()),
            Ok(Err(e)) => warn!("Failed to remove workspace {}: {}", path.display(), e),
            Err(e) => warn!("Cleanup task for {} failed: {}", path.display(), e),
        }
    }
}

/// Reduce a client-supplied file name to a safe single path component.
///
/// Browsers on some platforms send the full client path, so both `/` and `\`
/// count as separators and only the last segment is kept; the segment itself
/// is left untouched. The converter's output path is reserved.
pub fn upload_file_name(raw: &str) -> Result<&str, SapebookError> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    match name {
        "" | "." | ".." => Err(SapebookError::invalid_input(format!(
            "unusable upload file name {raw:?}"
        ))),
        name if name.trim().is_empty() => Err(SapebookError::invalid_input(
            "upload file name is blank",
        )),
        PDF_OUT_NAME => Err(SapebookError::invalid_input(format!(
            "upload file name {PDF_OUT_NAME:?} is reserved for the converter output"
        ))),
        name if name.contains('\0') => Err(SapebookError::invalid_input(
            "upload file name contains a NUL byte",
        )),
        name => Ok(name),
    }
}
