//! Storage for artifact payloads too large for the database (audio, files).
//!
//! Artifacts only carry an opaque `audio_ref`. The pipeline hands it to the
//! transcriber as-is and asks the blob store to release it once the artifact
//! is deleted.

use std::{
  future::Future,
  io,
  path::{Component, Path, PathBuf},
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobError {
  #[error("invalid blob reference: {0:?}")]
  InvalidRef(String),

  #[error("blob i/o error: {0}")]
  Io(#[from] io::Error),
}

pub trait BlobStore: Send + Sync {
  /// Delete the blob behind `blob_ref`. Deleting a blob that does not exist
  /// succeeds.
  fn delete<'a>(
    &'a self,
    blob_ref: &'a str,
  ) -> impl Future<Output = Result<(), BlobError>> + Send + 'a;
}

// ─── Filesystem ──────────────────────────────────────────────────────────────

/// Blobs as files under a root directory; a reference is a relative path.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
  root: PathBuf,
}

impl FsBlobStore {
  pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

  /// Resolve a reference to a path under the root, refusing anything that
  /// could escape it.
  pub fn resolve(&self, blob_ref: &str) -> Result<PathBuf, BlobError> {
    let rel = Path::new(blob_ref);
    let confined = !blob_ref.is_empty()
      && rel.components().all(|c| matches!(c, Component::Normal(_)));
    if !confined {
      return Err(BlobError::InvalidRef(blob_ref.to_owned()));
    }
    Ok(self.root.join(rel))
  }
}

impl BlobStore for FsBlobStore {
  async fn delete<'a>(&'a self, blob_ref: &'a str) -> Result<(), BlobError> {
    let path = self.resolve(blob_ref)?;
    match tokio::fs::remove_file(&path).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        tracing::debug!(blob_ref, "blob already absent");
        Ok(())
      }
      Err(e) => Err(e.into()),
    }
  }
}
