//! The deletion guard.

use rapport_core::{
  artifact::Artifact,
  store::{ContactStore, DeleteOutcome},
};
use uuid::Uuid;

use crate::{Backends, Engine, Error, Result, blob::BlobStore};

impl<B: Backends> Engine<B> {
  /// Delete an artifact owned by `user_id`, unless a contact field is still
  /// credited to it or one of its batches has been applied.
  ///
  /// Returns the deleted artifact. Its blob, if any, is released
  /// afterwards; a failure there is logged and does not undo the deletion.
  pub async fn delete_artifact(&self, user_id: Uuid, artifact_id: Uuid) -> Result<Artifact> {
    self.artifact_for(user_id, artifact_id).await?;

    let artifact = match self
      .store
      .delete_artifact_if_unreferenced(artifact_id)
      .await
      .map_err(Error::store)?
    {
      DeleteOutcome::Deleted(artifact) => artifact,
      DeleteOutcome::NotFound => {
        return Err(Error::NotFound { kind: "artifact", id: artifact_id });
      }
      DeleteOutcome::Referenced(references) => {
        tracing::info!(
          %artifact_id,
          source_fields = references.source_fields.len(),
          applied_batches = references.applied_batches.len(),
          "artifact deletion refused",
        );
        return Err(Error::ArtifactIsSource { artifact_id, references });
      }
    };
    tracing::info!(%artifact_id, "artifact deleted");

    if let Some(blob_ref) = &artifact.audio_ref {
      if let Err(e) = self.blobs.delete(blob_ref).await {
        tracing::warn!(%artifact_id, blob_ref = %blob_ref, error = %e, "failed to delete artifact blob");
      }
    }

    Ok(artifact)
  }
}
