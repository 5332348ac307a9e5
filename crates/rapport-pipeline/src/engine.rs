//! [`Engine`] owns the backends and the shared plumbing every pipeline
//! operation uses: ownership checks, compare-and-swap artifact writes, and
//! fire-and-forget stage scheduling.
//!
//! The operations themselves live next door: stage runs in `stages`,
//! reconciliation in `review`, the deletion guard in `deletion`.

use std::{sync::Arc, time::Duration};

use rapport_core::{
  artifact::{Artifact, NewArtifact},
  contact::Contact,
  store::ContactStore,
  suggestion::SuggestionBatch,
};
use uuid::Uuid;

use crate::{
  Error, Result,
  blob::BlobStore,
  worker::{SuggestionGenerator, Transcriber},
};

/// The set of backend types an [`Engine`] runs on.
///
/// Implemented by a marker type per deployment, e.g. SQLite plus HTTP
/// workers in the server, and SQLite plus scripted workers in tests.
pub trait Backends: Send + Sync + 'static {
  type Store: ContactStore + 'static;
  type Transcriber: Transcriber + 'static;
  type Generator: SuggestionGenerator + 'static;
  type Blobs: BlobStore + 'static;
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
  pub transcription_timeout: Duration,
  pub generation_timeout:    Duration,
  /// How many times a compare-and-swap write is re-read and re-applied
  /// before the operation gives up.
  pub write_attempts:        usize,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      transcription_timeout: Duration::from_secs(300),
      generation_timeout:    Duration::from_secs(120),
      write_attempts:        5,
    }
  }
}

pub struct Engine<B: Backends> {
  pub(crate) store:       B::Store,
  pub(crate) transcriber: B::Transcriber,
  pub(crate) generator:   B::Generator,
  pub(crate) blobs:       B::Blobs,
  pub(crate) config:      EngineConfig,
}

impl<B: Backends> Engine<B> {
  pub fn new(
    store: B::Store,
    transcriber: B::Transcriber,
    generator: B::Generator,
    blobs: B::Blobs,
    config: EngineConfig,
  ) -> Self {
    Self { store, transcriber, generator, blobs, config }
  }

  pub fn store(&self) -> &B::Store { &self.store }

  pub fn config(&self) -> &EngineConfig { &self.config }

  // ── Ownership-checked reads ───────────────────────────────────────────

  pub async fn artifact_for(&self, user_id: Uuid, id: Uuid) -> Result<Artifact> {
    let artifact = self
      .store
      .get_artifact(id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::NotFound { kind: "artifact", id })?;
    owned_by(user_id, artifact.user_id, "artifact", id)?;
    Ok(artifact)
  }

  pub async fn contact_for(&self, user_id: Uuid, id: Uuid) -> Result<Contact> {
    let contact = self
      .store
      .get_contact(id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::NotFound { kind: "contact", id })?;
    owned_by(user_id, contact.user_id, "contact", id)?;
    Ok(contact)
  }

  pub async fn batch_for(&self, user_id: Uuid, id: Uuid) -> Result<SuggestionBatch> {
    let batch = self
      .store
      .get_batch(id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::NotFound { kind: "suggestion batch", id })?;
    owned_by(user_id, batch.user_id, "suggestion batch", id)?;
    Ok(batch)
  }

  // ── Ingestion ─────────────────────────────────────────────────────────

  /// Persist a new artifact and start its pipeline in the background.
  pub async fn ingest(self: &Arc<Self>, input: NewArtifact) -> Result<Artifact> {
    if let Some(contact_id) = input.contact_id {
      self.contact_for(input.user_id, contact_id).await?;
    }

    let artifact = self.store.add_artifact(input).await.map_err(Error::store)?;
    tracing::info!(
      artifact_id = %artifact.artifact_id,
      kind = %artifact.kind,
      "artifact ingested",
    );

    self.artifact_created(artifact.artifact_id);
    Ok(artifact)
  }

  /// Signal that `artifact_id` exists and may have a stage armed. Returns
  /// immediately; the stages run on spawned tasks.
  pub fn artifact_created(self: &Arc<Self>, artifact_id: Uuid) { self.spawn_advance(artifact_id); }

  /// Run the next armed stage on its own task. A stage that leaves another
  /// stage armed (extraction arming AI) schedules it the same way.
  pub(crate) fn spawn_advance(self: &Arc<Self>, artifact_id: Uuid) {
    let engine = Arc::clone(self);
    tokio::spawn(async move {
      match engine.advance(artifact_id).await {
        Ok(Some(artifact)) if artifact.next_stage().is_some() => {
          engine.spawn_advance(artifact_id);
        }
        Ok(_) => {}
        Err(e) => tracing::error!(%artifact_id, error = %e, "pipeline step failed"),
      }
    });
  }

  // ── Compare-and-swap writes ───────────────────────────────────────────

  /// Read the artifact, apply `transition`, and write it back if nobody else
  /// wrote in between; on a lost race, start over from a fresh read.
  ///
  /// Returns `None` if the artifact does not exist. An error from
  /// `transition` aborts without writing.
  pub(crate) async fn update_artifact<T, F>(
    &self,
    artifact_id: Uuid,
    mut transition: F,
  ) -> Result<Option<(Artifact, T)>>
  where
    F: FnMut(&mut Artifact) -> rapport_core::Result<T> + Send,
    T: Send,
  {
    for attempt in 1..=self.config.write_attempts {
      let Some(mut artifact) = self
        .store
        .get_artifact(artifact_id)
        .await
        .map_err(Error::store)?
      else {
        return Ok(None);
      };

      let out = transition(&mut artifact)?;
      if let Some(saved) = self.store.save_artifact(&artifact).await.map_err(Error::store)? {
        return Ok(Some((saved, out)));
      }
      tracing::debug!(%artifact_id, attempt, "artifact changed concurrently; retrying");
    }

    Err(Error::Contended { kind: "artifact", id: artifact_id })
  }
}

fn owned_by(user_id: Uuid, owner: Uuid, kind: &'static str, id: Uuid) -> Result<()> {
  if user_id == owner {
    Ok(())
  } else {
    Err(Error::Forbidden { kind, id })
  }
}
