//! Stage runs: drive one artifact through extraction and AI.
//!
//! Every run follows the same shape. Claim the stage (`pending →
//! processing`, which issues a run id), call the worker outside any store
//! transaction, then write the outcome back guarded by that run id. If the
//! stage was reset in the meantime the outcome is discarded.

use std::sync::Arc;

use chrono::Utc;
use rapport_core::{
  Error as CoreError,
  artifact::{Artifact, Stage, StageStatus},
  lifecycle::Transcription,
  store::ContactStore,
  suggestion::{NewSuggestionBatch, Suggestion, normalize},
};
use uuid::Uuid;

use crate::{
  Backends, Engine, Error, Result,
  worker::{
    GenerationRequest, SuggestionGenerator, Transcriber, TranscriptionRequest, WorkerError,
    with_timeout,
  },
};

/// Suggestions ready to be committed with the AI stage.
struct Generated {
  contact_id:  Uuid,
  suggestions: Vec<Suggestion>,
}

impl<B: Backends> Engine<B> {
  /// Run the artifact's next armed stage, if any, to completion or failure.
  ///
  /// Returns the artifact as left by the run, or `None` if there was nothing
  /// to run (no such artifact, no stage armed, another task claimed it
  /// first) or the run's outcome was discarded because the stage was reset
  /// or the artifact deleted meanwhile.
  pub async fn advance(&self, artifact_id: Uuid) -> Result<Option<Artifact>> {
    let Some(current) = self
      .store
      .get_artifact(artifact_id)
      .await
      .map_err(Error::store)?
    else {
      return Ok(None);
    };
    let Some(stage) = current.next_stage() else {
      return Ok(None);
    };

    let claimed = self
      .update_artifact(artifact_id, |a| a.begin(stage, Utc::now()))
      .await;
    let (artifact, run_id) = match claimed {
      Ok(Some(claimed)) => claimed,
      Ok(None)
      | Err(Error::Domain(
        CoreError::InvalidTransition { .. } | CoreError::ExtractionIncomplete(_),
      )) => return Ok(None),
      Err(e) => return Err(e),
    };
    tracing::info!(%artifact_id, %stage, %run_id, "stage started");

    match stage {
      Stage::Extraction => self.run_extraction(artifact, run_id).await,
      Stage::Ai => self.run_ai(artifact, run_id).await,
    }
  }

  /// Run every armed stage inline and return the artifact once nothing is
  /// left to run.
  pub async fn process(&self, artifact_id: Uuid) -> Result<Artifact> {
    loop {
      match self.advance(artifact_id).await? {
        Some(artifact) if artifact.next_stage().is_none() => return Ok(artifact),
        Some(_) => continue,
        None => {
          return self
            .store
            .get_artifact(artifact_id)
            .await
            .map_err(Error::store)?
            .ok_or(Error::NotFound { kind: "artifact", id: artifact_id });
        }
      }
    }
  }

  /// Re-arm a stage of an artifact owned by `user_id` without running it.
  ///
  /// Prior suggestion batches are kept. Resetting a stage that is already
  /// pending changes nothing.
  pub async fn reset(
    &self,
    user_id: Uuid,
    artifact_id: Uuid,
    stage: Option<Stage>,
  ) -> Result<Artifact> {
    self.artifact_for(user_id, artifact_id).await?;

    let (artifact, changed) = self
      .update_artifact(artifact_id, |a| a.reset(stage, Utc::now()))
      .await?
      .ok_or(Error::NotFound { kind: "artifact", id: artifact_id })?;

    tracing::info!(
      %artifact_id,
      stage = ?stage,
      changed,
      "artifact reset for reprocessing",
    );
    Ok(artifact)
  }

  /// [`Engine::reset`], then run whatever is armed in the background.
  pub async fn reprocess(
    self: &Arc<Self>,
    user_id: Uuid,
    artifact_id: Uuid,
    stage: Option<Stage>,
  ) -> Result<Artifact> {
    let artifact = self.reset(user_id, artifact_id, stage).await?;
    if artifact.next_stage().is_some() {
      self.spawn_advance(artifact_id);
    }
    Ok(artifact)
  }

  // ── Extraction ────────────────────────────────────────────────────────

  pub(crate) async fn run_extraction(
    &self,
    artifact: Artifact,
    run_id: Uuid,
  ) -> Result<Option<Artifact>> {
    let outcome = match &artifact.audio_ref {
      None => Err("artifact has no audio to transcribe".to_owned()),
      Some(blob_ref) => {
        let request = TranscriptionRequest {
          artifact_id: artifact.artifact_id,
          blob_ref:    blob_ref.clone(),
        };
        with_timeout(
          self.config.transcription_timeout,
          self.transcriber.transcribe(request),
        )
        .await
        .and_then(|resp| {
          if resp.text.trim().is_empty() {
            Err(WorkerError::Malformed("empty transcript".into()))
          } else {
            Ok(Transcription::from(resp))
          }
        })
        .map_err(|e| format!("transcription failed: {e}"))
      }
    };

    match outcome {
      Ok(transcription) => {
        let result = self
          .update_artifact(artifact.artifact_id, |a| {
            a.complete_extraction(run_id, transcription.clone(), Utc::now())
          })
          .await;
        settle(artifact.artifact_id, Stage::Extraction, run_id, result)
      }
      Err(reason) => self.fail_stage(artifact, Stage::Extraction, run_id, reason).await,
    }
  }

  // ── AI ────────────────────────────────────────────────────────────────

  async fn run_ai(&self, artifact: Artifact, run_id: Uuid) -> Result<Option<Artifact>> {
    match self.generate(&artifact).await {
      Ok(generated) => self.commit_suggestions(artifact, run_id, generated).await,
      Err(reason) => self.fail_stage(artifact, Stage::Ai, run_id, reason).await,
    }
  }

  /// Gather the inputs, call the generator, and validate its output. Any
  /// problem is returned as a failure reason for the stage.
  async fn generate(&self, artifact: &Artifact) -> Result<Generated, String> {
    let artifact_id = artifact.artifact_id;
    let contact_id = artifact
      .contact_id
      .ok_or("artifact is not linked to a contact")?;
    let text = artifact
      .source_text()
      .ok_or("artifact has no text to analyse")?
      .to_owned();
    let contact = self
      .store
      .get_contact(contact_id)
      .await
      .map_err(|e| format!("could not load contact: {e}"))?
      .ok_or_else(|| format!("contact {contact_id} not found"))?;

    let request = GenerationRequest { artifact_id, kind: artifact.kind, text, contact };
    let response = with_timeout(self.config.generation_timeout, self.generator.generate(request))
      .await
      .map_err(|e| format!("suggestion generation failed: {e}"))?;

    let (suggestions, dropped) = normalize(response.suggestions);
    for d in &dropped {
      tracing::warn!(
        %artifact_id,
        field_path = %d.field_path,
        reason = %d.reason,
        "dropped generated suggestion",
      );
    }

    Ok(Generated { contact_id, suggestions })
  }

  /// Complete the AI stage and persist its batch in one store transaction,
  /// retrying on a lost compare-and-swap.
  async fn commit_suggestions(
    &self,
    artifact: Artifact,
    run_id: Uuid,
    generated: Generated,
  ) -> Result<Option<Artifact>> {
    let artifact_id = artifact.artifact_id;

    for attempt in 1..=self.config.write_attempts {
      let Some(mut current) = self
        .store
        .get_artifact(artifact_id)
        .await
        .map_err(Error::store)?
      else {
        tracing::info!(%artifact_id, "artifact deleted while generating; discarding suggestions");
        return Ok(None);
      };

      if let Err(e) = current.complete_ai(run_id, Utc::now()) {
        tracing::info!(%artifact_id, error = %e, "discarding result of superseded run");
        return Ok(None);
      }

      let batch = NewSuggestionBatch {
        artifact_id,
        contact_id: generated.contact_id,
        user_id: current.user_id,
        suggestions: generated.suggestions.clone(),
      };
      if let Some(commit) = self
        .store
        .complete_suggestion_stage(&current, batch)
        .await
        .map_err(Error::store)?
      {
        tracing::info!(
          %artifact_id,
          batch_id = %commit.batch.batch_id,
          suggestions = commit.batch.suggestions.len(),
          staled = commit.staled.len(),
          "stage completed",
        );
        return Ok(Some(commit.artifact));
      }
      tracing::debug!(%artifact_id, attempt, "artifact changed concurrently; retrying");
    }

    Err(Error::Contended { kind: "artifact", id: artifact_id })
  }

  // ── Outcomes ──────────────────────────────────────────────────────────

  async fn fail_stage(
    &self,
    artifact: Artifact,
    stage: Stage,
    run_id: Uuid,
    reason: String,
  ) -> Result<Option<Artifact>> {
    tracing::warn!(artifact_id = %artifact.artifact_id, %stage, %reason, "stage failed");
    let result = self
      .update_artifact(artifact.artifact_id, |a| {
        a.fail(stage, run_id, reason.clone(), Utc::now())
      })
      .await;
    settle(artifact.artifact_id, stage, run_id, result)
  }
}

/// Resolve the write-back of a stage outcome. A stale run or a deleted
/// artifact is not an error; the outcome is dropped and `None` returned, so
/// the caller reloads rather than trusting its claimed snapshot.
fn settle(
  artifact_id: Uuid,
  stage: Stage,
  run_id: Uuid,
  result: Result<Option<(Artifact, ())>>,
) -> Result<Option<Artifact>> {
  match result {
    Ok(Some((saved, ()))) => {
      if saved.stage(stage).status == StageStatus::Completed {
        tracing::info!(%artifact_id, %stage, "stage completed");
      }
      Ok(Some(saved))
    }
    Ok(None) => {
      tracing::info!(%artifact_id, %stage, "artifact deleted mid-run; discarding outcome");
      Ok(None)
    }
    Err(Error::Domain(CoreError::StaleRun { .. })) => {
      tracing::info!(%artifact_id, %stage, %run_id, "discarding result of superseded run");
      Ok(None)
    }
    Err(e) => Err(e),
  }
}
