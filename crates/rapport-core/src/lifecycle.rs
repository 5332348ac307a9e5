//! The per-artifact processing state machine.
//!
//! Each artifact moves through two sequential stages, extraction then AI, and
//! each stage moves `pending → processing → {completed | failed}`. Every
//! transition is a method on [`Artifact`] that either applies cleanly or
//! leaves the artifact untouched and returns an error. The caller is
//! responsible for persisting the result.
//!
//! A stage's `run_id` identifies the one run that is allowed to finish it.
//! Resetting the stage clears the id, so a worker result that arrives after
//! a reprocess request is rejected with [`Error::StaleRun`] rather than
//! overwriting newer state.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Error, Result,
  artifact::{Artifact, Stage, StageState, StageStatus},
};

/// Output of a successful extraction run.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcription {
  pub text:          String,
  pub duration_secs: Option<f64>,
}

impl Artifact {
  /// The stage that is armed and waiting to run, if any.
  ///
  /// AI is never armed until extraction has completed.
  pub fn next_stage(&self) -> Option<Stage> {
    match (self.extraction.status, self.ai.status) {
      (StageStatus::Pending, _) => Some(Stage::Extraction),
      (StageStatus::Completed, StageStatus::Pending) => Some(Stage::Ai),
      _ => None,
    }
  }

  /// `pending → processing`. Returns the id of the new run.
  pub fn begin(&mut self, stage: Stage, now: DateTime<Utc>) -> Result<Uuid> {
    let current = self.stage(stage).status;
    if current != StageStatus::Pending {
      return Err(Error::InvalidTransition {
        stage,
        from: current,
        to: StageStatus::Processing,
      });
    }
    if stage == Stage::Ai && self.extraction.status != StageStatus::Completed {
      return Err(Error::ExtractionIncomplete(self.artifact_id));
    }

    let run_id = Uuid::new_v4();
    *self.stage_mut(stage) = StageState {
      status:       StageStatus::Processing,
      started_at:   Some(now),
      completed_at: None,
      run_id:       Some(run_id),
    };
    self.metadata.remove(stage.error_key());
    self.updated_at = now;
    Ok(run_id)
  }

  /// Extraction `processing → completed`. Writes the transcript and arms the
  /// AI stage.
  pub fn complete_extraction(
    &mut self,
    run_id: Uuid,
    transcription: Transcription,
    now: DateTime<Utc>,
  ) -> Result<()> {
    self.check_run(Stage::Extraction, run_id)?;

    self.transcript = Some(transcription.text);
    self.duration_secs = transcription.duration_secs;
    self.extraction.status = StageStatus::Completed;
    self.extraction.completed_at = Some(now);
    self.ai = StageState::pending();
    self.metadata.remove(Stage::Ai.error_key());
    self.updated_at = now;
    Ok(())
  }

  /// AI `processing → completed`. The caller persists the new suggestion
  /// batch in the same write.
  pub fn complete_ai(&mut self, run_id: Uuid, now: DateTime<Utc>) -> Result<()> {
    self.check_run(Stage::Ai, run_id)?;

    self.ai.status = StageStatus::Completed;
    self.ai.completed_at = Some(now);
    self.updated_at = now;
    Ok(())
  }

  /// `processing → failed`, recording `reason` in the metadata.
  pub fn fail(
    &mut self,
    stage: Stage,
    run_id: Uuid,
    reason: impl Into<String>,
    now: DateTime<Utc>,
  ) -> Result<()> {
    self.check_run(stage, run_id)?;

    let state = self.stage_mut(stage);
    state.status = StageStatus::Failed;
    state.completed_at = Some(now);
    self.metadata.insert(
      stage.error_key().to_owned(),
      serde_json::Value::String(reason.into()),
    );
    self.updated_at = now;
    Ok(())
  }

  /// Re-arm a stage for another run.
  ///
  /// With no explicit target, extraction is reset for kinds that have it and
  /// AI otherwise. Resetting extraction also resets AI, since its output is
  /// derived from the transcript. A stage that is already pending is left
  /// exactly as it is. Returns whether anything changed.
  pub fn reset(&mut self, target: Option<Stage>, now: DateTime<Utc>) -> Result<bool> {
    let target = match target {
      Some(stage) => stage,
      None if self.kind.requires_extraction() => Stage::Extraction,
      None => Stage::Ai,
    };

    let stages: &[Stage] = match target {
      Stage::Extraction if !self.kind.requires_extraction() => {
        return Err(Error::ExtractionNotApplicable(self.kind));
      }
      Stage::Extraction => &[Stage::Extraction, Stage::Ai],
      Stage::Ai if self.extraction.status != StageStatus::Completed => {
        return Err(Error::ExtractionIncomplete(self.artifact_id));
      }
      Stage::Ai => &[Stage::Ai],
    };

    let mut changed = false;
    for &stage in stages {
      if self.stage(stage).status == StageStatus::Pending {
        continue;
      }
      *self.stage_mut(stage) = StageState::pending();
      self.metadata.remove(stage.error_key());
      changed = true;
    }

    if changed {
      self.updated_at = now;
    }
    Ok(changed)
  }

  fn check_run(&self, stage: Stage, run_id: Uuid) -> Result<()> {
    let state = self.stage(stage);
    if state.status == StageStatus::Processing && state.run_id == Some(run_id) {
      Ok(())
    } else {
      Err(Error::StaleRun { stage, run_id })
    }
  }
}
