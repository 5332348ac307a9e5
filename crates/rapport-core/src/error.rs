//! Error types for `rapport-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::{
  artifact::{ArtifactKind, Stage, StageStatus},
  field::FieldPath,
  suggestion::BatchStatus,
};

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown field path: {0:?}")]
  UnknownFieldPath(String),

  #[error("{stage} stage cannot move from {from} to {to}")]
  InvalidTransition {
    stage: Stage,
    from:  StageStatus,
    to:    StageStatus,
  },

  /// A worker result arrived for a run that is no longer current, either
  /// because the stage was reset or because a newer run replaced it.
  #[error("{stage} run {run_id} is no longer current")]
  StaleRun { stage: Stage, run_id: Uuid },

  #[error("artifact {0} has not completed extraction")]
  ExtractionIncomplete(Uuid),

  #[error("{0} artifacts have no extraction stage")]
  ExtractionNotApplicable(ArtifactKind),

  #[error("batch {batch_id} is {status}, not pending")]
  BatchNotPending { batch_id: Uuid, status: BatchStatus },

  #[error("batch {batch_id} targets a different contact than {contact_id}")]
  BatchContactMismatch { batch_id: Uuid, contact_id: Uuid },

  #[error("field path {0} is not part of the batch")]
  SelectionNotInBatch(FieldPath),

  #[error("invalid value for {path}: {reason}")]
  InvalidEditValue { path: FieldPath, reason: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
