//! Error type for `rapport-pipeline`.
//!
//! Request-path operations (ingest, reprocess, apply, delete) return these
//! errors to their caller. Stage runs never do: worker failures are recorded
//! on the artifact as a failed stage instead.

use rapport_core::store::ArtifactReferences;
use thiserror::Error;
use uuid::Uuid;

use crate::worker::WorkerError;

#[derive(Debug, Error)]
pub enum Error {
  /// A domain rule was violated; classified by [`Error::code`].
  #[error(transparent)]
  Domain(#[from] rapport_core::Error),

  #[error("{0}")]
  Validation(String),

  #[error("{kind} not found: {id}")]
  NotFound { kind: &'static str, id: Uuid },

  #[error("{kind} {id} belongs to another user")]
  Forbidden { kind: &'static str, id: Uuid },

  /// The deletion guard refused to delete an artifact.
  #[error(
    "artifact {artifact_id} is the source of {} contact field(s) and {} applied batch(es)",
    references.source_fields.len(),
    references.applied_batches.len()
  )]
  ArtifactIsSource {
    artifact_id: Uuid,
    references:  ArtifactReferences,
  },

  #[error("upstream service error: {0}")]
  Upstream(#[from] WorkerError),

  /// A write kept losing compare-and-swap races.
  #[error("{kind} {id} is being modified concurrently; try again")]
  Contended { kind: &'static str, id: Uuid },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Box a backend error.
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }

  /// Stable machine-readable code for the error class.
  pub fn code(&self) -> &'static str {
    use rapport_core::Error as Core;

    match self {
      Self::Domain(e) => match e {
        Core::BatchNotPending { .. }
        | Core::BatchContactMismatch { .. }
        | Core::StaleRun { .. } => "RECONCILIATION_ERROR",
        Core::Serialization(_) => "INTERNAL_ERROR",
        Core::UnknownFieldPath(_)
        | Core::InvalidTransition { .. }
        | Core::ExtractionIncomplete(_)
        | Core::ExtractionNotApplicable(_)
        | Core::SelectionNotInBatch(_)
        | Core::InvalidEditValue { .. } => "VALIDATION_ERROR",
      },
      Self::Validation(_) => "VALIDATION_ERROR",
      Self::NotFound { .. } => "NOT_FOUND",
      Self::Forbidden { .. } => "FORBIDDEN",
      Self::ArtifactIsSource { .. } => "ARTIFACT_IS_SOURCE",
      Self::Upstream(_) => "UPSTREAM_SERVICE_ERROR",
      Self::Contended { .. } => "RECONCILIATION_ERROR",
      Self::Store(_) => "INTERNAL_ERROR",
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
