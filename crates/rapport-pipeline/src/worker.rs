//! Contracts for the two external workers the pipeline calls.
//!
//! Both workers are stateless request/response services that may be invoked
//! concurrently for different artifacts. They never touch artifact state;
//! the engine owns every stage transition and bounds every call with
//! [`with_timeout`].

use std::{future::Future, time::Duration};

use rapport_core::{
  artifact::ArtifactKind, contact::Contact, lifecycle::Transcription,
  suggestion::ProposedSuggestion,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Why a worker call produced no usable result.
#[derive(Debug, Error)]
pub enum WorkerError {
  #[error("timed out after {0:?}")]
  Timeout(Duration),

  #[error("{0}")]
  Upstream(String),

  #[error("malformed response: {0}")]
  Malformed(String),
}

// ─── Extraction ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionRequest {
  pub artifact_id: Uuid,
  /// Blob store reference of the audio to transcribe.
  pub blob_ref:    String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResponse {
  pub text:          String,
  #[serde(default)]
  pub duration_secs: Option<f64>,
}

impl From<TranscriptionResponse> for Transcription {
  fn from(r: TranscriptionResponse) -> Self {
    Transcription { text: r.text, duration_secs: r.duration_secs }
  }
}

/// Turns raw media into text.
pub trait Transcriber: Send + Sync {
  fn transcribe(
    &self,
    request: TranscriptionRequest,
  ) -> impl Future<Output = Result<TranscriptionResponse, WorkerError>> + Send + '_;
}

// ─── Suggestion generation ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
  pub artifact_id: Uuid,
  pub kind:        ArtifactKind,
  /// The artifact's transcript, or its content if it has no transcript.
  pub text:        String,
  /// Current state of the contact, so the generator can avoid proposing
  /// what is already known.
  pub contact:     Contact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
  pub suggestions: Vec<ProposedSuggestion>,
}

/// Derives proposed contact edits from an artifact's text.
pub trait SuggestionGenerator: Send + Sync {
  fn generate(
    &self,
    request: GenerationRequest,
  ) -> impl Future<Output = Result<GenerationResponse, WorkerError>> + Send + '_;
}

// ─── Timeouts ────────────────────────────────────────────────────────────────

/// Run a worker call, failing with [`WorkerError::Timeout`] once `limit`
/// elapses.
pub async fn with_timeout<T>(
  limit: Duration,
  call: impl Future<Output = Result<T, WorkerError>>,
) -> Result<T, WorkerError> {
  match tokio::time::timeout(limit, call).await {
    Ok(result) => result,
    Err(_) => Err(WorkerError::Timeout(limit)),
  }
}
