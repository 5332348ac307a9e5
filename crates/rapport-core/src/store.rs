//! The `ContactStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `rapport-store-sqlite`).
//! The pipeline and the API depend on this abstraction, not on any concrete
//! backend.
//!
//! Optimistic-concurrency conflicts are part of each method's return value,
//! never `Self::Error`; the error type is reserved for infrastructure
//! failures.

use std::future::Future;

use serde::Serialize;
use uuid::Uuid;

use crate::{
  artifact::{Artifact, NewArtifact},
  contact::{Contact, NewContact},
  field::FieldPath,
  suggestion::{BatchStatus, NewSuggestionBatch, SuggestionBatch},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`ContactStore::list_artifacts`]. Results are ordered by
/// creation time, newest first.
#[derive(Debug, Clone, Default)]
pub struct ArtifactQuery {
  pub user_id:    Option<Uuid>,
  pub contact_id: Option<Uuid>,
  pub limit:      Option<usize>,
}

/// Parameters for [`ContactStore::list_batches`]. Results are ordered by
/// creation time, newest first.
#[derive(Debug, Clone, Default)]
pub struct BatchQuery {
  pub user_id:     Option<Uuid>,
  pub artifact_id: Option<Uuid>,
  pub contact_id:  Option<Uuid>,
  pub status:      Option<BatchStatus>,
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// A contact field whose current value is credited to an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFieldRef {
  pub contact_id: Uuid,
  pub field_path: FieldPath,
}

/// Everything that still depends on an artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArtifactReferences {
  pub source_fields:   Vec<SourceFieldRef>,
  /// Approved or partially approved batches derived from the artifact.
  pub applied_batches: Vec<Uuid>,
}

impl ArtifactReferences {
  pub fn is_empty(&self) -> bool {
    self.source_fields.is_empty() && self.applied_batches.is_empty()
  }
}

/// Result of [`ContactStore::delete_artifact_if_unreferenced`].
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
  /// The record is gone; carries its last state so the caller can release
  /// the blob.
  Deleted(Artifact),
  NotFound,
  /// Nothing was deleted.
  Referenced(ArtifactReferences),
}

/// Result of a successful [`ContactStore::complete_suggestion_stage`].
#[derive(Debug, Clone)]
pub struct StageCommit {
  pub artifact: Artifact,
  pub batch:    SuggestionBatch,
  /// Older pending batches for the same artifact, now stale.
  pub staled:   Vec<Uuid>,
}

/// Result of [`ContactStore::commit_review`].
#[derive(Debug, Clone)]
pub enum ReviewCommit {
  Committed {
    /// The stored contact, or `None` for a rejection.
    contact: Option<Contact>,
    batch:   SuggestionBatch,
  },
  /// The contact's revision moved since it was read. Nothing was written.
  ContactChanged,
  /// The batch was reviewed (or went stale) since it was read. Nothing was
  /// written.
  BatchNotPending(BatchStatus),
  /// The batch's source artifact no longer exists. Nothing was written.
  ArtifactMissing,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Rapport store backend.
///
/// Every write of an existing artifact or contact is compare-and-swap on its
/// `revision`: the caller passes the record as it read it, and the store
/// writes only if the stored revision is unchanged, returning the record with
/// its new revision.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait ContactStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Contacts ──────────────────────────────────────────────────────────

  fn add_contact(
    &self,
    input: NewContact,
  ) -> impl Future<Output = Result<Contact, Self::Error>> + Send + '_;

  /// Retrieve a contact by UUID. Returns `None` if not found.
  fn get_contact(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Contact>, Self::Error>> + Send + '_;

  // ── Artifacts ─────────────────────────────────────────────────────────

  /// Persist a new artifact. The store sets nothing beyond what
  /// [`NewArtifact::into_artifact`] produces.
  fn add_artifact(
    &self,
    input: NewArtifact,
  ) -> impl Future<Output = Result<Artifact, Self::Error>> + Send + '_;

  fn get_artifact(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Artifact>, Self::Error>> + Send + '_;

  fn list_artifacts<'a>(
    &'a self,
    query: &'a ArtifactQuery,
  ) -> impl Future<Output = Result<Vec<Artifact>, Self::Error>> + Send + 'a;

  /// Compare-and-swap write of an artifact's mutable state. Returns `None`
  /// if the artifact is gone or its revision moved.
  fn save_artifact<'a>(
    &'a self,
    artifact: &'a Artifact,
  ) -> impl Future<Output = Result<Option<Artifact>, Self::Error>> + Send + 'a;

  /// Delete an artifact unless a contact field or an applied batch still
  /// references it. The reference scans and the delete form one
  /// transaction; on success, pending batches for the artifact become
  /// [`BatchStatus::Stale`].
  fn delete_artifact_if_unreferenced(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<DeleteOutcome, Self::Error>> + Send + '_;

  // ── Suggestion batches ────────────────────────────────────────────────

  fn get_batch(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<SuggestionBatch>, Self::Error>> + Send + '_;

  fn list_batches<'a>(
    &'a self,
    query: &'a BatchQuery,
  ) -> impl Future<Output = Result<Vec<SuggestionBatch>, Self::Error>> + Send + 'a;

  /// In one transaction: compare-and-swap write `artifact` (whose AI stage
  /// has just completed), insert the new batch, and mark older pending
  /// batches for the artifact stale. Returns `None`, writing nothing, if the
  /// artifact's revision moved.
  fn complete_suggestion_stage<'a>(
    &'a self,
    artifact: &'a Artifact,
    batch: NewSuggestionBatch,
  ) -> impl Future<Output = Result<Option<StageCommit>, Self::Error>> + Send + 'a;

  /// In one transaction: verify `batch` is still pending in the store and
  /// its source artifact exists, compare-and-swap write `contact` if given,
  /// and write the batch's review outcome.
  fn commit_review<'a>(
    &'a self,
    contact: Option<&'a Contact>,
    batch: &'a SuggestionBatch,
  ) -> impl Future<Output = Result<ReviewCommit, Self::Error>> + Send + 'a;
}
