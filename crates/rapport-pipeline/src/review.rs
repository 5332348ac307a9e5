//! Applying a reviewed suggestion batch to its contact.

use std::collections::BTreeSet;

use chrono::Utc;
use rapport_core::{
  contact::Contact,
  field::FieldPath,
  reconcile::reconcile,
  store::{ContactStore, ReviewCommit},
  suggestion::SuggestionBatch,
};
use uuid::Uuid;

use crate::{Backends, Engine, Error, Result};

/// The contact and batch as stored after a review.
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
  pub contact: Contact,
  pub batch:   SuggestionBatch,
}

impl<B: Backends> Engine<B> {
  /// Merge the `selected` suggestions of a batch into its contact and record
  /// the review. An empty selection rejects the batch.
  ///
  /// The contact and the batch are written in one store transaction. If the
  /// contact changed since it was read, the merge is recomputed against the
  /// fresh contact.
  pub async fn apply(
    &self,
    user_id: Uuid,
    batch_id: Uuid,
    selected: BTreeSet<FieldPath>,
  ) -> Result<ReviewOutcome> {
    let batch = self.batch_for(user_id, batch_id).await?;

    for attempt in 1..=self.config.write_attempts {
      let contact = self
        .store
        .get_contact(batch.contact_id)
        .await
        .map_err(Error::store)?
        .ok_or(Error::NotFound { kind: "contact", id: batch.contact_id })?;

      let merged = reconcile(&contact, &batch, &selected, Utc::now())?;
      let write = if merged.batch.status.is_applied() { Some(&merged.contact) } else { None };

      match self
        .store
        .commit_review(write, &merged.batch)
        .await
        .map_err(Error::store)?
      {
        ReviewCommit::Committed { contact: saved, batch: reviewed } => {
          tracing::info!(
            %batch_id,
            contact_id = %batch.contact_id,
            status = %reviewed.status,
            touched = ?merged.touched,
            "suggestion batch reviewed",
          );
          return Ok(ReviewOutcome {
            contact: saved.unwrap_or(contact),
            batch:   reviewed,
          });
        }
        ReviewCommit::ContactChanged => {
          tracing::debug!(%batch_id, attempt, "contact changed concurrently; re-merging");
        }
        ReviewCommit::BatchNotPending(status) => {
          return Err(rapport_core::Error::BatchNotPending { batch_id, status }.into());
        }
        ReviewCommit::ArtifactMissing => {
          return Err(Error::NotFound { kind: "artifact", id: batch.artifact_id });
        }
      }
    }

    Err(Error::Contended { kind: "contact", id: batch.contact_id })
  }
}
