//! Suggestion batches: proposed contact edits derived from one artifact.
//!
//! A batch's suggestion list is immutable once created. Only its review
//! outcome changes, exactly once, through [`crate::reconcile`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{field::FieldPath, reconcile::check_edit};

/// Suggestions at or above this confidence are pre-selected for review.
pub const DEFAULT_SELECTION_THRESHOLD: f64 = 0.7;

// ─── Suggestion ──────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EditAction {
  Add,
  Update,
  Remove,
}

/// One proposed edit to one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
  pub field_path:      FieldPath,
  pub action:          EditAction,
  /// A string for scalar fields; a string or array of strings for sets.
  /// `null` on a `remove` clears the whole field.
  pub suggested_value: serde_json::Value,
  /// In `[0, 1]`; computed once by the generator and never recomputed.
  pub confidence:      f64,
  pub reasoning:       String,
}

// ─── Raw generator output ────────────────────────────────────────────────────

/// A suggestion as emitted by the generator, before validation against the
/// field registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedSuggestion {
  pub field_path:      String,
  pub action:          String,
  #[serde(default)]
  pub suggested_value: serde_json::Value,
  pub confidence:      f64,
  #[serde(default)]
  pub reasoning:       Option<String>,
}

/// Why a proposed suggestion was dropped during normalisation.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedSuggestion {
  pub field_path: String,
  pub reason:     String,
}

/// Validate raw generator output into batch suggestions.
///
/// Entries with an unknown path or action, or a non-finite confidence, are
/// dropped, as is any edit [`check_edit`] refuses: a value of the wrong shape
/// for its field, or a `remove` or blanking of the contact's name. Every
/// kept suggestion can therefore be applied. Confidence is clamped to
/// `[0, 1]`. When a path repeats, the most confident entry wins and keeps the
/// position of the first occurrence.
pub fn normalize(
  proposed: Vec<ProposedSuggestion>,
) -> (Vec<Suggestion>, Vec<DroppedSuggestion>) {
  let mut kept: Vec<Suggestion> = Vec::with_capacity(proposed.len());
  let mut dropped = Vec::new();

  for raw in proposed {
    let reject = |reason: &str| DroppedSuggestion {
      field_path: raw.field_path.clone(),
      reason:     reason.to_owned(),
    };

    let Ok(field_path) = raw.field_path.parse::<FieldPath>() else {
      dropped.push(reject("unknown field path"));
      continue;
    };
    let Ok(action) = raw.action.to_ascii_lowercase().parse::<EditAction>() else {
      dropped.push(reject("unknown action"));
      continue;
    };
    if !raw.confidence.is_finite() {
      dropped.push(reject("confidence is not a finite number"));
      continue;
    }
    if let Err(reason) = check_edit(field_path, action, &raw.suggested_value) {
      dropped.push(reject(reason));
      continue;
    }

    let suggestion = Suggestion {
      field_path,
      action,
      suggested_value: raw.suggested_value,
      confidence: raw.confidence.clamp(0.0, 1.0),
      reasoning: raw.reasoning.unwrap_or_default(),
    };

    match kept.iter_mut().find(|s| s.field_path == field_path) {
      Some(existing) if suggestion.confidence > existing.confidence => {
        dropped.push(DroppedSuggestion {
          field_path: existing.field_path.to_string(),
          reason:     "superseded by a more confident duplicate".into(),
        });
        *existing = suggestion;
      }
      Some(_) => dropped.push(reject("duplicate of a more confident suggestion")),
      None => kept.push(suggestion),
    }
  }

  (kept, dropped)
}

// ─── Batch ───────────────────────────────────────────────────────────────────

/// Review state of a batch. Everything but `Pending` is terminal.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BatchStatus {
  #[default]
  Pending,
  /// Every suggested path was selected.
  Approved,
  /// A proper, non-empty subset was selected.
  Partial,
  /// Nothing was selected.
  Rejected,
  /// Never reviewed and no longer reviewable: a newer batch for the same
  /// artifact replaced it, or its source artifact was deleted.
  Stale,
}

impl BatchStatus {
  /// Whether some of the batch's edits have been merged into the contact.
  pub fn is_applied(self) -> bool { matches!(self, Self::Approved | Self::Partial) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionBatch {
  pub batch_id:        Uuid,
  pub artifact_id:     Uuid,
  pub contact_id:      Uuid,
  pub user_id:         Uuid,
  pub suggestions:     Vec<Suggestion>,
  pub status:          BatchStatus,
  /// Populated at review time: every suggested path → whether it was
  /// selected. Empty for a rejection.
  pub user_selections: BTreeMap<FieldPath, bool>,
  pub created_at:      DateTime<Utc>,
  pub reviewed_at:     Option<DateTime<Utc>>,
  pub applied_at:      Option<DateTime<Utc>>,
}

impl SuggestionBatch {
  pub fn field_paths(&self) -> BTreeSet<FieldPath> {
    self.suggestions.iter().map(|s| s.field_path).collect()
  }

  pub fn suggestion(&self, path: FieldPath) -> Option<&Suggestion> {
    self.suggestions.iter().find(|s| s.field_path == path)
  }

  /// The paths a reviewer sees pre-selected: every suggestion whose
  /// confidence is at least `threshold`, in batch order.
  pub fn default_selection(&self, threshold: f64) -> Vec<FieldPath> {
    self
      .suggestions
      .iter()
      .filter(|s| s.confidence >= threshold)
      .map(|s| s.field_path)
      .collect()
  }
}

/// Input to [`crate::store::ContactStore::complete_suggestion_stage`].
#[derive(Debug, Clone)]
pub struct NewSuggestionBatch {
  pub artifact_id: Uuid,
  pub contact_id:  Uuid,
  pub user_id:     Uuid,
  pub suggestions: Vec<Suggestion>,
}

impl NewSuggestionBatch {
  pub fn into_batch(self, now: DateTime<Utc>) -> SuggestionBatch {
    SuggestionBatch {
      batch_id:        Uuid::new_v4(),
      artifact_id:     self.artifact_id,
      contact_id:      self.contact_id,
      user_id:         self.user_id,
      suggestions:     self.suggestions,
      status:          BatchStatus::Pending,
      user_selections: BTreeMap::new(),
      created_at:      now,
      reviewed_at:     None,
      applied_at:      None,
    }
  }
}
