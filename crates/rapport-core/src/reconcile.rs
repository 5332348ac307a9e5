//! Reconciliation: merging a reviewer-selected subset of a suggestion batch
//! into its contact.
//!
//! [`reconcile`] is a pure function: it returns the updated contact and the
//! reviewed batch without persisting either. The store commits both in one
//! transaction.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::{
  Error, Result,
  contact::{Contact, FieldSlot},
  field::{ContactField, FieldKind, FieldPath},
  suggestion::{BatchStatus, EditAction, Suggestion, SuggestionBatch},
};

/// The outcome of reviewing a batch, ready to be persisted.
#[derive(Debug, Clone)]
pub struct Reconciliation {
  /// The contact with every selected edit applied. Unchanged for a
  /// rejection.
  pub contact: Contact,
  pub batch:   SuggestionBatch,
  /// Paths whose value or provenance changed, in batch order.
  pub touched: Vec<FieldPath>,
}

/// The review law: nothing selected is a rejection, everything selected is
/// an approval, and anything in between is partial.
pub fn review_status(
  selected: &BTreeSet<FieldPath>,
  suggested: &BTreeSet<FieldPath>,
) -> BatchStatus {
  if selected.is_empty() {
    BatchStatus::Rejected
  } else if selected == suggested {
    BatchStatus::Approved
  } else {
    BatchStatus::Partial
  }
}

/// Apply the `selected` suggestions of `batch` to `contact`.
///
/// Fails without side effects if the batch was already reviewed, targets a
/// different contact, if a selected path is not part of the batch, or if any
/// selected suggestion carries a value its field cannot hold.
pub fn reconcile(
  contact: &Contact,
  batch: &SuggestionBatch,
  selected: &BTreeSet<FieldPath>,
  now: DateTime<Utc>,
) -> Result<Reconciliation> {
  if batch.status != BatchStatus::Pending {
    return Err(Error::BatchNotPending {
      batch_id: batch.batch_id,
      status:   batch.status,
    });
  }
  if batch.contact_id != contact.contact_id {
    return Err(Error::BatchContactMismatch {
      batch_id:   batch.batch_id,
      contact_id: contact.contact_id,
    });
  }

  let suggested = batch.field_paths();
  if let Some(stray) = selected.difference(&suggested).next() {
    return Err(Error::SelectionNotInBatch(*stray));
  }

  let mut reviewed = batch.clone();
  reviewed.status = review_status(selected, &suggested);
  reviewed.reviewed_at = Some(now);

  if selected.is_empty() {
    reviewed.user_selections = BTreeMap::new();
    return Ok(Reconciliation {
      contact: contact.clone(),
      batch:   reviewed,
      touched: Vec::new(),
    });
  }

  let mut updated = contact.clone();
  let mut touched = Vec::with_capacity(selected.len());
  for suggestion in batch.suggestions.iter().filter(|s| selected.contains(&s.field_path)) {
    apply_edit(&mut updated, suggestion)?;
    updated
      .field_sources
      .insert(suggestion.field_path, batch.artifact_id);
    touched.push(suggestion.field_path);
  }
  updated.updated_at = now;

  reviewed.user_selections = suggested
    .iter()
    .map(|path| (*path, selected.contains(path)))
    .collect();
  reviewed.applied_at = Some(now);

  Ok(Reconciliation { contact: updated, batch: reviewed, touched })
}

/// Apply a single suggestion to `contact` according to its field kind.
/// Provenance is the caller's concern.
pub fn apply_edit(contact: &mut Contact, suggestion: &Suggestion) -> Result<()> {
  let path = suggestion.field_path;
  let value = &suggestion.suggested_value;
  let invalid = |reason: &str| Error::InvalidEditValue {
    path,
    reason: reason.to_owned(),
  };

  match contact.slot_mut(path) {
    FieldSlot::Required(slot) => match suggestion.action {
      EditAction::Remove => return Err(invalid("a contact's name cannot be removed")),
      EditAction::Add | EditAction::Update => match scalar_value(value) {
        Ok(Some(name)) => *slot = name,
        Ok(None) => return Err(invalid("a contact's name cannot be empty")),
        Err(reason) => return Err(invalid(reason)),
      },
    },

    // `add` has no meaning for a single value; it replaces like `update`.
    FieldSlot::Scalar(slot) => match suggestion.action {
      EditAction::Remove => *slot = None,
      EditAction::Add | EditAction::Update => {
        *slot = scalar_value(value).map_err(invalid)?;
      }
    },

    FieldSlot::OrderedSet(set) => match suggestion.action {
      EditAction::Add => {
        for item in set_values(value).map_err(invalid)? {
          insert_unique(set, item);
        }
      }
      EditAction::Update => {
        let mut replacement = Vec::new();
        for item in set_values(value).map_err(invalid)? {
          insert_unique(&mut replacement, item);
        }
        *set = replacement;
      }
      EditAction::Remove if value.is_null() => set.clear(),
      EditAction::Remove => {
        let doomed = set_values(value).map_err(invalid)?;
        set.retain(|existing| !doomed.iter().any(|d| same_item(existing, d)));
      }
    },
  }

  Ok(())
}

/// Whether [`apply_edit`] would accept this edit. The answer depends only on
/// the path, action and value, never on the contact's current state.
pub fn check_edit(
  path: FieldPath,
  action: EditAction,
  value: &Value,
) -> Result<(), &'static str> {
  if path == FieldPath::Top(ContactField::Name) {
    return match action {
      EditAction::Remove => Err("a contact's name cannot be removed"),
      EditAction::Add | EditAction::Update => match scalar_value(value)? {
        Some(_) => Ok(()),
        None => Err("a contact's name cannot be empty"),
      },
    };
  }

  match (path.kind(), action) {
    (FieldKind::Scalar, EditAction::Remove) => Ok(()),
    (FieldKind::Scalar, _) => scalar_value(value).map(drop),
    (FieldKind::OrderedSet, EditAction::Remove) if value.is_null() => Ok(()),
    (FieldKind::OrderedSet, _) => set_values(value).map(drop),
  }
}

// ─── Value coercion ──────────────────────────────────────────────────────────

/// A scalar field's new value. `null` and blank strings clear the field.
fn scalar_value(value: &Value) -> Result<Option<String>, &'static str> {
  let text = match value {
    Value::Null => return Ok(None),
    Value::String(s) => s.trim().to_owned(),
    Value::Number(n) => n.to_string(),
    Value::Bool(b) => b.to_string(),
    Value::Array(_) | Value::Object(_) => {
      return Err("expected a single value, not a list or object");
    }
  };
  Ok(Some(text).filter(|t| !t.is_empty()))
}

/// The items of a set edit: one string or an array of strings. Blank items
/// are ignored.
fn set_values(value: &Value) -> Result<Vec<String>, &'static str> {
  let items = match value {
    Value::String(s) => vec![s.as_str()],
    Value::Array(items) => items
      .iter()
      .map(|v| v.as_str().ok_or("list items must be strings"))
      .collect::<Result<Vec<_>, _>>()?,
    _ => return Err("expected a string or a list of strings"),
  };
  Ok(
    items
      .into_iter()
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(str::to_owned)
      .collect(),
  )
}

/// Set membership ignores surrounding whitespace and letter case; the first
/// spelling seen is the one kept.
fn same_item(a: &str, b: &str) -> bool { a.trim().to_lowercase() == b.trim().to_lowercase() }

fn insert_unique(set: &mut Vec<String>, item: String) {
  if !set.iter().any(|existing| same_item(existing, &item)) {
    set.push(item);
  }
}
