//! Handlers for `/batches` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/batches` | Optional `?artifact_id`, `contact_id`, `status` |
//! | `GET`  | `/batches/:id` | Batch plus its `default_selection` |
//! | `POST` | `/batches/:id/apply` | Body: `{"selected_field_paths":[...]}`; `[]` rejects |

use std::collections::BTreeSet;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use rapport_core::{
  contact::Contact,
  field::FieldPath,
  store::{BatchQuery, ContactStore},
  suggestion::{BatchStatus, SuggestionBatch},
};
use rapport_pipeline::Backends;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, UserId, error::ApiError};

/// A batch as shown to a reviewer.
#[derive(Debug, Serialize)]
pub struct BatchView {
  #[serde(flatten)]
  pub batch:             SuggestionBatch,
  /// Paths pre-selected for review; only meaningful while pending.
  pub default_selection: Vec<FieldPath>,
}

impl BatchView {
  fn new(batch: SuggestionBatch, threshold: f64) -> Self {
    let default_selection = if batch.status == BatchStatus::Pending {
      batch.default_selection(threshold)
    } else {
      Vec::new()
    };
    Self { batch, default_selection }
  }
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub artifact_id: Option<Uuid>,
  pub contact_id:  Option<Uuid>,
  pub status:      Option<BatchStatus>,
}

/// `GET /batches[?artifact_id=<id>][&contact_id=<id>][&status=<status>]`
pub async fn list<B: Backends>(
  State(state): State<AppState<B>>,
  UserId(user_id): UserId,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<BatchView>>, ApiError> {
  let query = BatchQuery {
    user_id:     Some(user_id),
    artifact_id: params.artifact_id,
    contact_id:  params.contact_id,
    status:      params.status,
  };
  let batches = state
    .engine
    .store()
    .list_batches(&query)
    .await
    .map_err(ApiError::store)?;

  Ok(Json(
    batches
      .into_iter()
      .map(|b| BatchView::new(b, state.selection_threshold))
      .collect(),
  ))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /batches/:id`
pub async fn get_one<B: Backends>(
  State(state): State<AppState<B>>,
  UserId(user_id): UserId,
  Path(id): Path<Uuid>,
) -> Result<Json<BatchView>, ApiError> {
  let batch = state.engine.batch_for(user_id, id).await?;
  Ok(Json(BatchView::new(batch, state.selection_threshold)))
}

// ─── Apply ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ApplyBody {
  /// Dotted field paths to accept.
  pub selected_field_paths: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct Applied {
  pub contact: Contact,
  pub batch:   SuggestionBatch,
}

/// `POST /batches/:id/apply`
pub async fn apply<B: Backends>(
  State(state): State<AppState<B>>,
  UserId(user_id): UserId,
  Path(id): Path<Uuid>,
  Json(body): Json<ApplyBody>,
) -> Result<Json<Applied>, ApiError> {
  let selected = body
    .selected_field_paths
    .iter()
    .map(|p| p.parse::<FieldPath>())
    .collect::<Result<BTreeSet<_>, _>>()
    .map_err(rapport_pipeline::Error::from)?;

  let outcome = state.engine.apply(user_id, id, selected).await?;
  Ok(Json(Applied { contact: outcome.contact, batch: outcome.batch }))
}
