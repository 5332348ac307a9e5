//! Handlers for `/artifacts` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/artifacts` | Optional `?contact_id`, `limit` |
//! | `POST`   | `/artifacts` | Body: [`CreateBody`]; returns 201 and starts processing |
//! | `GET`    | `/artifacts/:id` | Includes both stage states |
//! | `DELETE` | `/artifacts/:id` | 204, or 409 `ARTIFACT_IS_SOURCE` |
//! | `POST`   | `/artifacts/:id/reprocess` | Body: `{"stage":"ai"}`, stage optional |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use rapport_core::{
  artifact::{Artifact, ArtifactKind, NewArtifact, Stage},
  store::{ArtifactQuery, ContactStore},
};
use rapport_pipeline::Backends;
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, UserId, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub contact_id: Option<Uuid>,
  pub limit:      Option<usize>,
}

/// `GET /artifacts[?contact_id=<id>][&limit=<n>]`
pub async fn list<B: Backends>(
  State(state): State<AppState<B>>,
  UserId(user_id): UserId,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Artifact>>, ApiError> {
  if let Some(contact_id) = params.contact_id {
    state.engine.contact_for(user_id, contact_id).await?;
  }

  let query = ArtifactQuery {
    user_id:    Some(user_id),
    contact_id: params.contact_id,
    limit:      params.limit,
  };
  let artifacts = state
    .engine
    .store()
    .list_artifacts(&query)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(artifacts))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub kind:       ArtifactKind,
  pub contact_id: Option<Uuid>,
  pub content:    Option<String>,
  /// Reference to uploaded media in blob storage. Required for voice memos.
  pub audio_ref:  Option<String>,
  #[serde(default)]
  pub metadata:   serde_json::Map<String, serde_json::Value>,
}

/// `POST /artifacts`
pub async fn create<B: Backends>(
  State(state): State<AppState<B>>,
  UserId(user_id): UserId,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  if body.kind.requires_extraction() && body.audio_ref.is_none() {
    return Err(ApiError::BadRequest(format!("{} artifacts need an audio_ref", body.kind)));
  }
  if let Some(key) = [Stage::Extraction, Stage::Ai]
    .iter()
    .map(|s| s.error_key())
    .find(|k| body.metadata.contains_key(*k))
  {
    return Err(ApiError::BadRequest(format!("metadata key {key:?} is reserved")));
  }

  let input = NewArtifact {
    contact_id: body.contact_id,
    content: body.content,
    metadata: body.metadata,
    audio_ref: body.audio_ref,
    ..NewArtifact::new(user_id, body.kind)
  };
  let artifact = state.engine.ingest(input).await?;
  Ok((StatusCode::CREATED, Json(artifact)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /artifacts/:id`
pub async fn get_one<B: Backends>(
  State(state): State<AppState<B>>,
  UserId(user_id): UserId,
  Path(id): Path<Uuid>,
) -> Result<Json<Artifact>, ApiError> {
  Ok(Json(state.engine.artifact_for(user_id, id).await?))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /artifacts/:id`
pub async fn delete_one<B: Backends>(
  State(state): State<AppState<B>>,
  UserId(user_id): UserId,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  state.engine.delete_artifact(user_id, id).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Reprocess ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReprocessBody {
  /// Stage to re-arm. Defaults to the first stage the artifact's kind has.
  pub stage: Option<Stage>,
}

/// `POST /artifacts/:id/reprocess`
///
/// Returns 202 with the re-armed artifact; the run itself happens in the
/// background.
pub async fn reprocess<B: Backends>(
  State(state): State<AppState<B>>,
  UserId(user_id): UserId,
  Path(id): Path<Uuid>,
  body: Option<Json<ReprocessBody>>,
) -> Result<impl IntoResponse, ApiError> {
  let stage = body.and_then(|Json(b)| b.stage);
  let artifact = state.engine.reprocess(user_id, id, stage).await?;
  Ok((StatusCode::ACCEPTED, Json(artifact)))
}
