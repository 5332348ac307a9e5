//! Handlers for `/contacts` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/contacts` | Body: [`CreateBody`]; returns 201 + stored contact |
//! | `GET`  | `/contacts/:id` | 404 if not found, 403 if not the caller's |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use rapport_core::{
  contact::{Contact, NewContact},
  store::ContactStore,
};
use rapport_pipeline::Backends;
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, UserId, error::ApiError};

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name:         String,
  pub company:      Option<String>,
  pub title:        Option<String>,
  pub location:     Option<String>,
  pub email:        Option<String>,
  pub phone:        Option<String>,
  pub linkedin_url: Option<String>,
  pub notes:        Option<String>,
}

/// `POST /contacts`
pub async fn create<B: Backends>(
  State(state): State<AppState<B>>,
  UserId(user_id): UserId,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let name = body.name.trim();
  if name.is_empty() {
    return Err(ApiError::BadRequest("contact name must not be blank".into()));
  }

  let input = NewContact {
    company: body.company,
    title: body.title,
    location: body.location,
    email: body.email,
    phone: body.phone,
    linkedin_url: body.linkedin_url,
    notes: body.notes,
    ..NewContact::new(user_id, name)
  };
  let contact = state
    .engine
    .store()
    .add_contact(input)
    .await
    .map_err(ApiError::store)?;

  tracing::info!(contact_id = %contact.contact_id, "contact created");
  Ok((StatusCode::CREATED, Json(contact)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /contacts/:id`
pub async fn get_one<B: Backends>(
  State(state): State<AppState<B>>,
  UserId(user_id): UserId,
  Path(id): Path<Uuid>,
) -> Result<Json<Contact>, ApiError> {
  Ok(Json(state.engine.contact_for(user_id, id).await?))
}
