//! JSON REST API for reviewing Rapport artifacts and suggestion batches.
//!
//! Exposes an axum [`Router`] backed by a pipeline [`Engine`]. Authentication,
//! TLS, and transport concerns are the caller's responsibility; every route
//! except `/health` expects the gateway to set `x-user-id`.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", rapport_api::api_router(state))
//! ```

pub mod artifacts;
pub mod batches;
pub mod contacts;
pub mod error;
pub mod user;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use rapport_pipeline::{Backends, Engine};

pub use error::ApiError;
pub use user::UserId;

/// Shared state threaded through all handlers.
pub struct AppState<B: Backends> {
  pub engine:              Arc<Engine<B>>,
  /// Confidence at or above which a suggestion is pre-selected for review.
  pub selection_threshold: f64,
}

impl<B: Backends> Clone for AppState<B> {
  fn clone(&self) -> Self {
    Self {
      engine:              Arc::clone(&self.engine),
      selection_threshold: self.selection_threshold,
    }
  }
}

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<B: Backends>(state: AppState<B>) -> Router<()> {
  Router::new()
    .route("/health", get(health))
    // Contacts
    .route("/contacts", post(contacts::create::<B>))
    .route("/contacts/{id}", get(contacts::get_one::<B>))
    // Artifacts
    .route("/artifacts", get(artifacts::list::<B>).post(artifacts::create::<B>))
    .route(
      "/artifacts/{id}",
      get(artifacts::get_one::<B>).delete(artifacts::delete_one::<B>),
    )
    .route("/artifacts/{id}/reprocess", post(artifacts::reprocess::<B>))
    // Suggestion batches
    .route("/batches", get(batches::list::<B>))
    .route("/batches/{id}", get(batches::get_one::<B>))
    .route("/batches/{id}/apply", post(batches::apply::<B>))
    .with_state(state)
}

async fn health() -> &'static str { "ok" }
