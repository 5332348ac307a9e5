//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use rapport_pipeline::Error as PipelineError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
///
/// Every error is rendered as `{"error": message, "code": code}`; a refused
/// artifact deletion also carries the `references` that blocked it.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Pipeline(#[from] PipelineError),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("missing or malformed x-user-id header")]
  MissingUser,
}

impl ApiError {
  /// Box a backend error.
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Pipeline(PipelineError::store(e))
  }

  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Pipeline(e) => match e.code() {
        "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
        "NOT_FOUND" => StatusCode::NOT_FOUND,
        "FORBIDDEN" => StatusCode::FORBIDDEN,
        "ARTIFACT_IS_SOURCE" | "RECONCILIATION_ERROR" => StatusCode::CONFLICT,
        "UPSTREAM_SERVICE_ERROR" => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
      },
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::MissingUser => StatusCode::UNAUTHORIZED,
    }
  }

  pub fn code(&self) -> &'static str {
    match self {
      ApiError::Pipeline(e) => e.code(),
      ApiError::BadRequest(_) => "VALIDATION_ERROR",
      ApiError::MissingUser => "UNAUTHORIZED",
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }

    let mut body = json!({ "error": self.to_string(), "code": self.code() });
    if let ApiError::Pipeline(PipelineError::ArtifactIsSource { references, .. }) = &self {
      body["references"] = json!(references);
    }
    (status, Json(body)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use uuid::Uuid;

  use super::*;

  #[test]
  fn pipeline_errors_map_to_http_statuses() {
    let id = Uuid::new_v4();
    let cases = [
      (PipelineError::Validation("bad".into()), StatusCode::BAD_REQUEST),
      (PipelineError::NotFound { kind: "artifact", id }, StatusCode::NOT_FOUND),
      (PipelineError::Forbidden { kind: "artifact", id }, StatusCode::FORBIDDEN),
      (PipelineError::Contended { kind: "contact", id }, StatusCode::CONFLICT),
    ];
    for (err, status) in cases {
      assert_eq!(ApiError::from(err).status(), status);
    }
  }

  #[test]
  fn missing_user_is_unauthorized() {
    let err = ApiError::MissingUser;
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(err.code(), "UNAUTHORIZED");
  }
}
