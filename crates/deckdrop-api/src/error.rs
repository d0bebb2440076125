//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use deckdrop_core::Error;
use serde_json::json;
use thiserror::Error;
use tracing::warn;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("gone: {0}")]
  Gone(String),

  #[error(transparent)]
  Engine(#[from] Error),
}

impl ApiError {
  fn status(&self) -> StatusCode {
    match self {
      Self::NotFound(_) => StatusCode::NOT_FOUND,
      Self::BadRequest(_) => StatusCode::BAD_REQUEST,
      Self::Conflict(_) => StatusCode::CONFLICT,
      Self::Gone(_) => StatusCode::GONE,
      Self::Engine(e) => match e {
        Error::ActiveDropExists { .. }
        | Error::ClaimAlreadyResolved(_)
        | Error::CardNameConflict(_)
        | Error::LedgerConflict(_) => StatusCode::CONFLICT,
        Error::CatalogEmpty | Error::DropNotFound(_) | Error::InstanceNotFound { .. } => {
          StatusCode::NOT_FOUND
        }
        Error::ClaimExpired(_) => StatusCode::GONE,
        Error::InvalidCard(_) => StatusCode::BAD_REQUEST,
        Error::RenderFailed(_) | Error::MessagingFailed(_) => StatusCode::BAD_GATEWAY,
        Error::PersistenceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::AllocationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let body = match &self {
      ApiError::NotFound(m)
      | ApiError::BadRequest(m)
      | ApiError::Conflict(m)
      | ApiError::Gone(m) => json!({ "error": m }),
      ApiError::Engine(e) => {
        if status.is_server_error() {
          warn!(code = e.code(), error = %e, "request failed");
        }
        match e {
          Error::ActiveDropExists { remaining } => json!({
            "error": e.to_string(),
            "code": e.code(),
            "remaining_secs": remaining.as_secs(),
          }),
          _ => json!({ "error": e.to_string(), "code": e.code() }),
        }
      }
    };
    (status, Json(body)).into_response()
  }
}
