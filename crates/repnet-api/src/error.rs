//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("store unavailable: {0}")]
  Unavailable(String),

  #[error("internal error: {0}")]
  Internal(String),
}

impl From<repnet_core::Error> for ApiError {
  fn from(err: repnet_core::Error) -> Self {
    use repnet_core::Error as E;
    match err {
      E::InvalidEntity(_) => Self::BadRequest(err.to_string()),
      E::NotFound(_) => Self::NotFound(err.to_string()),
      E::StoreUnavailable(_) | E::Cancelled => Self::Unavailable(err.to_string()),
      E::InvalidRecord(_) | E::SignatureInvalid(_) | E::KeyUnavailable(_) => {
        Self::Internal(err.to_string())
      }
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
      ApiError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m.clone()),
      ApiError::Internal(m) => {
        tracing::error!(error = %m, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, m.clone())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
