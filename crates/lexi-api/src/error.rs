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

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("invalid webhook signature")]
  BadSignature,

  /// Transient: the ledger lock wait timed out. The client may retry;
  /// nothing was committed.
  #[error("temporarily unavailable, retry")]
  Unavailable,

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Map a store-trait error through the core taxonomy.
  pub fn from_store<E: Into<lexi_core::Error>>(e: E) -> Self {
    match e.into() {
      lexi_core::Error::LockTimeout => ApiError::Unavailable,
      lexi_core::Error::UnknownUser(id) => {
        ApiError::NotFound(format!("user {id} not found"))
      }
      lexi_core::Error::UnknownItem(id) => {
        ApiError::NotFound(format!("item {id} not found"))
      }
      lexi_core::Error::InvalidRating(r) => {
        ApiError::BadRequest(format!("invalid rating: {r}"))
      }
      lexi_core::Error::DuplicateSubmission { item_id, client_request_id } => {
        ApiError::Conflict(format!(
          "review {client_request_id} already applied for item {item_id}"
        ))
      }
      other => ApiError::Store(Box::new(other)),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::BadSignature => {
        (StatusCode::UNAUTHORIZED, "invalid signature".to_string())
      }
      ApiError::Unavailable => {
        (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
      }
      ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
