//! Error type for `lexi-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] lexi_core::Error),

  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  /// The busy timeout elapsed before the write lock could be taken.
  /// Retryable; nothing was committed. A denied consumption is never
  /// reported this way, and a timeout is never reported as an allowance.
  #[error("timed out waiting for the database write lock")]
  LockTimeout,

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  /// A stored value could not be decoded back into its domain type.
  #[error("column decode error: {0}")]
  Decode(String),

  /// The user does not exist or has been soft-deleted.
  #[error("unknown user: {0}")]
  UnknownUser(uuid::Uuid),

  #[error("unknown learning item: {0}")]
  UnknownItem(uuid::Uuid),

  /// Applying the purchase would overflow the credit balance. The event is
  /// not recorded as applied; nothing is committed.
  #[error("credit purchase overflows the balance for user {0}")]
  BalanceOverflow(uuid::Uuid),

  /// The same `client_request_id` was already applied for this item.
  #[error("review {client_request_id} already applied for item {item_id}")]
  DuplicateSubmission {
    item_id:           uuid::Uuid,
    client_request_id: String,
  },
}

/// Busy/locked failures surface as [`Error::LockTimeout`] so callers can
/// retry with backoff; everything else is a database error.
impl From<tokio_rusqlite::Error> for Error {
  fn from(e: tokio_rusqlite::Error) -> Self {
    if let tokio_rusqlite::Error::Rusqlite(inner) = &e
      && matches!(
        inner.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseBusy)
          | Some(rusqlite::ErrorCode::DatabaseLocked)
      )
    {
      return Error::LockTimeout;
    }
    Error::Database(e)
  }
}

/// Collapse into the core taxonomy for callers that only know the store
/// traits. Unclassifiable failures become opaque storage errors.
impl From<Error> for lexi_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(c) => c,
      Error::LockTimeout => lexi_core::Error::LockTimeout,
      Error::UnknownUser(u) => lexi_core::Error::UnknownUser(u),
      Error::UnknownItem(i) => lexi_core::Error::UnknownItem(i),
      Error::DuplicateSubmission { item_id, client_request_id } => {
        lexi_core::Error::DuplicateSubmission { item_id, client_request_id }
      }
      other => lexi_core::Error::Storage(Box::new(other)),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
