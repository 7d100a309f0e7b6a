//! Error types for `lexi-core`.
//!
//! Two things a caller might expect here are deliberately absent: an
//! exhausted quota is a normal denied [`ConsumeOutcome`], and a redelivered
//! billing event is an [`ApplyOutcome::AlreadyApplied`] success. Neither is
//! an error.
//!
//! [`ConsumeOutcome`]: crate::entitlement::ConsumeOutcome
//! [`ApplyOutcome`]: crate::billing::ApplyOutcome

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  /// The per-user row lock could not be acquired within the bounded wait.
  /// Retryable; nothing was committed. Never treated as an allowance.
  #[error("timed out waiting for the user's ledger lock")]
  LockTimeout,

  /// The referenced user does not exist or has been soft-deleted. Billing
  /// events for such users are discarded by the caller, not retried.
  #[error("unknown user: {0}")]
  UnknownUser(Uuid),

  #[error("unknown learning item: {0}")]
  UnknownItem(Uuid),

  /// A rating outside 0..=3 is a caller contract violation; it is rejected
  /// before the scheduler is ever reached.
  #[error("invalid recall rating: {0} (expected 0..=3)")]
  InvalidRating(u8),

  /// The same `client_request_id` was already applied for this item.
  #[error("review {client_request_id} already applied for item {item_id}")]
  DuplicateSubmission {
    item_id:           Uuid,
    client_request_id: String,
  },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// Anything a storage backend cannot classify into the taxonomy above.
  /// The operation did not happen; no mutation was committed.
  #[error("storage failure: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
