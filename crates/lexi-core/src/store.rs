//! The `LedgerStore` and `ReviewStore` traits.
//!
//! Both traits are implemented by storage backends (e.g.
//! `lexi-store-sqlite`). Higher layers (`lexi-api`, `lexi-server`) depend on
//! these abstractions, not on any concrete backend. The backend is assumed
//! to provide transactional read-modify-write per user row; the traits
//! specify what must happen inside that transaction, not how it is locked.

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
  billing::{ApplyOutcome, BillingEvent},
  credit::CreditTransaction,
  entitlement::{ConsumeOutcome, Entitlement},
  srs::{Rating, SrsState},
};

// ─── Ledger ──────────────────────────────────────────────────────────────────

/// The entitlement ledger: single source of truth for "may this user consume
/// one unit of generation capacity right now", and for applying billing
/// events exactly once.
///
/// Every operation is parameterized by `user_id` and resolves its own lock
/// scope — one lock per user, never a global lock. All methods return `Send`
/// futures so the traits can be used in multi-threaded async runtimes.
pub trait LedgerStore: Send + Sync {
  type Error: std::error::Error + Into<crate::Error> + Send + Sync + 'static;

  /// Create the entitlement row at signup, with free-plan defaults.
  fn create_entitlement(
    &self,
    user_id: Uuid,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Entitlement, Self::Error>> + Send + '_;

  /// Fetch the current entitlement. `None` for unknown or soft-deleted
  /// users.
  fn entitlement(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<Entitlement>, Self::Error>> + Send + '_;

  /// Atomically decide and record one unit of consumption.
  ///
  /// Runs lazy period rollover first, then draws from quota, then from
  /// credits, else denies. Exactly one of {usage increment, consume row}
  /// per allowed call; no side effect on denial. Two concurrent calls with
  /// one unit remaining must never both be allowed.
  fn check_and_consume(
    &self,
    user_id: Uuid,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<ConsumeOutcome, Self::Error>> + Send + '_;

  /// Reset the monthly quota window if `now` is past `period_end`,
  /// anchored to the original billing anchor. Idempotent; returns whether
  /// a reset happened.
  fn rollover_if_expired(
    &self,
    user_id: Uuid,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Apply a billing event exactly once.
  ///
  /// Redelivered event ids are a no-op success; events older (by
  /// `occurred_at`) than the last applied event for the same subscription
  /// reference are recorded but do not mutate state. Unknown users are an
  /// error the webhook layer discards with a warning, never retries.
  fn apply_billing_event(
    &self,
    event: BillingEvent,
  ) -> impl Future<Output = Result<ApplyOutcome, Self::Error>> + Send + '_;

  /// All credit transactions for a user, in creation order. Summing their
  /// amounts reproduces the current balance.
  fn credit_transactions(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<CreditTransaction>, Self::Error>> + Send + '_;

  /// Soft-delete the entitlement; subsequent operations see an unknown
  /// user.
  fn delete_entitlement(
    &self,
    user_id: Uuid,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── Reviews ─────────────────────────────────────────────────────────────────

/// A persisted review result: the new schedule plus the per-user session
/// counter (UI progress only — no correctness hangs on it beyond
/// monotonicity).
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
  pub item_id: Uuid,
  pub state:   SrsState,
  pub session_counter: u64,
}

/// The review orchestrator's storage contract: sequencing of due items and
/// per-submission idempotency. The scheduling algorithm itself lives in
/// [`crate::srs::schedule`] and is invoked exactly once per accepted
/// submission.
pub trait ReviewStore: Send + Sync {
  type Error: std::error::Error + Into<crate::Error> + Send + Sync + 'static;

  /// Create a learning item with a fresh schedule (due today).
  fn create_item(
    &self,
    user_id: Uuid,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<(Uuid, SrsState), Self::Error>> + Send + '_;

  /// Current schedule for an item. `None` if the item does not exist.
  fn srs_state(
    &self,
    item_id: Uuid,
  ) -> impl Future<Output = Result<Option<SrsState>, Self::Error>> + Send + '_;

  /// All items due on or before `today`, most overdue first.
  fn due_items(
    &self,
    user_id: Uuid,
    today: NaiveDate,
  ) -> impl Future<Output = Result<Vec<(Uuid, SrsState)>, Self::Error>> + Send + '_;

  /// Apply one review submission.
  ///
  /// Rejects a `client_request_id` that was already applied for this item
  /// (a retried network call must not schedule twice); otherwise calls the
  /// scheduler exactly once and persists the result and the bumped session
  /// counter in the same transaction.
  fn submit_review(
    &self,
    item_id: Uuid,
    rating: Rating,
    client_request_id: String,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<ReviewOutcome, Self::Error>> + Send + '_;
}
