//! Credit transactions — the append-only half of the entitlement ledger.
//!
//! Every change to a user's credit balance is recorded as a transaction row.
//! Rows are never updated or deleted; replaying a user's transactions in
//! creation order and summing `amount` must reproduce `credit_balance`
//! exactly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a transaction exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
  Purchase,
  Consume,
  Refund,
  Bonus,
}

/// One append-only ledger row.
///
/// `reference_id` is the idempotency key: for billing-sourced rows it is the
/// external event id, unique per user when non-null. That uniqueness is what
/// enforces exactly-once application under at-least-once webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditTransaction {
  pub txn_id:  Uuid,
  pub user_id: Uuid,
  pub kind:    TransactionKind,
  /// Positive for purchase/refund/bonus, negative for consume.
  pub amount:  i64,
  /// Snapshot of `credit_balance` immediately after this row applied.
  pub balance_after: u32,
  pub reference_id:  Option<String>,
  pub created_at:    DateTime<Utc>,
}
