//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings and due dates as `YYYY-MM-DD`
//! (which sorts correctly as text). UUIDs are stored as hyphenated lowercase
//! strings, enums as their lowercase discriminants, and the ease factor as
//! its fixed-point integer.

use chrono::{DateTime, NaiveDate, Utc};
use lexi_core::{
  billing::BillingEventKind,
  credit::{CreditTransaction, TransactionKind},
  entitlement::{Entitlement, Plan},
  srs::{EaseFactor, SrsState},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> / NaiveDate ───────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::Decode(e.to_string()))
}

// ─── Plan ────────────────────────────────────────────────────────────────────

pub fn encode_plan(p: Plan) -> &'static str {
  match p {
    Plan::Free => "free",
    Plan::Plus => "plus",
  }
}

pub fn decode_plan(s: &str) -> Result<Plan> {
  match s {
    "free" => Ok(Plan::Free),
    "plus" => Ok(Plan::Plus),
    other => Err(Error::Decode(format!("unknown plan: {other:?}"))),
  }
}

// ─── TransactionKind ─────────────────────────────────────────────────────────

pub fn encode_txn_kind(k: TransactionKind) -> &'static str {
  match k {
    TransactionKind::Purchase => "purchase",
    TransactionKind::Consume => "consume",
    TransactionKind::Refund => "refund",
    TransactionKind::Bonus => "bonus",
  }
}

pub fn decode_txn_kind(s: &str) -> Result<TransactionKind> {
  match s {
    "purchase" => Ok(TransactionKind::Purchase),
    "consume" => Ok(TransactionKind::Consume),
    "refund" => Ok(TransactionKind::Refund),
    "bonus" => Ok(TransactionKind::Bonus),
    other => Err(Error::Decode(format!("unknown transaction kind: {other:?}"))),
  }
}

// ─── BillingEventKind discriminant ───────────────────────────────────────────

/// The label stored in `applied_billing_events.kind`.
pub fn event_kind_label(k: &BillingEventKind) -> &'static str {
  match k {
    BillingEventKind::SubscriptionActivated { .. } => "subscription_activated",
    BillingEventKind::SubscriptionRenewed { .. } => "subscription_renewed",
    BillingEventKind::SubscriptionCanceled { .. } => "subscription_canceled",
    BillingEventKind::CreditPurchase { .. } => "credit_purchase",
    BillingEventKind::PaymentFailed { .. } => "payment_failed",
  }
}

// ─── Error adapter ───────────────────────────────────────────────────────────

/// Lift a decode error into a `rusqlite::Error` so it can cross a
/// `tokio_rusqlite` closure boundary with `?`.
pub fn sql_conv<T>(r: Result<T>) -> rusqlite::Result<T> {
  r.map_err(|e| {
    rusqlite::Error::FromSqlConversionFailure(
      0,
      rusqlite::types::Type::Text,
      Box::new(e),
    )
  })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from an `entitlements` row.
pub struct RawEntitlement {
  pub user_id:       String,
  pub plan:          String,
  pub billing_anchor: String,
  pub period_start:  String,
  pub period_end:    String,
  pub monthly_limit: i64,
  pub monthly_used:  i64,
  pub credit_balance: i64,
  pub billing_subscription_ref: Option<String>,
  pub billing_customer_ref:     Option<String>,
  pub created_at:    String,
  pub deleted_at:    Option<String>,
}

impl RawEntitlement {
  pub fn into_entitlement(self) -> Result<Entitlement> {
    Ok(Entitlement {
      user_id:        decode_uuid(&self.user_id)?,
      plan:           decode_plan(&self.plan)?,
      billing_anchor: decode_dt(&self.billing_anchor)?,
      period_start:   decode_dt(&self.period_start)?,
      period_end:     decode_dt(&self.period_end)?,
      monthly_limit:  self.monthly_limit as u32,
      monthly_used:   self.monthly_used as u32,
      credit_balance: self.credit_balance as u32,
      billing_subscription_ref: self.billing_subscription_ref,
      billing_customer_ref:     self.billing_customer_ref,
      created_at:     decode_dt(&self.created_at)?,
      deleted_at:     self.deleted_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

/// Raw strings read directly from a `credit_transactions` row.
pub struct RawCreditTransaction {
  pub txn_id:        String,
  pub user_id:       String,
  pub kind:          String,
  pub amount:        i64,
  pub balance_after: i64,
  pub reference_id:  Option<String>,
  pub created_at:    String,
}

impl RawCreditTransaction {
  pub fn into_transaction(self) -> Result<CreditTransaction> {
    Ok(CreditTransaction {
      txn_id:        decode_uuid(&self.txn_id)?,
      user_id:       decode_uuid(&self.user_id)?,
      kind:          decode_txn_kind(&self.kind)?,
      amount:        self.amount,
      balance_after: self.balance_after as u32,
      reference_id:  self.reference_id,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `srs_states` row.
pub struct RawSrsState {
  pub ease_factor:   i64,
  pub interval_days: i64,
  pub repetitions:   i64,
  pub due_date:      String,
  pub last_reviewed_at: Option<String>,
}

impl RawSrsState {
  pub fn into_state(self) -> Result<SrsState> {
    Ok(SrsState {
      ease_factor:   EaseFactor::from_millis(self.ease_factor as i32),
      interval_days: self.interval_days as u32,
      repetitions:   self.repetitions as u32,
      due_date:      decode_date(&self.due_date)?,
      last_reviewed_at: self
        .last_reviewed_at
        .as_deref()
        .map(decode_dt)
        .transpose()?,
    })
  }
}
