//! Entitlement — the per-user record gating AI-generation capacity.
//!
//! An entitlement combines the plan, the current monthly quota window, and
//! the purchased credit balance. It is the unit of locking: every ledger
//! operation resolves exactly one user's row and never shares locks across
//! users.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Plan & policy ───────────────────────────────────────────────────────────

/// The subscription plan a user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
  Free,
  Plus,
}

/// Monthly generation limits per plan. Policy data, read from configuration;
/// the defaults mirror the current product tiers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlanPolicy {
  pub free_monthly_limit: u32,
  pub plus_monthly_limit: u32,
}

impl Default for PlanPolicy {
  fn default() -> Self {
    Self {
      free_monthly_limit: 20,
      plus_monthly_limit: 200,
    }
  }
}

impl PlanPolicy {
  pub fn limit_for(&self, plan: Plan) -> u32 {
    match plan {
      Plan::Free => self.free_monthly_limit,
      Plan::Plus => self.plus_monthly_limit,
    }
  }
}

// ─── Entitlement ─────────────────────────────────────────────────────────────

/// One row per user, owned by the entitlement ledger.
///
/// Invariants: `monthly_used` never decreases except for the
/// rollover-to-zero; `credit_balance` can never go negative (it is unsigned
/// by construction and only decremented when strictly positive).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entitlement {
  pub user_id:       Uuid,
  pub plan:          Plan,
  /// The original billing anchor. Quota windows are always computed from
  /// this instant so repeated rollovers cannot drift.
  pub billing_anchor: DateTime<Utc>,
  pub period_start:  DateTime<Utc>,
  pub period_end:    DateTime<Utc>,
  pub monthly_limit: u32,
  pub monthly_used:  u32,
  /// Purchased credits; survive period rollovers.
  pub credit_balance: u32,
  pub billing_subscription_ref: Option<String>,
  pub billing_customer_ref:     Option<String>,
  pub created_at:    DateTime<Utc>,
  /// Soft-delete marker; a deleted entitlement behaves as an unknown user.
  pub deleted_at:    Option<DateTime<Utc>>,
}

impl Entitlement {
  /// Signup defaults: free plan, quota window anchored at `now`, zero usage,
  /// zero credits.
  pub fn new_free(user_id: Uuid, policy: &PlanPolicy, now: DateTime<Utc>) -> Self {
    let (period_start, period_end) = window_containing(now, now);
    Self {
      user_id,
      plan: Plan::Free,
      billing_anchor: now,
      period_start,
      period_end,
      monthly_limit: policy.limit_for(Plan::Free),
      monthly_used: 0,
      credit_balance: 0,
      billing_subscription_ref: None,
      billing_customer_ref: None,
      created_at: now,
      deleted_at: None,
    }
  }

  pub fn period_expired(&self, now: DateTime<Utc>) -> bool { now > self.period_end }

  /// Advance to the quota window containing `now` and reset usage.
  ///
  /// Idempotent: a second call for the same window finds `period_end`
  /// unchanged and does nothing. Returns whether a reset happened.
  pub fn rollover_if_expired(&mut self, now: DateTime<Utc>) -> bool {
    if !self.period_expired(now) {
      return false;
    }
    let (start, end) = window_containing(self.billing_anchor, now);
    self.period_start = start;
    self.period_end = end;
    self.monthly_used = 0;
    true
  }
}

/// The monthly window `[anchor + k months, anchor + (k+1) months)` that
/// contains `now`.
///
/// Each window boundary is computed directly from the anchor (day-of-month
/// clamped only where the target month is short), so an anchor of Jan 31
/// yields Feb 28 then Mar 31 — not the drifting Mar 28 that cumulative
/// month-stepping would produce.
pub fn window_containing(
  anchor: DateTime<Utc>,
  now: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
  let mut k: u32 = 0;
  loop {
    let start = anchor
      .checked_add_months(Months::new(k))
      .unwrap_or(anchor);
    let end = anchor
      .checked_add_months(Months::new(k + 1))
      .unwrap_or(start);
    if end > now || k > 12_000 {
      return (start, end);
    }
    k += 1;
  }
}

// ─── Consumption outcome ─────────────────────────────────────────────────────

/// Where a successful consumption was drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsumeSource {
  Quota,
  Credit,
  None,
}

/// Result of a `check_and_consume` call. A denial is a normal outcome, not
/// an error — the caller owns the user-facing messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeOutcome {
  pub allowed: bool,
  pub source:  ConsumeSource,
}

impl ConsumeOutcome {
  pub fn quota() -> Self {
    Self { allowed: true, source: ConsumeSource::Quota }
  }

  pub fn credit() -> Self {
    Self { allowed: true, source: ConsumeSource::Credit }
  }

  pub fn denied() -> Self {
    Self { allowed: false, source: ConsumeSource::None }
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
