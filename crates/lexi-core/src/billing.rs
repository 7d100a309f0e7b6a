//! Billing events delivered by the payment provider's webhook.
//!
//! Delivery is at-least-once and not necessarily in order. The ledger
//! applies each event id at most once, and orders events for the same
//! subscription reference by `occurred_at` rather than by arrival.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A signed event from the payment provider's webhook, after signature
/// verification and JSON parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingEvent {
  /// Externally-assigned, globally unique event id — the idempotency key.
  pub id:          String,
  pub user_id:     Uuid,
  pub occurred_at: DateTime<Utc>,
  #[serde(flatten)]
  pub kind:        BillingEventKind,
}

/// The kind-specific payload, dispatched by exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BillingEventKind {
  SubscriptionActivated {
    subscription_ref: String,
    customer_ref:     String,
    period_start:     DateTime<Utc>,
    period_end:       DateTime<Utc>,
  },
  SubscriptionRenewed {
    subscription_ref: String,
    period_start:     DateTime<Utc>,
    period_end:       DateTime<Utc>,
  },
  SubscriptionCanceled {
    subscription_ref: String,
  },
  CreditPurchase {
    amount: u32,
  },
  /// Mutates nothing, but is still recorded as applied so redelivery stays
  /// idempotent. User-facing notification happens elsewhere.
  PaymentFailed {
    subscription_ref: String,
  },
}

impl BillingEvent {
  /// The subscription this event belongs to, if any. Events that carry a
  /// reference participate in the `occurred_at` ordering rule; credit
  /// purchases do not.
  pub fn subscription_ref(&self) -> Option<&str> {
    match &self.kind {
      BillingEventKind::SubscriptionActivated { subscription_ref, .. }
      | BillingEventKind::SubscriptionRenewed { subscription_ref, .. }
      | BillingEventKind::SubscriptionCanceled { subscription_ref }
      | BillingEventKind::PaymentFailed { subscription_ref } => {
        Some(subscription_ref)
      }
      BillingEventKind::CreditPurchase { .. } => None,
    }
  }
}

/// How the ledger disposed of an event. All three variants are success from
/// the webhook's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
  /// First delivery; the ledger was mutated.
  Applied,
  /// Redelivery of an already-applied event id; nothing happened.
  AlreadyApplied,
  /// Out-of-order delivery: an event for this subscription with a newer
  /// `occurred_at` was already applied. Recorded, state untouched.
  Stale,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn event_kind_json_is_tagged() {
    let json = serde_json::json!({
      "id": "evt_42",
      "user_id": "8f7f2f44-6a3c-4f9e-93ad-1f8f9a3e2b11",
      "occurred_at": "2025-06-01T00:00:00Z",
      "kind": "credit_purchase",
      "amount": 50,
    });
    let event: BillingEvent = serde_json::from_value(json).unwrap();
    assert!(matches!(
      event.kind,
      BillingEventKind::CreditPurchase { amount: 50 }
    ));
    assert!(event.subscription_ref().is_none());
  }

  #[test]
  fn subscription_events_expose_their_ref() {
    let json = serde_json::json!({
      "id": "evt_43",
      "user_id": "8f7f2f44-6a3c-4f9e-93ad-1f8f9a3e2b11",
      "occurred_at": "2025-06-01T00:00:00Z",
      "kind": "subscription_canceled",
      "subscription_ref": "sub_9",
    });
    let event: BillingEvent = serde_json::from_value(json).unwrap();
    assert_eq!(event.subscription_ref(), Some("sub_9"));
  }
}
