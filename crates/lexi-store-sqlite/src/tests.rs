//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{DateTime, TimeZone, Utc};
use lexi_core::{
  billing::{ApplyOutcome, BillingEvent, BillingEventKind},
  entitlement::{ConsumeSource, Plan, PlanPolicy},
  srs::{EaseFactor, Rating},
  store::{LedgerStore, ReviewStore},
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory(PlanPolicy::default())
    .await
    .expect("in-memory store")
}

async fn store_with_limits(free: u32, plus: u32) -> SqliteStore {
  SqliteStore::open_in_memory(PlanPolicy {
    free_monthly_limit: free,
    plus_monthly_limit: plus,
  })
  .await
  .expect("in-memory store")
}

fn at(y: i32, mo: u32, d: u32) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(y, mo, d, 12, 0, 0).unwrap()
}

fn credit_purchase(user_id: Uuid, id: &str, amount: u32) -> BillingEvent {
  BillingEvent {
    id: id.into(),
    user_id,
    occurred_at: at(2025, 6, 1),
    kind: BillingEventKind::CreditPurchase { amount },
  }
}

fn activated(user_id: Uuid, id: &str, occurred_at: DateTime<Utc>) -> BillingEvent {
  BillingEvent {
    id: id.into(),
    user_id,
    occurred_at,
    kind: BillingEventKind::SubscriptionActivated {
      subscription_ref: "sub_1".into(),
      customer_ref:     "cus_1".into(),
      period_start:     occurred_at,
      period_end:       occurred_at + chrono::Months::new(1),
    },
  }
}

fn canceled(user_id: Uuid, id: &str, occurred_at: DateTime<Utc>) -> BillingEvent {
  BillingEvent {
    id: id.into(),
    user_id,
    occurred_at,
    kind: BillingEventKind::SubscriptionCanceled {
      subscription_ref: "sub_1".into(),
    },
  }
}

// ─── Consumption ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn quota_consumed_before_credits() {
  let s = store_with_limits(2, 200).await;
  let user = Uuid::new_v4();
  s.create_entitlement(user, at(2025, 6, 1)).await.unwrap();
  s.apply_billing_event(credit_purchase(user, "evt_seed", 1))
    .await
    .unwrap();

  let now = at(2025, 6, 2);
  let first = s.check_and_consume(user, now).await.unwrap();
  let second = s.check_and_consume(user, now).await.unwrap();
  let third = s.check_and_consume(user, now).await.unwrap();
  let fourth = s.check_and_consume(user, now).await.unwrap();

  assert_eq!(first.source, ConsumeSource::Quota);
  assert_eq!(second.source, ConsumeSource::Quota);
  assert_eq!(third.source, ConsumeSource::Credit);
  assert!(!fourth.allowed);
  assert_eq!(fourth.source, ConsumeSource::None);
}

#[tokio::test]
async fn exhausted_user_is_denied_without_side_effect() {
  // monthly_limit=20, monthly_used=20, credit_balance=0 -> {false, none}.
  let s = store().await;
  let user = Uuid::new_v4();
  s.create_entitlement(user, at(2025, 6, 1)).await.unwrap();

  let now = at(2025, 6, 2);
  for _ in 0..20 {
    assert!(s.check_and_consume(user, now).await.unwrap().allowed);
  }

  let denied = s.check_and_consume(user, now).await.unwrap();
  assert!(!denied.allowed);
  assert_eq!(denied.source, ConsumeSource::None);

  // Denials leave no trace in the ledger.
  assert!(s.credit_transactions(user).await.unwrap().is_empty());
  let ent = s.entitlement(user).await.unwrap().unwrap();
  assert_eq!(ent.monthly_used, 20);
}

#[tokio::test]
async fn exactly_quota_plus_credits_allowed_under_concurrency() {
  // 3 quota + 2 credits: exactly 5 of 10 concurrent calls may succeed.
  let s = store_with_limits(3, 200).await;
  let user = Uuid::new_v4();
  s.create_entitlement(user, at(2025, 6, 1)).await.unwrap();
  s.apply_billing_event(credit_purchase(user, "evt_c", 2))
    .await
    .unwrap();

  let now = at(2025, 6, 2);
  let mut tasks = tokio::task::JoinSet::new();
  for _ in 0..10 {
    let s = s.clone();
    tasks.spawn(async move { s.check_and_consume(user, now).await.unwrap() });
  }

  let mut allowed = 0;
  while let Some(outcome) = tasks.join_next().await {
    if outcome.unwrap().allowed {
      allowed += 1;
    }
  }
  assert_eq!(allowed, 5);

  let ent = s.entitlement(user).await.unwrap().unwrap();
  assert_eq!(ent.monthly_used, 3);
  assert_eq!(ent.credit_balance, 0);
}

#[tokio::test]
async fn consume_unknown_user_errors() {
  let s = store().await;
  let err = s.check_and_consume(Uuid::new_v4(), at(2025, 6, 1)).await;
  assert!(matches!(err, Err(Error::UnknownUser(_))));
}

#[tokio::test]
async fn deleted_user_behaves_as_unknown() {
  let s = store().await;
  let user = Uuid::new_v4();
  s.create_entitlement(user, at(2025, 6, 1)).await.unwrap();
  s.delete_entitlement(user, at(2025, 6, 2)).await.unwrap();

  let err = s.check_and_consume(user, at(2025, 6, 3)).await;
  assert!(matches!(err, Err(Error::UnknownUser(_))));

  // Deleting twice is also unknown.
  let err = s.delete_entitlement(user, at(2025, 6, 4)).await;
  assert!(matches!(err, Err(Error::UnknownUser(_))));
}

#[tokio::test]
async fn deleted_user_cannot_create_or_review_items() {
  let s = store().await;
  let user = Uuid::new_v4();
  s.create_entitlement(user, at(2025, 6, 1)).await.unwrap();
  let (item_id, _) = s.create_item(user, at(2025, 6, 1)).await.unwrap();
  s.delete_entitlement(user, at(2025, 6, 2)).await.unwrap();

  let create = s.create_item(user, at(2025, 6, 3)).await;
  assert!(matches!(create, Err(Error::UnknownUser(_))));

  let due = s.due_items(user, at(2025, 6, 3).date_naive()).await;
  assert!(matches!(due, Err(Error::UnknownUser(_))));

  // The surviving item is no longer reviewable either.
  let submit = s
    .submit_review(item_id, Rating::Good, "req".into(), at(2025, 6, 3))
    .await;
  assert!(matches!(submit, Err(Error::UnknownUser(_))));
}

#[tokio::test]
async fn create_item_for_unknown_user_errors() {
  let s = store().await;
  let err = s.create_item(Uuid::new_v4(), at(2025, 6, 1)).await;
  assert!(matches!(err, Err(Error::UnknownUser(_))));
}

// ─── Rollover ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rollover_resets_usage_and_is_idempotent() {
  let s = store_with_limits(2, 200).await;
  let user = Uuid::new_v4();
  s.create_entitlement(user, at(2025, 6, 10)).await.unwrap();

  let june = at(2025, 6, 11);
  assert!(s.check_and_consume(user, june).await.unwrap().allowed);
  assert!(s.check_and_consume(user, june).await.unwrap().allowed);
  assert!(!s.check_and_consume(user, june).await.unwrap().allowed);

  let july = at(2025, 7, 15);
  assert!(s.rollover_if_expired(user, july).await.unwrap());
  assert!(!s.rollover_if_expired(user, july).await.unwrap());

  let ent = s.entitlement(user).await.unwrap().unwrap();
  assert_eq!(ent.monthly_used, 0);
  // Window stays anchored to the signup day, not to `july`.
  assert_eq!(ent.period_start, at(2025, 7, 10));
  assert_eq!(ent.period_end, at(2025, 8, 10));
}

#[tokio::test]
async fn consume_rolls_over_lazily() {
  let s = store_with_limits(1, 200).await;
  let user = Uuid::new_v4();
  s.create_entitlement(user, at(2025, 6, 1)).await.unwrap();

  assert!(s.check_and_consume(user, at(2025, 6, 2)).await.unwrap().allowed);
  assert!(!s.check_and_consume(user, at(2025, 6, 3)).await.unwrap().allowed);

  // Next month: quota is fresh without any explicit rollover call.
  let next = s.check_and_consume(user, at(2025, 7, 2)).await.unwrap();
  assert!(next.allowed);
  assert_eq!(next.source, ConsumeSource::Quota);
}

// ─── Billing events ──────────────────────────────────────────────────────────

#[tokio::test]
async fn credit_purchase_then_consume_then_replay() {
  // Scenario: exhausted user buys 50 credits; evt replay leaves 49.
  let s = store_with_limits(0, 200).await;
  let user = Uuid::new_v4();
  s.create_entitlement(user, at(2025, 6, 1)).await.unwrap();

  let outcome = s
    .apply_billing_event(credit_purchase(user, "evt1", 50))
    .await
    .unwrap();
  assert_eq!(outcome, ApplyOutcome::Applied);
  assert_eq!(s.entitlement(user).await.unwrap().unwrap().credit_balance, 50);

  let consumed = s.check_and_consume(user, at(2025, 6, 2)).await.unwrap();
  assert!(consumed.allowed);
  assert_eq!(consumed.source, ConsumeSource::Credit);
  assert_eq!(s.entitlement(user).await.unwrap().unwrap().credit_balance, 49);

  let replay = s
    .apply_billing_event(credit_purchase(user, "evt1", 50))
    .await
    .unwrap();
  assert_eq!(replay, ApplyOutcome::AlreadyApplied);
  assert_eq!(s.entitlement(user).await.unwrap().unwrap().credit_balance, 49);
}

#[tokio::test]
async fn ledger_replays_to_current_balance() {
  let s = store_with_limits(0, 200).await;
  let user = Uuid::new_v4();
  s.create_entitlement(user, at(2025, 6, 1)).await.unwrap();

  s.apply_billing_event(credit_purchase(user, "evt_a", 10))
    .await
    .unwrap();
  for _ in 0..4 {
    s.check_and_consume(user, at(2025, 6, 2)).await.unwrap();
  }
  s.apply_billing_event(credit_purchase(user, "evt_b", 5))
    .await
    .unwrap();

  let txns = s.credit_transactions(user).await.unwrap();
  let ent = s.entitlement(user).await.unwrap().unwrap();

  let replayed: i64 = txns.iter().map(|t| t.amount).sum();
  assert_eq!(replayed, i64::from(ent.credit_balance));
  assert_eq!(ent.credit_balance, 11);

  // Each row's balance snapshot is consistent with the running sum.
  let mut running = 0_i64;
  for txn in &txns {
    running += txn.amount;
    assert_eq!(running, i64::from(txn.balance_after));
  }
}

#[tokio::test]
async fn activation_upgrades_plan_and_resets_usage() {
  let s = store().await;
  let user = Uuid::new_v4();
  s.create_entitlement(user, at(2025, 6, 1)).await.unwrap();
  for _ in 0..5 {
    s.check_and_consume(user, at(2025, 6, 2)).await.unwrap();
  }

  let outcome = s
    .apply_billing_event(activated(user, "evt_act", at(2025, 6, 3)))
    .await
    .unwrap();
  assert_eq!(outcome, ApplyOutcome::Applied);

  let ent = s.entitlement(user).await.unwrap().unwrap();
  assert_eq!(ent.plan, Plan::Plus);
  assert_eq!(ent.monthly_limit, 200);
  assert_eq!(ent.monthly_used, 0);
  assert_eq!(ent.billing_subscription_ref.as_deref(), Some("sub_1"));
  assert_eq!(ent.period_start, at(2025, 6, 3));
}

#[tokio::test]
async fn applying_same_event_twice_is_identical_to_once() {
  let s = store().await;
  let user = Uuid::new_v4();
  s.create_entitlement(user, at(2025, 6, 1)).await.unwrap();

  s.apply_billing_event(activated(user, "evt_act", at(2025, 6, 3)))
    .await
    .unwrap();
  let before = s.entitlement(user).await.unwrap().unwrap();

  let replay = s
    .apply_billing_event(activated(user, "evt_act", at(2025, 6, 3)))
    .await
    .unwrap();
  assert_eq!(replay, ApplyOutcome::AlreadyApplied);

  let after = s.entitlement(user).await.unwrap().unwrap();
  assert_eq!(before.monthly_used, after.monthly_used);
  assert_eq!(before.plan, after.plan);
  assert_eq!(before.period_end, after.period_end);
}

#[tokio::test]
async fn cancellation_downgrades_limit_but_keeps_credits() {
  let s = store().await;
  let user = Uuid::new_v4();
  s.create_entitlement(user, at(2025, 6, 1)).await.unwrap();
  s.apply_billing_event(activated(user, "evt_act", at(2025, 6, 3)))
    .await
    .unwrap();
  s.apply_billing_event(credit_purchase(user, "evt_c", 7))
    .await
    .unwrap();

  let outcome = s
    .apply_billing_event(canceled(user, "evt_can", at(2025, 6, 20)))
    .await
    .unwrap();
  assert_eq!(outcome, ApplyOutcome::Applied);

  let ent = s.entitlement(user).await.unwrap().unwrap();
  assert_eq!(ent.plan, Plan::Free);
  assert_eq!(ent.monthly_limit, 20);
  assert_eq!(ent.credit_balance, 7);
  assert!(ent.billing_subscription_ref.is_none());
  assert!(ent.billing_customer_ref.is_none());
}

#[tokio::test]
async fn credit_purchase_overflow_is_rejected() {
  let s = store_with_limits(0, 200).await;
  let user = Uuid::new_v4();
  s.create_entitlement(user, at(2025, 6, 1)).await.unwrap();
  s.apply_billing_event(credit_purchase(user, "evt_max", u32::MAX))
    .await
    .unwrap();

  let err = s
    .apply_billing_event(credit_purchase(user, "evt_one", 1))
    .await;
  assert!(matches!(err, Err(Error::BalanceOverflow(_))));

  // Nothing committed: balance unchanged, event not recorded as applied.
  let ent = s.entitlement(user).await.unwrap().unwrap();
  assert_eq!(ent.credit_balance, u32::MAX);
  assert_eq!(s.credit_transactions(user).await.unwrap().len(), 1);
}

#[tokio::test]
async fn out_of_order_cancel_is_resolved_by_occurred_at() {
  // The cancel (occurred later) arrives first; the activation (occurred
  // earlier) must then be a stale no-op. The ledger keeps the canceled
  // state because it carries the newest occurred_at, not the newest
  // arrival.
  let s = store().await;
  let user = Uuid::new_v4();
  s.create_entitlement(user, at(2025, 6, 1)).await.unwrap();

  let cancel = s
    .apply_billing_event(canceled(user, "evt_can", at(2025, 6, 20)))
    .await
    .unwrap();
  assert_eq!(cancel, ApplyOutcome::Applied);

  let late_activation = s
    .apply_billing_event(activated(user, "evt_act", at(2025, 6, 3)))
    .await
    .unwrap();
  assert_eq!(late_activation, ApplyOutcome::Stale);

  let ent = s.entitlement(user).await.unwrap().unwrap();
  assert_eq!(ent.plan, Plan::Free);

  // The stale event is still recorded: replaying it is a duplicate.
  let replay = s
    .apply_billing_event(activated(user, "evt_act", at(2025, 6, 3)))
    .await
    .unwrap();
  assert_eq!(replay, ApplyOutcome::AlreadyApplied);
}

#[tokio::test]
async fn payment_failed_mutates_nothing_but_is_recorded() {
  let s = store().await;
  let user = Uuid::new_v4();
  s.create_entitlement(user, at(2025, 6, 1)).await.unwrap();
  s.apply_billing_event(activated(user, "evt_act", at(2025, 6, 3)))
    .await
    .unwrap();
  let before = s.entitlement(user).await.unwrap().unwrap();

  let failed = BillingEvent {
    id: "evt_fail".into(),
    user_id: user,
    occurred_at: at(2025, 6, 10),
    kind: BillingEventKind::PaymentFailed {
      subscription_ref: "sub_1".into(),
    },
  };
  assert_eq!(
    s.apply_billing_event(failed.clone()).await.unwrap(),
    ApplyOutcome::Applied
  );
  assert_eq!(
    s.apply_billing_event(failed).await.unwrap(),
    ApplyOutcome::AlreadyApplied
  );

  let after = s.entitlement(user).await.unwrap().unwrap();
  assert_eq!(before.plan, after.plan);
  assert_eq!(before.monthly_used, after.monthly_used);
  assert_eq!(before.credit_balance, after.credit_balance);

  // A payment failure never shadows a later-arriving subscription event
  // with an older occurred_at than the failure.
  let renewal = BillingEvent {
    id: "evt_renew".into(),
    user_id: user,
    occurred_at: at(2025, 6, 5),
    kind: BillingEventKind::SubscriptionRenewed {
      subscription_ref: "sub_1".into(),
      period_start:     at(2025, 6, 5),
      period_end:       at(2025, 7, 5),
    },
  };
  assert_eq!(
    s.apply_billing_event(renewal).await.unwrap(),
    ApplyOutcome::Applied
  );
}

#[tokio::test]
async fn event_for_unknown_user_errors() {
  let s = store().await;
  let err = s
    .apply_billing_event(credit_purchase(Uuid::new_v4(), "evt_x", 5))
    .await;
  assert!(matches!(err, Err(Error::UnknownUser(_))));
}

// ─── Reviews ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn new_item_is_due_immediately() {
  let s = store().await;
  let user = Uuid::new_v4();
  s.create_entitlement(user, at(2025, 6, 1)).await.unwrap();

  let (item_id, state) = s.create_item(user, at(2025, 6, 1)).await.unwrap();
  assert_eq!(state.repetitions, 0);
  assert_eq!(state.interval_days, 0);
  assert!(state.last_reviewed_at.is_none());

  let due = s.due_items(user, at(2025, 6, 1).date_naive()).await.unwrap();
  assert_eq!(due.len(), 1);
  assert_eq!(due[0].0, item_id);
}

#[tokio::test]
async fn submit_review_persists_schedule() {
  let s = store().await;
  let user = Uuid::new_v4();
  s.create_entitlement(user, at(2025, 6, 1)).await.unwrap();
  let (item_id, _) = s.create_item(user, at(2025, 6, 1)).await.unwrap();

  let now = at(2025, 6, 1);
  let outcome = s
    .submit_review(item_id, Rating::Good, "req_1".into(), now)
    .await
    .unwrap();

  assert_eq!(outcome.state.repetitions, 1);
  assert_eq!(outcome.state.interval_days, 1);
  assert_eq!(outcome.session_counter, 1);

  let stored = s.srs_state(item_id).await.unwrap().unwrap();
  assert_eq!(stored, outcome.state);

  // Scheduled out a day: no longer due today.
  let due = s.due_items(user, now.date_naive()).await.unwrap();
  assert!(due.is_empty());
}

#[tokio::test]
async fn duplicate_client_request_is_rejected_and_schedules_once() {
  let s = store().await;
  let user = Uuid::new_v4();
  s.create_entitlement(user, at(2025, 6, 1)).await.unwrap();
  let (item_id, _) = s.create_item(user, at(2025, 6, 1)).await.unwrap();

  let now = at(2025, 6, 1);
  let first = s
    .submit_review(item_id, Rating::Good, "req_1".into(), now)
    .await
    .unwrap();

  let retry = s
    .submit_review(item_id, Rating::Good, "req_1".into(), at(2025, 6, 2))
    .await;
  assert!(matches!(retry, Err(Error::DuplicateSubmission { .. })));

  // The retry neither re-scheduled nor bumped the counter.
  let stored = s.srs_state(item_id).await.unwrap().unwrap();
  assert_eq!(stored, first.state);

  let next = s
    .submit_review(item_id, Rating::Good, "req_2".into(), at(2025, 6, 2))
    .await
    .unwrap();
  assert_eq!(next.session_counter, 2);
}

#[tokio::test]
async fn session_counter_is_monotone_across_items() {
  let s = store().await;
  let user = Uuid::new_v4();
  s.create_entitlement(user, at(2025, 6, 1)).await.unwrap();
  let (a, _) = s.create_item(user, at(2025, 6, 1)).await.unwrap();
  let (b, _) = s.create_item(user, at(2025, 6, 1)).await.unwrap();

  let now = at(2025, 6, 1);
  let mut counters = Vec::new();
  for (item, req) in [(a, "r1"), (b, "r2"), (a, "r3")] {
    let outcome = s
      .submit_review(item, Rating::Good, req.into(), now)
      .await
      .unwrap();
    counters.push(outcome.session_counter);
  }
  assert_eq!(counters, vec![1, 2, 3]);
}

#[tokio::test]
async fn submit_review_unknown_item_errors() {
  let s = store().await;
  let err = s
    .submit_review(Uuid::new_v4(), Rating::Good, "req".into(), at(2025, 6, 1))
    .await;
  assert!(matches!(err, Err(Error::UnknownItem(_))));
}

#[tokio::test]
async fn repeated_lapses_keep_ease_at_floor() {
  let s = store().await;
  let user = Uuid::new_v4();
  s.create_entitlement(user, at(2025, 6, 1)).await.unwrap();
  let (item_id, _) = s.create_item(user, at(2025, 6, 1)).await.unwrap();

  for n in 0..10 {
    s.submit_review(
      item_id,
      Rating::Again,
      format!("req_{n}"),
      at(2025, 6, 1) + chrono::Duration::days(n),
    )
    .await
    .unwrap();
  }

  let state = s.srs_state(item_id).await.unwrap().unwrap();
  assert_eq!(state.ease_factor, EaseFactor::FLOOR);
  assert_eq!(state.repetitions, 0);
  assert_eq!(state.interval_days, 1);
}

#[tokio::test]
async fn due_items_ordered_most_overdue_first() {
  let s = store().await;
  let user = Uuid::new_v4();
  s.create_entitlement(user, at(2025, 6, 1)).await.unwrap();

  let (early, _) = s.create_item(user, at(2025, 6, 1)).await.unwrap();
  let (late, _) = s.create_item(user, at(2025, 6, 5)).await.unwrap();

  let due = s.due_items(user, at(2025, 6, 6).date_naive()).await.unwrap();
  assert_eq!(due.len(), 2);
  assert_eq!(due[0].0, early);
  assert_eq!(due[1].0, late);
}
