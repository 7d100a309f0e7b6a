//! [`SqliteStore`] — the SQLite implementation of [`LedgerStore`] and
//! [`ReviewStore`].
//!
//! Every mutating operation runs inside one immediate transaction on the
//! store's single connection. That transaction is the per-user lock scope
//! the ledger contract requires: read-decide-write is atomic, and a failure
//! anywhere rolls the whole operation back, so partial application (quota
//! bumped but no transaction row, schedule written but no submission row)
//! is never observable.

use std::{path::Path, time::Duration};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use lexi_core::{
  billing::{ApplyOutcome, BillingEvent, BillingEventKind},
  credit::{CreditTransaction, TransactionKind},
  entitlement::{ConsumeOutcome, Entitlement, PlanPolicy},
  srs::{self, Rating, SrsState},
  store::{LedgerStore, ReviewOutcome, ReviewStore},
};

use crate::{
  Error, Result,
  encode::{
    RawCreditTransaction, RawEntitlement, RawSrsState, decode_dt, encode_date,
    encode_dt, encode_plan, encode_txn_kind, encode_uuid, event_kind_label,
    sql_conv,
  },
  schema::SCHEMA,
};

/// Bounded wait for the SQLite write lock. On expiry the operation fails
/// with [`Error::LockTimeout`] and nothing is committed.
const LOCK_WAIT: Duration = Duration::from_secs(5);

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Lexi ledger and review store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:   tokio_rusqlite::Connection,
  policy: PlanPolicy,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>, policy: PlanPolicy) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, policy };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory(policy: PlanPolicy) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, policy };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.busy_timeout(LOCK_WAIT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── In-transaction helpers ──────────────────────────────────────────────────

/// Read and decode a live (non-deleted) entitlement inside a transaction.
fn read_entitlement(
  tx: &rusqlite::Transaction<'_>,
  user_id: &str,
) -> rusqlite::Result<Option<Entitlement>> {
  let raw = tx
    .query_row(
      "SELECT user_id, plan, billing_anchor, period_start, period_end,
              monthly_limit, monthly_used, credit_balance,
              billing_subscription_ref, billing_customer_ref,
              created_at, deleted_at
       FROM entitlements
       WHERE user_id = ?1 AND deleted_at IS NULL",
      rusqlite::params![user_id],
      |row| {
        Ok(RawEntitlement {
          user_id:        row.get(0)?,
          plan:           row.get(1)?,
          billing_anchor: row.get(2)?,
          period_start:   row.get(3)?,
          period_end:     row.get(4)?,
          monthly_limit:  row.get(5)?,
          monthly_used:   row.get(6)?,
          credit_balance: row.get(7)?,
          billing_subscription_ref: row.get(8)?,
          billing_customer_ref:     row.get(9)?,
          created_at:     row.get(10)?,
          deleted_at:     row.get(11)?,
        })
      },
    )
    .optional()?;

  raw.map(|r| sql_conv(r.into_entitlement())).transpose()
}

/// Persist the quota window and usage fields after a rollover.
fn write_period(
  tx: &rusqlite::Transaction<'_>,
  ent: &Entitlement,
) -> rusqlite::Result<()> {
  tx.execute(
    "UPDATE entitlements
     SET period_start = ?2, period_end = ?3, monthly_used = ?4
     WHERE user_id = ?1",
    rusqlite::params![
      encode_uuid(ent.user_id),
      encode_dt(ent.period_start),
      encode_dt(ent.period_end),
      ent.monthly_used,
    ],
  )?;
  Ok(())
}

/// Append a credit transaction row and write the new balance snapshot. The
/// `UNIQUE (user_id, reference_id)` constraint is the idempotency guard for
/// billing-sourced rows.
fn append_credit_txn(
  tx: &rusqlite::Transaction<'_>,
  user_id: Uuid,
  kind: TransactionKind,
  amount: i64,
  balance_after: u32,
  reference_id: Option<&str>,
  at: DateTime<Utc>,
) -> rusqlite::Result<()> {
  tx.execute(
    "INSERT INTO credit_transactions
       (txn_id, user_id, kind, amount, balance_after, reference_id, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    rusqlite::params![
      encode_uuid(Uuid::new_v4()),
      encode_uuid(user_id),
      encode_txn_kind(kind),
      amount,
      balance_after,
      reference_id,
      encode_dt(at),
    ],
  )?;
  tx.execute(
    "UPDATE entitlements SET credit_balance = ?2 WHERE user_id = ?1",
    rusqlite::params![encode_uuid(user_id), balance_after],
  )?;
  Ok(())
}

/// The newest `occurred_at` applied for a subscription reference, ignoring
/// stale records and `payment_failed` (which never produces state and must
/// not shadow an out-of-order activation).
fn subscription_watermark(
  tx: &rusqlite::Transaction<'_>,
  user_id: &str,
  subscription_ref: &str,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
  let mut stmt = tx.prepare(
    "SELECT occurred_at FROM applied_billing_events
     WHERE user_id = ?1 AND subscription_ref = ?2
       AND stale = 0 AND kind != 'payment_failed'",
  )?;
  let stamps = stmt
    .query_map(rusqlite::params![user_id, subscription_ref], |row| {
      row.get::<_, String>(0)
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut newest: Option<DateTime<Utc>> = None;
  for s in stamps {
    let dt = sql_conv(decode_dt(&s))?;
    if newest.is_none_or(|n| dt > n) {
      newest = Some(dt);
    }
  }
  Ok(newest)
}

fn record_applied_event(
  tx: &rusqlite::Transaction<'_>,
  event: &BillingEvent,
  stale: bool,
  now: DateTime<Utc>,
) -> rusqlite::Result<()> {
  tx.execute(
    "INSERT INTO applied_billing_events
       (event_id, user_id, kind, subscription_ref, occurred_at, stale, applied_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    rusqlite::params![
      event.id,
      encode_uuid(event.user_id),
      event_kind_label(&event.kind),
      event.subscription_ref(),
      encode_dt(event.occurred_at),
      stale,
      encode_dt(now),
    ],
  )?;
  Ok(())
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
  e.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation)
}

// Closure-side results for operations whose domain errors are decided inside
// the transaction but raised outside it.
enum ConsumeRow {
  Unknown,
  Outcome(ConsumeOutcome),
}

enum EventRow {
  Unknown,
  Overflow,
  Outcome(ApplyOutcome),
}

enum SubmitRow {
  UnknownItem,
  UnknownUser(Uuid),
  Duplicate,
  Done(SrsState, u64),
}

// ─── LedgerStore impl ────────────────────────────────────────────────────────

impl LedgerStore for SqliteStore {
  type Error = Error;

  async fn create_entitlement(
    &self,
    user_id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<Entitlement> {
    let ent = Entitlement::new_free(user_id, &self.policy, now);
    let row = ent.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO entitlements
             (user_id, plan, billing_anchor, period_start, period_end,
              monthly_limit, monthly_used, credit_balance,
              billing_subscription_ref, billing_customer_ref,
              created_at, deleted_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, NULL)",
          rusqlite::params![
            encode_uuid(row.user_id),
            encode_plan(row.plan),
            encode_dt(row.billing_anchor),
            encode_dt(row.period_start),
            encode_dt(row.period_end),
            row.monthly_limit,
            row.monthly_used,
            row.credit_balance,
            row.billing_subscription_ref,
            row.billing_customer_ref,
            encode_dt(row.created_at),
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(ent)
  }

  async fn entitlement(&self, user_id: Uuid) -> Result<Option<Entitlement>> {
    let id_str = encode_uuid(user_id);

    let ent = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        Ok(read_entitlement(&tx, &id_str)?)
      })
      .await?;

    Ok(ent)
  }

  async fn check_and_consume(
    &self,
    user_id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<ConsumeOutcome> {
    let id_str = encode_uuid(user_id);

    let row = self
      .conn
      .call(move |conn| {
        let tx = conn
          .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let Some(mut ent) = read_entitlement(&tx, &id_str)? else {
          return Ok(ConsumeRow::Unknown);
        };

        // Rollover is checked lazily on access: no timer owns the window.
        if ent.rollover_if_expired(now) {
          write_period(&tx, &ent)?;
        }

        // Quota first, credits only once the monthly quota is exhausted.
        let outcome = if ent.monthly_used < ent.monthly_limit {
          tx.execute(
            "UPDATE entitlements SET monthly_used = monthly_used + 1
             WHERE user_id = ?1",
            rusqlite::params![id_str],
          )?;
          ConsumeOutcome::quota()
        } else if ent.credit_balance > 0 {
          let balance_after = ent.credit_balance - 1;
          append_credit_txn(
            &tx,
            ent.user_id,
            TransactionKind::Consume,
            -1,
            balance_after,
            None,
            now,
          )?;
          ConsumeOutcome::credit()
        } else {
          // Denial has no side effect; committing writes nothing.
          ConsumeOutcome::denied()
        };

        tx.commit()?;
        Ok(ConsumeRow::Outcome(outcome))
      })
      .await?;

    match row {
      ConsumeRow::Unknown => Err(Error::UnknownUser(user_id)),
      ConsumeRow::Outcome(outcome) => Ok(outcome),
    }
  }

  async fn rollover_if_expired(
    &self,
    user_id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<bool> {
    let id_str = encode_uuid(user_id);

    let rolled = self
      .conn
      .call(move |conn| {
        let tx = conn
          .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let Some(mut ent) = read_entitlement(&tx, &id_str)? else {
          return Ok(None);
        };

        let rolled = ent.rollover_if_expired(now);
        if rolled {
          write_period(&tx, &ent)?;
        }
        tx.commit()?;
        Ok(Some(rolled))
      })
      .await?;

    rolled.ok_or(Error::UnknownUser(user_id))
  }

  async fn apply_billing_event(&self, event: BillingEvent) -> Result<ApplyOutcome> {
    let policy = self.policy;
    let user_id = event.user_id;
    let now = Utc::now();

    let row = self
      .conn
      .call(move |conn| {
        let tx = conn
          .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let id_str = encode_uuid(event.user_id);

        // At-least-once delivery: a known event id is a no-op success.
        let seen: bool = tx
          .query_row(
            "SELECT 1 FROM applied_billing_events
             WHERE user_id = ?1 AND event_id = ?2",
            rusqlite::params![id_str, event.id],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if seen {
          return Ok(EventRow::Outcome(ApplyOutcome::AlreadyApplied));
        }

        let Some(ent) = read_entitlement(&tx, &id_str)? else {
          return Ok(EventRow::Unknown);
        };

        // Out-of-order delivery: the event with the latest occurred_at wins,
        // not the latest arrival. Older events are recorded (so redelivery
        // stays idempotent) but leave state untouched.
        if let Some(sref) = event.subscription_ref()
          && let Some(watermark) = subscription_watermark(&tx, &id_str, sref)?
          && event.occurred_at <= watermark
        {
          record_applied_event(&tx, &event, true, now)?;
          tx.commit()?;
          return Ok(EventRow::Outcome(ApplyOutcome::Stale));
        }

        match &event.kind {
          BillingEventKind::SubscriptionActivated {
            subscription_ref,
            customer_ref,
            period_start,
            period_end,
          } => {
            tx.execute(
              "UPDATE entitlements
               SET plan = 'plus', monthly_limit = ?2,
                   billing_anchor = ?3, period_start = ?3, period_end = ?4,
                   monthly_used = 0,
                   billing_subscription_ref = ?5, billing_customer_ref = ?6
               WHERE user_id = ?1",
              rusqlite::params![
                id_str,
                policy.plus_monthly_limit,
                encode_dt(*period_start),
                encode_dt(*period_end),
                subscription_ref,
                customer_ref,
              ],
            )?;
          }
          BillingEventKind::SubscriptionRenewed {
            subscription_ref,
            period_start,
            period_end,
          } => {
            // Renewal extends the window and resets usage for the new
            // period, matching the rollover contract.
            tx.execute(
              "UPDATE entitlements
               SET plan = 'plus', monthly_limit = ?2,
                   billing_anchor = ?3, period_start = ?3, period_end = ?4,
                   monthly_used = 0,
                   billing_subscription_ref = ?5
               WHERE user_id = ?1",
              rusqlite::params![
                id_str,
                policy.plus_monthly_limit,
                encode_dt(*period_start),
                encode_dt(*period_end),
                subscription_ref,
              ],
            )?;
          }
          BillingEventKind::SubscriptionCanceled { .. } => {
            // Immediate limit downgrade; in-period usage is not reversed
            // and purchased credits are untouched. The subscription refs
            // are cleared (ordering history stays in the events table).
            tx.execute(
              "UPDATE entitlements
               SET plan = 'free', monthly_limit = ?2,
                   billing_subscription_ref = NULL,
                   billing_customer_ref = NULL
               WHERE user_id = ?1",
              rusqlite::params![id_str, policy.free_monthly_limit],
            )?;
          }
          BillingEventKind::CreditPurchase { amount } => {
            let Some(balance_after) = ent.credit_balance.checked_add(*amount)
            else {
              return Ok(EventRow::Overflow);
            };
            let appended = append_credit_txn(
              &tx,
              ent.user_id,
              TransactionKind::Purchase,
              i64::from(*amount),
              balance_after,
              Some(&event.id),
              now,
            );
            if let Err(e) = appended {
              // A duplicate reference_id is the idempotency success case,
              // not an error. Dropping the transaction rolls back.
              if is_constraint_violation(&e) {
                return Ok(EventRow::Outcome(ApplyOutcome::AlreadyApplied));
              }
              return Err(e.into());
            }
          }
          BillingEventKind::PaymentFailed { .. } => {
            // No ledger mutation; recorded below for idempotency only.
          }
        }

        record_applied_event(&tx, &event, false, now)?;
        tx.commit()?;
        Ok(EventRow::Outcome(ApplyOutcome::Applied))
      })
      .await?;

    match row {
      EventRow::Unknown => Err(Error::UnknownUser(user_id)),
      EventRow::Overflow => Err(Error::BalanceOverflow(user_id)),
      EventRow::Outcome(outcome) => Ok(outcome),
    }
  }

  async fn credit_transactions(
    &self,
    user_id: Uuid,
  ) -> Result<Vec<CreditTransaction>> {
    let id_str = encode_uuid(user_id);

    let raws: Vec<RawCreditTransaction> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT txn_id, user_id, kind, amount, balance_after,
                  reference_id, created_at
           FROM credit_transactions
           WHERE user_id = ?1
           ORDER BY rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawCreditTransaction {
              txn_id:        row.get(0)?,
              user_id:       row.get(1)?,
              kind:          row.get(2)?,
              amount:        row.get(3)?,
              balance_after: row.get(4)?,
              reference_id:  row.get(5)?,
              created_at:    row.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawCreditTransaction::into_transaction)
      .collect()
  }

  async fn delete_entitlement(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<()> {
    let id_str = encode_uuid(user_id);
    let at_str = encode_dt(now);

    let updated = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE entitlements SET deleted_at = ?2
           WHERE user_id = ?1 AND deleted_at IS NULL",
          rusqlite::params![id_str, at_str],
        )?;
        Ok(n)
      })
      .await?;

    if updated == 0 {
      return Err(Error::UnknownUser(user_id));
    }
    Ok(())
  }
}

// ─── ReviewStore impl ────────────────────────────────────────────────────────

impl ReviewStore for SqliteStore {
  type Error = Error;

  async fn create_item(
    &self,
    user_id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<(Uuid, SrsState)> {
    let item_id = Uuid::new_v4();
    let state = SrsState::new(now.date_naive());
    let row = state.clone();

    let created = self
      .conn
      .call(move |conn| {
        let tx = conn
          .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        // Unknown and soft-deleted users look the same from here.
        if read_entitlement(&tx, &encode_uuid(user_id))?.is_none() {
          return Ok(false);
        }

        tx.execute(
          "INSERT INTO items (item_id, user_id, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![
            encode_uuid(item_id),
            encode_uuid(user_id),
            encode_dt(now),
          ],
        )?;
        tx.execute(
          "INSERT INTO srs_states
             (item_id, ease_factor, interval_days, repetitions, due_date,
              last_reviewed_at)
           VALUES (?1, ?2, ?3, ?4, ?5, NULL)",
          rusqlite::params![
            encode_uuid(item_id),
            row.ease_factor.millis(),
            row.interval_days,
            row.repetitions,
            encode_date(row.due_date),
          ],
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !created {
      return Err(Error::UnknownUser(user_id));
    }
    Ok((item_id, state))
  }

  async fn srs_state(&self, item_id: Uuid) -> Result<Option<SrsState>> {
    let id_str = encode_uuid(item_id);

    let raw: Option<RawSrsState> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT ease_factor, interval_days, repetitions, due_date,
                      last_reviewed_at
               FROM srs_states WHERE item_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok(RawSrsState {
                  ease_factor:   row.get(0)?,
                  interval_days: row.get(1)?,
                  repetitions:   row.get(2)?,
                  due_date:      row.get(3)?,
                  last_reviewed_at: row.get(4)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSrsState::into_state).transpose()
  }

  async fn due_items(
    &self,
    user_id: Uuid,
    today: NaiveDate,
  ) -> Result<Vec<(Uuid, SrsState)>> {
    let id_str = encode_uuid(user_id);
    let today_str = encode_date(today);

    let raws: Option<Vec<(String, RawSrsState)>> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        if read_entitlement(&tx, &id_str)?.is_none() {
          return Ok(None);
        }

        let mut stmt = tx.prepare(
          "SELECT i.item_id, s.ease_factor, s.interval_days, s.repetitions,
                  s.due_date, s.last_reviewed_at
           FROM items i
           JOIN srs_states s ON s.item_id = i.item_id
           WHERE i.user_id = ?1 AND s.due_date <= ?2
           ORDER BY s.due_date, i.item_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str, today_str], |row| {
            Ok((
              row.get::<_, String>(0)?,
              RawSrsState {
                ease_factor:   row.get(1)?,
                interval_days: row.get(2)?,
                repetitions:   row.get(3)?,
                due_date:      row.get(4)?,
                last_reviewed_at: row.get(5)?,
              },
            ))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some(rows))
      })
      .await?;

    let Some(raws) = raws else {
      return Err(Error::UnknownUser(user_id));
    };
    raws
      .into_iter()
      .map(|(id, raw)| Ok((crate::encode::decode_uuid(&id)?, raw.into_state()?)))
      .collect()
  }

  async fn submit_review(
    &self,
    item_id: Uuid,
    rating: Rating,
    client_request_id: String,
    now: DateTime<Utc>,
  ) -> Result<ReviewOutcome> {
    let id_str = encode_uuid(item_id);
    let request_id = client_request_id.clone();

    let row = self
      .conn
      .call(move |conn| {
        let tx = conn
          .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let owner: Option<String> = tx
          .query_row(
            "SELECT user_id FROM items WHERE item_id = ?1",
            rusqlite::params![id_str],
            |row| row.get(0),
          )
          .optional()?;
        let Some(owner) = owner else {
          return Ok(SubmitRow::UnknownItem);
        };

        // Items of a soft-deleted user are no longer reviewable.
        if read_entitlement(&tx, &owner)?.is_none() {
          let owner_id = sql_conv(crate::encode::decode_uuid(&owner))?;
          return Ok(SubmitRow::UnknownUser(owner_id));
        }

        // A retried network call must not schedule twice.
        let seen: bool = tx
          .query_row(
            "SELECT 1 FROM review_submissions
             WHERE item_id = ?1 AND client_request_id = ?2",
            rusqlite::params![id_str, request_id],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if seen {
          return Ok(SubmitRow::Duplicate);
        }

        let raw = tx.query_row(
          "SELECT ease_factor, interval_days, repetitions, due_date,
                  last_reviewed_at
           FROM srs_states WHERE item_id = ?1",
          rusqlite::params![id_str],
          |row| {
            Ok(RawSrsState {
              ease_factor:   row.get(0)?,
              interval_days: row.get(1)?,
              repetitions:   row.get(2)?,
              due_date:      row.get(3)?,
              last_reviewed_at: row.get(4)?,
            })
          },
        )?;
        let current = sql_conv(raw.into_state())?;

        // The one and only scheduler invocation for this submission.
        let next = srs::schedule(&current, rating, now);

        tx.execute(
          "UPDATE srs_states
           SET ease_factor = ?2, interval_days = ?3, repetitions = ?4,
               due_date = ?5, last_reviewed_at = ?6
           WHERE item_id = ?1",
          rusqlite::params![
            id_str,
            next.ease_factor.millis(),
            next.interval_days,
            next.repetitions,
            encode_date(next.due_date),
            next.last_reviewed_at.map(encode_dt),
          ],
        )?;
        tx.execute(
          "INSERT INTO review_submissions
             (item_id, client_request_id, rating, reviewed_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, request_id, rating as i64, encode_dt(now)],
        )?;

        let counter: i64 = tx.query_row(
          "INSERT INTO review_progress (user_id, session_counter)
           VALUES (?1, 1)
           ON CONFLICT (user_id)
           DO UPDATE SET session_counter = session_counter + 1
           RETURNING session_counter",
          rusqlite::params![owner],
          |row| row.get(0),
        )?;

        tx.commit()?;
        Ok(SubmitRow::Done(next, counter as u64))
      })
      .await?;

    match row {
      SubmitRow::UnknownItem => Err(Error::UnknownItem(item_id)),
      SubmitRow::UnknownUser(owner) => Err(Error::UnknownUser(owner)),
      SubmitRow::Duplicate => Err(Error::DuplicateSubmission {
        item_id,
        client_request_id,
      }),
      SubmitRow::Done(state, session_counter) => Ok(ReviewOutcome {
        item_id,
        state,
        session_counter,
      }),
    }
  }
}
