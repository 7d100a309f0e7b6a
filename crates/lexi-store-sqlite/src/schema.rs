//! SQL schema for the Lexi SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per user; the unit of locking for all ledger operations.
CREATE TABLE IF NOT EXISTS entitlements (
    user_id                  TEXT PRIMARY KEY,
    plan                     TEXT NOT NULL,     -- 'free' | 'plus'
    billing_anchor           TEXT NOT NULL,     -- ISO 8601 UTC
    period_start             TEXT NOT NULL,
    period_end               TEXT NOT NULL,
    monthly_limit            INTEGER NOT NULL,
    monthly_used             INTEGER NOT NULL DEFAULT 0,
    credit_balance           INTEGER NOT NULL DEFAULT 0,
    billing_subscription_ref TEXT,
    billing_customer_ref     TEXT,
    created_at               TEXT NOT NULL,
    deleted_at               TEXT,              -- soft delete
    CHECK (monthly_used >= 0),
    CHECK (credit_balance >= 0)
);

-- Credit transactions are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
-- (user_id, reference_id) uniqueness is the billing idempotency key.
CREATE TABLE IF NOT EXISTS credit_transactions (
    txn_id        TEXT PRIMARY KEY,
    user_id       TEXT NOT NULL REFERENCES entitlements(user_id),
    kind          TEXT NOT NULL,     -- 'purchase' | 'consume' | 'refund' | 'bonus'
    amount        INTEGER NOT NULL,  -- positive purchase/refund/bonus, negative consume
    balance_after INTEGER NOT NULL,
    reference_id  TEXT,              -- external event id for billing-sourced rows
    created_at    TEXT NOT NULL,
    UNIQUE (user_id, reference_id)
);

-- Every billing event ever handed to the ledger, applied or not.
-- stale = 1 marks events recorded only for idempotency (an event with a
-- newer occurred_at for the same subscription was already applied).
CREATE TABLE IF NOT EXISTS applied_billing_events (
    event_id         TEXT NOT NULL,
    user_id          TEXT NOT NULL REFERENCES entitlements(user_id),
    kind             TEXT NOT NULL,
    subscription_ref TEXT,
    occurred_at      TEXT NOT NULL,
    stale            INTEGER NOT NULL DEFAULT 0,
    applied_at       TEXT NOT NULL,
    UNIQUE (user_id, event_id)
);

CREATE TABLE IF NOT EXISTS items (
    item_id    TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL REFERENCES entitlements(user_id),
    created_at TEXT NOT NULL
);

-- One schedule per item, mutated only by review submissions.
CREATE TABLE IF NOT EXISTS srs_states (
    item_id           TEXT PRIMARY KEY REFERENCES items(item_id),
    ease_factor       INTEGER NOT NULL,  -- fixed-point thousandths
    interval_days     INTEGER NOT NULL,
    repetitions       INTEGER NOT NULL,
    due_date          TEXT NOT NULL,     -- 'YYYY-MM-DD'
    last_reviewed_at  TEXT
);

-- (item_id, client_request_id) uniqueness rejects retried submissions.
CREATE TABLE IF NOT EXISTS review_submissions (
    item_id           TEXT NOT NULL REFERENCES items(item_id),
    client_request_id TEXT NOT NULL,
    rating            INTEGER NOT NULL,
    reviewed_at       TEXT NOT NULL,
    UNIQUE (item_id, client_request_id)
);

-- Monotone per-user session counter, bumped once per accepted review.
CREATE TABLE IF NOT EXISTS review_progress (
    user_id         TEXT PRIMARY KEY REFERENCES entitlements(user_id),
    session_counter INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS credit_txns_user_idx ON credit_transactions(user_id);
CREATE INDEX IF NOT EXISTS events_sub_idx       ON applied_billing_events(user_id, subscription_ref);
CREATE INDEX IF NOT EXISTS items_user_idx       ON items(user_id);
CREATE INDEX IF NOT EXISTS srs_due_idx          ON srs_states(due_date);

PRAGMA user_version = 1;
";
