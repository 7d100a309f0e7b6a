//! SQLite backend for the Lexi entitlement ledger and review store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. Every ledger mutation executes
//! inside a single immediate transaction, which is what makes
//! `check_and_consume` and `apply_billing_event` atomic per user: partial
//! application is never observable.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
