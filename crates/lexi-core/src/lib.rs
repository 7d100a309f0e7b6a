//! Core types and trait definitions for the Lexi vocabulary trainer.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod billing;
pub mod credit;
pub mod entitlement;
pub mod error;
pub mod srs;
pub mod store;

pub use error::{Error, Result};
