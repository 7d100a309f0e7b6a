//! JSON REST API for Lexi.
//!
//! Exposes an axum [`Router`] backed by any store implementing
//! [`lexi_core::store::LedgerStore`] and [`lexi_core::store::ReviewStore`].
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", lexi_api::api_router(state))
//! ```

pub mod entitlements;
pub mod error;
pub mod reviews;
pub mod webhook;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, post},
};
use lexi_core::store::{LedgerStore, ReviewStore};

pub use error::ApiError;

/// State threaded through all handlers.
pub struct ApiState<S> {
  pub store: Arc<S>,
  /// Shared secret for webhook signature verification.
  pub webhook_secret: String,
}

// Manual impl: `S` itself need not be `Clone` behind the `Arc`.
impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      store: self.store.clone(),
      webhook_secret: self.webhook_secret.clone(),
    }
  }
}

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: LedgerStore + ReviewStore + Send + Sync + 'static,
{
  Router::new()
    // Entitlements & the generation gate
    .route("/users", post(entitlements::create::<S>))
    .route("/users/{user_id}", delete(entitlements::remove::<S>))
    .route("/entitlements/{user_id}", get(entitlements::get_one::<S>))
    .route(
      "/entitlements/{user_id}/transactions",
      get(entitlements::transactions::<S>),
    )
    .route("/generation/consume", post(entitlements::consume::<S>))
    // Billing webhook
    .route("/billing/webhook", post(webhook::receive::<S>))
    // Reviews
    .route("/items", post(reviews::create_item::<S>))
    .route("/reviews/due", get(reviews::due::<S>))
    .route("/reviews", post(reviews::submit::<S>))
    .with_state(state)
}
