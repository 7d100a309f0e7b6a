//! Handlers for entitlement endpoints and the generation gate.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/users` | Create an entitlement with free-plan defaults |
//! | `DELETE` | `/users/:user_id` | Soft delete; user becomes unknown |
//! | `GET`  | `/entitlements/:user_id` | Snapshot; 404 if unknown/deleted |
//! | `GET`  | `/entitlements/:user_id/transactions` | Credit ledger rows |
//! | `POST` | `/generation/consume` | The gate in front of AI generation |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::Utc;
use lexi_core::{
  credit::CreditTransaction,
  entitlement::{ConsumeOutcome, Entitlement},
  store::{LedgerStore, ReviewStore},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub user_id: Uuid,
}

/// `POST /users` — body: `{"user_id":"..."}`; returns 201 + the entitlement.
pub async fn create<S>(
  State(state): State<ApiState<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LedgerStore + ReviewStore,
{
  let ent = state
    .store
    .create_entitlement(body.user_id, Utc::now())
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(ent)))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /users/:user_id` — soft delete; subsequent operations treat the
/// user as unknown. Late billing events for the user are discarded by the
/// webhook, never retried.
pub async fn remove<S>(
  State(state): State<ApiState<S>>,
  Path(user_id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: LedgerStore + ReviewStore,
{
  state
    .store
    .delete_entitlement(user_id, Utc::now())
    .await
    .map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /entitlements/:user_id`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  Path(user_id): Path<Uuid>,
) -> Result<Json<Entitlement>, ApiError>
where
  S: LedgerStore + ReviewStore,
{
  let ent = state
    .store
    .entitlement(user_id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("user {user_id} not found")))?;
  Ok(Json(ent))
}

// ─── Transactions ─────────────────────────────────────────────────────────────

/// `GET /entitlements/:user_id/transactions` — the append-only credit ledger
/// in creation order.
pub async fn transactions<S>(
  State(state): State<ApiState<S>>,
  Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<CreditTransaction>>, ApiError>
where
  S: LedgerStore + ReviewStore,
{
  let txns = state
    .store
    .credit_transactions(user_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(txns))
}

// ─── Consume ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ConsumeBody {
  pub user_id: Uuid,
}

/// `POST /generation/consume` — invoked synchronously before any AI content
/// is generated. A denial is a 200 with `allowed: false`; only transport
/// and lock failures are surfaced as errors.
pub async fn consume<S>(
  State(state): State<ApiState<S>>,
  Json(body): Json<ConsumeBody>,
) -> Result<Json<ConsumeOutcome>, ApiError>
where
  S: LedgerStore + ReviewStore,
{
  let outcome = state
    .store
    .check_and_consume(body.user_id, Utc::now())
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(outcome))
}
