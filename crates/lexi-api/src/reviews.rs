//! Handlers for learning items and review submission.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/items` | Create an item with a fresh schedule (due today) |
//! | `GET`  | `/reviews/due` | `?user_id` required; items due today |
//! | `POST` | `/reviews` | Body: [`SubmitBody`]; schedules exactly once |

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::Utc;
use lexi_core::{
  srs::{Rating, SrsState},
  store::{LedgerStore, ReviewStore},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

// ─── Create item ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateItemBody {
  pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ItemCreated {
  pub item_id: Uuid,
  pub state:   SrsState,
}

/// `POST /items` — returns 201 + the fresh schedule.
pub async fn create_item<S>(
  State(state): State<ApiState<S>>,
  Json(body): Json<CreateItemBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LedgerStore + ReviewStore,
{
  let (item_id, srs) = state
    .store
    .create_item(body.user_id, Utc::now())
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(ItemCreated { item_id, state: srs })))
}

// ─── Due items ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DueParams {
  pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct DueItem {
  pub item_id: Uuid,
  pub state:   SrsState,
}

/// `GET /reviews/due?user_id=<id>` — items due today, most overdue first.
pub async fn due<S>(
  State(state): State<ApiState<S>>,
  Query(params): Query<DueParams>,
) -> Result<Json<Vec<DueItem>>, ApiError>
where
  S: LedgerStore + ReviewStore,
{
  let items = state
    .store
    .due_items(params.user_id, Utc::now().date_naive())
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(
    items
      .into_iter()
      .map(|(item_id, srs)| DueItem { item_id, state: srs })
      .collect(),
  ))
}

// ─── Submit ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
  pub item_id: Uuid,
  /// Recall rating 0..=3; anything else is rejected before the scheduler.
  pub rating:  u8,
  /// Client-generated idempotency key; a retried request with the same id
  /// is rejected with 409 rather than scheduled twice.
  pub client_request_id: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
  pub item_id: Uuid,
  pub state:   SrsState,
  pub session_counter: u64,
}

/// `POST /reviews` — body: [`SubmitBody`]; returns the persisted schedule.
pub async fn submit<S>(
  State(state): State<ApiState<S>>,
  Json(body): Json<SubmitBody>,
) -> Result<Json<SubmitResponse>, ApiError>
where
  S: LedgerStore + ReviewStore,
{
  let rating = Rating::try_from(body.rating).map_err(ApiError::from_store)?;

  let outcome = state
    .store
    .submit_review(body.item_id, rating, body.client_request_id, Utc::now())
    .await
    .map_err(ApiError::from_store)?;

  Ok(Json(SubmitResponse {
    item_id: outcome.item_id,
    state:   outcome.state,
    session_counter: outcome.session_counter,
  }))
}
