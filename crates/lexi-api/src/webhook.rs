//! The billing webhook receiver.
//!
//! The payment provider delivers signed events at-least-once and in no
//! particular order. This handler verifies the HMAC-SHA256 signature over
//! the raw body before parsing anything, then hands the event to the
//! ledger. Every disposition the ledger can reach (applied, duplicate,
//! stale, unknown user) is a 2xx so the provider does not retry; only a
//! bad signature, a malformed payload, or a transient store failure is
//! surfaced as an error.

use axum::{Json, body::Bytes, extract::State, http::HeaderMap};
use hmac::{Hmac, Mac as _};
use lexi_core::{
  billing::{ApplyOutcome, BillingEvent},
  store::{LedgerStore, ReviewStore},
};
use serde_json::json;
use sha2::Sha256;

use crate::{ApiState, error::ApiError};

/// Header carrying the lowercase-hex HMAC-SHA256 of the request body.
pub const SIGNATURE_HEADER: &str = "x-lexi-signature";

type HmacSha256 = Hmac<Sha256>;

/// Constant-time verification of `signature_hex` against `body`.
pub fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
  let Ok(signature) = hex::decode(signature_hex) else {
    return false;
  };
  let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
    return false;
  };
  mac.update(body);
  mac.verify_slice(&signature).is_ok()
}

/// `POST /billing/webhook`
pub async fn receive<S>(
  State(state): State<ApiState<S>>,
  headers: HeaderMap,
  body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError>
where
  S: LedgerStore + ReviewStore,
{
  let signature = headers
    .get(SIGNATURE_HEADER)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::BadSignature)?;
  if !verify_signature(&state.webhook_secret, &body, signature) {
    return Err(ApiError::BadSignature);
  }

  let event: BillingEvent = serde_json::from_slice(&body)
    .map_err(|e| ApiError::BadRequest(format!("malformed event: {e}")))?;
  let event_id = event.id.clone();

  match state.store.apply_billing_event(event).await {
    Ok(ApplyOutcome::Applied) => {
      Ok(Json(json!({ "outcome": "applied", "id": event_id })))
    }
    Ok(ApplyOutcome::AlreadyApplied) => {
      tracing::debug!(event_id = %event_id, "duplicate billing event, no-op");
      Ok(Json(json!({ "outcome": "already_applied", "id": event_id })))
    }
    Ok(ApplyOutcome::Stale) => {
      tracing::debug!(event_id = %event_id, "stale billing event, state kept");
      Ok(Json(json!({ "outcome": "stale", "id": event_id })))
    }
    Err(e) => match e.into() {
      // Race with account deletion: discard, never retry.
      lexi_core::Error::UnknownUser(user_id) => {
        tracing::warn!(
          event_id = %event_id,
          user_id = %user_id,
          "billing event for unknown user discarded"
        );
        Ok(Json(json!({ "outcome": "discarded", "id": event_id })))
      }
      lexi_core::Error::LockTimeout => Err(ApiError::Unavailable),
      other => Err(ApiError::Store(Box::new(other))),
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
  }

  #[test]
  fn signature_roundtrip_verifies() {
    let body = br#"{"id":"evt_1"}"#;
    let sig = sign("whsec_test", body);
    assert!(verify_signature("whsec_test", body, &sig));
  }

  #[test]
  fn tampered_body_fails_verification() {
    let sig = sign("whsec_test", b"payload");
    assert!(!verify_signature("whsec_test", b"payload2", &sig));
    assert!(!verify_signature("other_secret", b"payload", &sig));
    assert!(!verify_signature("whsec_test", b"payload", "not-hex"));
  }
}
