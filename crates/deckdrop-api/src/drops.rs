//! Handlers for drop and claim endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/channels/:channel_id/drops` | 409 while a drop is live |
//! | `GET`  | `/drops/:drop_id` | 404 once claimed or expired |
//! | `POST` | `/drops/:drop_id/claims` | Body: `{"user_id":"alice"}`; 409 claimed, 410 expired |
//! | `POST` | `/messages/:message_id/claims` | Same, keyed by announcement |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use deckdrop_core::{
  drop::{ActiveDrop, ClaimOutcome},
  inventory::OwnedCardInstance,
  store::DropStore,
  surface::{Messenger, Renderer},
};
use deckdrop_engine::DropEngine;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

// ─── Start ────────────────────────────────────────────────────────────────────

/// `POST /channels/:channel_id/drops`
pub async fn start<S, M, R>(
  State(engine): State<DropEngine<S, M, R>>,
  Path(channel_id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DropStore,
  M: Messenger,
  R: Renderer,
{
  let drop = engine.start_drop(&channel_id).await?;
  Ok((StatusCode::CREATED, Json(drop)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /drops/:drop_id`
pub async fn get_one<S, M, R>(
  State(engine): State<DropEngine<S, M, R>>,
  Path(drop_id): Path<Uuid>,
) -> Result<Json<ActiveDrop>, ApiError>
where
  S: DropStore,
  M: Messenger,
  R: Renderer,
{
  let drop = engine
    .get_drop(drop_id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("drop {drop_id} not found")))?;
  Ok(Json(drop))
}

// ─── Claim ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ClaimBody {
  pub user_id: String,
}

impl ClaimBody {
  fn user_id(&self) -> Result<&str, ApiError> {
    match self.user_id.trim() {
      "" => Err(ApiError::BadRequest("user_id is required".into())),
      user_id => Ok(user_id),
    }
  }
}

/// Losing outcomes are not engine errors, so they get their own mapping.
fn claimed(outcome: ClaimOutcome, what: &str) -> Result<Json<OwnedCardInstance>, ApiError> {
  match outcome {
    ClaimOutcome::Success(instance) => Ok(Json(instance)),
    ClaimOutcome::AlreadyClaimed => {
      Err(ApiError::Conflict(format!("{what} has already been claimed")))
    }
    ClaimOutcome::Expired => Err(ApiError::Gone(format!("{what} has expired"))),
    ClaimOutcome::NotFound => Err(ApiError::NotFound(format!("{what} not found"))),
  }
}

/// `POST /drops/:drop_id/claims`
pub async fn claim<S, M, R>(
  State(engine): State<DropEngine<S, M, R>>,
  Path(drop_id): Path<Uuid>,
  Json(body): Json<ClaimBody>,
) -> Result<Json<OwnedCardInstance>, ApiError>
where
  S: DropStore,
  M: Messenger,
  R: Renderer,
{
  let outcome = engine.attempt_claim(drop_id, body.user_id()?).await?;
  claimed(outcome, &format!("drop {drop_id}"))
}

/// `POST /messages/:message_id/claims`
pub async fn claim_by_message<S, M, R>(
  State(engine): State<DropEngine<S, M, R>>,
  Path(message_id): Path<String>,
  Json(body): Json<ClaimBody>,
) -> Result<Json<OwnedCardInstance>, ApiError>
where
  S: DropStore,
  M: Messenger,
  R: Renderer,
{
  let outcome = engine
    .attempt_claim_by_message(&message_id, body.user_id()?)
    .await?;
  claimed(outcome, &format!("drop for message {message_id}"))
}
