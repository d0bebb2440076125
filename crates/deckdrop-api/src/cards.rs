//! Handlers for `/cards` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/cards` | Whole catalog, sorted by name |
//! | `POST` | `/cards` | 400 on invalid fields, 409 on a duplicate name |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use deckdrop_core::{
  card::{CardDefinition, NewCard},
  store::DropStore,
  surface::{Messenger, Renderer},
};
use deckdrop_engine::DropEngine;

use crate::error::ApiError;

/// `GET /cards`
pub async fn list<S, M, R>(
  State(engine): State<DropEngine<S, M, R>>,
) -> Result<Json<Vec<CardDefinition>>, ApiError>
where
  S: DropStore,
  M: Messenger,
  R: Renderer,
{
  Ok(Json(engine.list_cards().await?))
}

/// `POST /cards`
pub async fn create<S, M, R>(
  State(engine): State<DropEngine<S, M, R>>,
  Json(body): Json<NewCard>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DropStore,
  M: Messenger,
  R: Renderer,
{
  let card = engine.add_card(body).await?;
  Ok((StatusCode::CREATED, Json(card)))
}
