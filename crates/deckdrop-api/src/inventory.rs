//! Handlers for a user's collection.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/users/:user_id/inventory` | `?limit=5&offset=0`; 404 before the first claim |
//! | `PUT`  | `/users/:user_id/inventory/:serial/favorite` | Body: `{"favorite":true}` |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use deckdrop_core::{
  inventory::{PageQuery, UserInventory},
  store::DropStore,
  surface::{Messenger, Renderer},
};
use deckdrop_engine::DropEngine;
use serde::Deserialize;

use crate::error::ApiError;

/// Largest page a caller may ask for.
const MAX_PAGE_SIZE: usize = 100;

/// `GET /users/:user_id/inventory`
pub async fn list<S, M, R>(
  State(engine): State<DropEngine<S, M, R>>,
  Path(user_id): Path<String>,
  Query(page): Query<PageQuery>,
) -> Result<Json<UserInventory>, ApiError>
where
  S: DropStore,
  M: Messenger,
  R: Renderer,
{
  if page.limit() == 0 || page.limit() > MAX_PAGE_SIZE {
    return Err(ApiError::BadRequest(format!("limit must be between 1 and {MAX_PAGE_SIZE}")));
  }
  let inventory = engine
    .ledger()
    .inventory(&user_id, page)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("user {user_id} has not claimed any cards yet")))?;
  Ok(Json(inventory))
}

#[derive(Debug, Deserialize)]
pub struct FavoriteBody {
  pub favorite: bool,
}

/// `PUT /users/:user_id/inventory/:serial/favorite`
pub async fn favorite<S, M, R>(
  State(engine): State<DropEngine<S, M, R>>,
  Path((user_id, serial)): Path<(String, String)>,
  Json(body): Json<FavoriteBody>,
) -> Result<StatusCode, ApiError>
where
  S: DropStore,
  M: Messenger,
  R: Renderer,
{
  engine
    .ledger()
    .set_favorite(&user_id, &serial, body.favorite)
    .await?;
  Ok(StatusCode::NO_CONTENT)
}
