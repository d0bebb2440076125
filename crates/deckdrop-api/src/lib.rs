//! JSON REST API for deckdrop.
//!
//! Exposes an axum [`Router`] over a [`DropEngine`]. The claim endpoints are
//! what a chat surface's "claim" button calls; auth and transport concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", deckdrop_api::api_router(engine.clone()))
//! ```

pub mod cards;
pub mod drops;
pub mod error;
pub mod inventory;

use axum::{
  Router,
  routing::{get, post, put},
};
use deckdrop_core::{
  store::DropStore,
  surface::{Messenger, Renderer},
};
use deckdrop_engine::DropEngine;

pub use error::ApiError;

/// Build the API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, M, R>(engine: DropEngine<S, M, R>) -> Router<()>
where
  S: DropStore,
  M: Messenger,
  R: Renderer,
{
  Router::new()
    // Drops
    .route("/channels/{channel_id}/drops", post(drops::start::<S, M, R>))
    .route("/drops/{drop_id}", get(drops::get_one::<S, M, R>))
    .route("/drops/{drop_id}/claims", post(drops::claim::<S, M, R>))
    .route("/messages/{message_id}/claims", post(drops::claim_by_message::<S, M, R>))
    // Catalog
    .route("/cards", get(cards::list::<S, M, R>).post(cards::create::<S, M, R>))
    // Inventory
    .route("/users/{user_id}/inventory", get(inventory::list::<S, M, R>))
    .route(
      "/users/{user_id}/inventory/{serial}/favorite",
      put(inventory::favorite::<S, M, R>),
    )
    .with_state(engine)
}
