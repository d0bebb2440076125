//! Core types and trait definitions for the deckdrop card-drop economy.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! lifecycle engine, the SQLite backend and the HTTP surface all depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod card;
pub mod clock;
pub mod drop;
pub mod error;
pub mod inventory;
pub mod store;
pub mod surface;

pub use error::{BoxError, Error, Result};
