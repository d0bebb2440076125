//! Error taxonomy shared by every deckdrop crate.
//!
//! None of these are fatal: each one is recovered at a component boundary
//! and shown to the user as a short message. Losing a claim race is not an
//! error at all; see [`crate::drop::ClaimOutcome`].

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error(
    "there is already an active drop in this channel ({} seconds remaining)",
    remaining.as_secs()
  )]
  ActiveDropExists { remaining: Duration },

  #[error("there are no cards available to drop")]
  CatalogEmpty,

  #[error("serial allocation failed: {0}")]
  AllocationFailed(String),

  #[error("card render failed: {0}")]
  RenderFailed(#[source] BoxError),

  #[error("persistence unavailable, try again later: {0}")]
  PersistenceUnavailable(#[source] BoxError),

  #[error("messaging surface failed: {0}")]
  MessagingFailed(#[source] BoxError),

  #[error("drop {0} has expired")]
  ClaimExpired(Uuid),

  #[error("drop {0} has already been claimed")]
  ClaimAlreadyResolved(Uuid),

  #[error("drop not found: {0}")]
  DropNotFound(String),

  #[error("a card named {0:?} already exists")]
  CardNameConflict(String),

  #[error("invalid card: {0}")]
  InvalidCard(String),

  #[error("serial {0} is already owned by another user")]
  LedgerConflict(String),

  #[error("user {user_id} does not own serial {serial}")]
  InstanceNotFound { user_id: String, serial: String },
}

impl Error {
  pub fn persistence(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::PersistenceUnavailable(Box::new(e))
  }

  pub fn render(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::RenderFailed(Box::new(e))
  }

  pub fn messaging(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::MessagingFailed(Box::new(e))
  }

  /// Stable snake_case code for machine consumers of the error.
  pub fn code(&self) -> &'static str {
    match self {
      Self::ActiveDropExists { .. } => "active_drop_exists",
      Self::CatalogEmpty => "catalog_empty",
      Self::AllocationFailed(_) => "allocation_failed",
      Self::RenderFailed(_) => "render_failed",
      Self::PersistenceUnavailable(_) => "persistence_unavailable",
      Self::MessagingFailed(_) => "messaging_failed",
      Self::ClaimExpired(_) => "claim_expired",
      Self::ClaimAlreadyResolved(_) => "claim_already_resolved",
      Self::DropNotFound(_) => "drop_not_found",
      Self::CardNameConflict(_) => "card_name_conflict",
      Self::InvalidCard(_) => "invalid_card",
      Self::LedgerConflict(_) => "ledger_conflict",
      Self::InstanceNotFound { .. } => "instance_not_found",
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
