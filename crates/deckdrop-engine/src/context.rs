//! The explicit dependency bundle every lifecycle component shares.
//!
//! Built once at process start and passed around behind an `Arc`; nothing in
//! the engine reaches for global state.

use std::{future::Future, sync::Arc, time::Duration};

use chrono::TimeDelta;
use deckdrop_core::{
  BoxError, Error, Result,
  clock::Clock,
  drop::ActiveDrop,
  store::DropStore,
  surface::{DropAnnouncement, DropStatus, Messenger, Renderer},
};
use tracing::warn;

/// Longest claim window the engine will schedule.
pub const MAX_CLAIM_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Tuning knobs for the lifecycle.
#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// How long a drop stays claimable.
  pub claim_window:        Duration,
  /// Upper bound on any single store, render or messaging call. Distinct
  /// from (and much shorter than) the claim window.
  pub dependency_timeout:  Duration,
  /// Random bytes in a serial suffix; each byte is two hex digits.
  pub serial_suffix_bytes: usize,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      claim_window:        Duration::from_secs(60),
      dependency_timeout:  Duration::from_secs(5),
      serial_suffix_bytes: 2,
    }
  }
}

impl EngineConfig {
  /// The claim window actually scheduled, capped at [`MAX_CLAIM_WINDOW`].
  pub fn bounded_claim_window(&self) -> Duration { self.claim_window.min(MAX_CLAIM_WINDOW) }

  pub fn claim_window_delta(&self) -> TimeDelta {
    TimeDelta::from_std(self.bounded_claim_window()).unwrap_or(TimeDelta::zero())
  }
}

/// Whether `err` came from a dependency call that ran out of time rather
/// than one that answered with a failure.
pub(crate) fn timed_out(err: &Error) -> bool {
  match err {
    Error::PersistenceUnavailable(source)
    | Error::RenderFailed(source)
    | Error::MessagingFailed(source) => source.is::<tokio::time::error::Elapsed>(),
    _ => false,
  }
}

pub struct Context<S, M, R> {
  pub store:     S,
  pub messenger: M,
  pub renderer:  R,
  pub clock:     Arc<dyn Clock>,
  pub config:    EngineConfig,
}

/// Await `op` for at most `limit`; failures and timeouts both become the
/// error produced by `wrap`.
async fn bounded<T, E>(
  limit: Duration,
  op: impl Future<Output = std::result::Result<T, E>>,
  wrap: fn(BoxError) -> Error,
) -> Result<T>
where
  E: std::error::Error + Send + Sync + 'static,
{
  match tokio::time::timeout(limit, op).await {
    Ok(Ok(value)) => Ok(value),
    Ok(Err(e)) => Err(wrap(Box::new(e))),
    Err(elapsed) => Err(wrap(Box::new(elapsed))),
  }
}

impl<S, M, R> Context<S, M, R> {
  /// Run a store call under the dependency timeout.
  pub(crate) async fn persist<T, E>(
    &self,
    op: impl Future<Output = std::result::Result<T, E>>,
  ) -> Result<T>
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    bounded(self.config.dependency_timeout, op, Error::PersistenceUnavailable).await
  }
}

impl<S, M, R> Context<S, M, R>
where
  S: DropStore,
  M: Messenger,
  R: Renderer,
{
  pub(crate) async fn render(
    &self,
    base_image: &str,
    version: u32,
    serial: &str,
  ) -> Result<bytes::Bytes> {
    bounded(
      self.config.dependency_timeout,
      self.renderer.render(base_image, version, serial),
      Error::RenderFailed,
    )
    .await
  }

  pub(crate) async fn post(
    &self,
    channel_id: &str,
    announcement: &DropAnnouncement,
  ) -> Result<String> {
    bounded(
      self.config.dependency_timeout,
      self.messenger.post(channel_id, announcement),
      Error::MessagingFailed,
    )
    .await
  }

  pub(crate) async fn edit(
    &self,
    message_id: &str,
    announcement: &DropAnnouncement,
  ) -> Result<()> {
    bounded(
      self.config.dependency_timeout,
      self.messenger.edit(message_id, announcement),
      Error::MessagingFailed,
    )
    .await
  }

  /// Best-effort rewrite of a drop's surfaced message. Failures are logged;
  /// the store, not the message, is authoritative.
  pub(crate) async fn update_message(&self, drop: &ActiveDrop, status: DropStatus) {
    let card = match self.persist(self.store.get_card(drop.card_id)).await {
      Ok(Some(card)) => card,
      Ok(None) => {
        warn!(drop_id = %drop.drop_id, card_id = %drop.card_id, "card for drop is gone");
        return;
      }
      Err(e) => {
        warn!(drop_id = %drop.drop_id, error = %e, "could not load card for message update");
        return;
      }
    };

    let announcement = DropAnnouncement {
      card,
      version: drop.version,
      serial: drop.serial.clone(),
      status,
      image: None,
    };
    if let Err(e) = self.edit(&drop.message_id, &announcement).await {
      warn!(
        drop_id = %drop.drop_id,
        message_id = %drop.message_id,
        error = %e,
        "failed to update drop message"
      );
    }
  }
}
