//! Starting drops.

use std::sync::Arc;

use deckdrop_core::{
  Error, Result,
  card::CardDefinition,
  drop::{ActiveDrop, Allocation, CreateDrop, NewDrop},
  store::DropStore,
  surface::{DropAnnouncement, DropStatus, Messenger, Renderer},
};
use tracing::{info, warn};

use crate::{
  allocator::SerialAllocator,
  context::{Context, timed_out},
  expiry::ExpiryMonitor,
};

/// A start that did not produce a drop.
struct Abandoned {
  error:   Error,
  /// Whether the allocated version can be handed back. `false` when the
  /// drop may still have been recorded by an insert that outlived its
  /// timeout.
  release: bool,
}

impl From<Error> for Abandoned {
  fn from(error: Error) -> Self { Self { error, release: true } }
}

pub struct DropScheduler<S, M, R> {
  ctx:       Arc<Context<S, M, R>>,
  allocator: SerialAllocator<S, M, R>,
  monitor:   ExpiryMonitor<S, M, R>,
}

impl<S, M, R> Clone for DropScheduler<S, M, R> {
  fn clone(&self) -> Self {
    Self {
      ctx:       Arc::clone(&self.ctx),
      allocator: self.allocator.clone(),
      monitor:   self.monitor.clone(),
    }
  }
}

impl<S, M, R> DropScheduler<S, M, R>
where
  S: DropStore,
  M: Messenger,
  R: Renderer,
{
  pub fn new(
    ctx: Arc<Context<S, M, R>>,
    allocator: SerialAllocator<S, M, R>,
    monitor: ExpiryMonitor<S, M, R>,
  ) -> Self {
    Self { ctx, allocator, monitor }
  }

  /// Drop a random card into `channel_id`.
  ///
  /// Rejections (`ActiveDropExists`, `CatalogEmpty`) leave no trace. Once a
  /// version has been allocated, a failure hands it back unless the insert
  /// timed out without a verdict, in which case the version stays burned.
  /// Once the announcement is posted, a failure to record the drop rewrites
  /// the message so nobody is left clicking a dead button.
  pub async fn start_drop(&self, channel_id: &str) -> Result<ActiveDrop> {
    let ctx = &self.ctx;
    ctx.persist(ctx.store.ping()).await?;

    let now = ctx.clock.now();
    if let Some(live) = ctx.persist(ctx.store.find_live_drop(channel_id, now)).await? {
      return Err(Error::ActiveDropExists { remaining: live.remaining(now) });
    }

    if ctx.persist(ctx.store.count_cards()).await? == 0 {
      return Err(Error::CatalogEmpty);
    }
    let card = ctx
      .persist(ctx.store.random_card())
      .await?
      .ok_or(Error::CatalogEmpty)?;

    let allocation = self.allocator.allocate(&card).await?;
    match self.announce_and_record(channel_id, &card, &allocation).await {
      Ok(drop) => {
        self.monitor.arm(&drop);
        info!(
          drop_id = %drop.drop_id,
          %channel_id,
          card = %card.name,
          version = drop.version,
          serial = %drop.serial,
          "drop started"
        );
        Ok(drop)
      }
      Err(Abandoned { error, release: true }) => {
        self.allocator.release(card.card_id, allocation.version).await;
        Err(error)
      }
      Err(Abandoned { error, release: false }) => {
        warn!(
          card_id = %card.card_id,
          version = allocation.version,
          serial = %allocation.serial,
          "keeping version of a drop that may have been recorded late"
        );
        Err(error)
      }
    }
  }

  async fn announce_and_record(
    &self,
    channel_id: &str,
    card: &CardDefinition,
    allocation: &Allocation,
  ) -> std::result::Result<ActiveDrop, Abandoned> {
    let ctx = &self.ctx;
    let image = ctx
      .render(&card.image_url, allocation.version, &allocation.serial)
      .await?;

    let announcement = DropAnnouncement::open(
      card.clone(),
      allocation.version,
      allocation.serial.clone(),
      ctx.config.bounded_claim_window(),
      image,
    );
    let message_id = ctx.post(channel_id, &announcement).await?;

    // The window starts once the announcement is visible.
    let created_at = ctx.clock.now();
    let input = NewDrop {
      card_id: card.card_id,
      channel_id: channel_id.to_owned(),
      message_id: message_id.clone(),
      allocation: allocation.clone(),
      created_at,
      expires_at: created_at + ctx.config.claim_window_delta(),
    };

    let failure = match ctx.persist(ctx.store.create_drop(input)).await {
      Ok(CreateDrop::Created(drop)) => return Ok(drop),
      Ok(CreateDrop::ChannelBusy(winner)) => Abandoned::from(Error::ActiveDropExists {
        remaining: winner.remaining(ctx.clock.now()),
      }),
      Err(error) => match self.recheck(&message_id, error).await {
        Ok(drop) => return Ok(drop),
        Err(abandoned) => abandoned,
      },
    };

    warn!(%channel_id, %message_id, error = %failure.error, "posted drop could not be recorded");
    let failed = announcement.with_status(DropStatus::Failed { reason: failure.error.to_string() });
    if let Err(e) = ctx.edit(&message_id, &failed).await {
      warn!(%message_id, error = %e, "failed to retract drop message");
    }
    Err(failure)
  }

  /// After a failed insert, ask the store whether the drop was recorded
  /// anyway. An insert can outlive the timeout that abandoned it.
  async fn recheck(
    &self,
    message_id: &str,
    error: Error,
  ) -> std::result::Result<ActiveDrop, Abandoned> {
    let ctx = &self.ctx;
    match ctx.persist(ctx.store.find_drop_by_message(message_id)).await {
      Ok(Some(drop)) => {
        warn!(drop_id = %drop.drop_id, %message_id, error = %error, "drop recorded despite failed insert");
        Ok(drop)
      }
      Ok(None) => {
        let release = !timed_out(&error);
        Err(Abandoned { error, release })
      }
      Err(e) => {
        warn!(%message_id, error = %e, "could not confirm whether drop was recorded");
        Err(Abandoned { error, release: false })
      }
    }
  }
}
