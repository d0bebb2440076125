//! Claim arbitration.
//!
//! The winner is whoever's conditional update changes the row; this module
//! only classifies the outcome and runs the follow-up writes for the winner.

use std::sync::Arc;

use deckdrop_core::{
  Result,
  drop::{ActiveDrop, ClaimAttempt, ClaimOutcome},
  inventory::OwnedCardInstance,
  store::DropStore,
  surface::{DropStatus, Messenger, Renderer},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{context::Context, expiry::ExpiryMonitor, ledger::InventoryLedger};

pub struct ClaimArbiter<S, M, R> {
  ctx:     Arc<Context<S, M, R>>,
  ledger:  InventoryLedger<S, M, R>,
  monitor: ExpiryMonitor<S, M, R>,
}

impl<S, M, R> Clone for ClaimArbiter<S, M, R> {
  fn clone(&self) -> Self {
    Self {
      ctx:     Arc::clone(&self.ctx),
      ledger:  self.ledger.clone(),
      monitor: self.monitor.clone(),
    }
  }
}

impl<S, M, R> ClaimArbiter<S, M, R>
where
  S: DropStore,
  M: Messenger,
  R: Renderer,
{
  pub fn new(
    ctx: Arc<Context<S, M, R>>,
    ledger: InventoryLedger<S, M, R>,
    monitor: ExpiryMonitor<S, M, R>,
  ) -> Self {
    Self { ctx, ledger, monitor }
  }

  pub async fn attempt_claim(&self, drop_id: Uuid, user_id: &str) -> Result<ClaimOutcome> {
    let now = self.ctx.clock.now();
    let attempt = self
      .ctx
      .persist(self.ctx.store.claim_drop(drop_id, user_id, now))
      .await?;

    let drop = match attempt {
      ClaimAttempt::Won(drop) => drop,
      ClaimAttempt::AlreadyClaimed => {
        debug!(%drop_id, %user_id, "claim lost");
        return Ok(ClaimOutcome::AlreadyClaimed);
      }
      ClaimAttempt::Expired => {
        debug!(%drop_id, %user_id, "claim after expiry");
        return Ok(ClaimOutcome::Expired);
      }
      ClaimAttempt::NotFound => return Ok(ClaimOutcome::NotFound),
    };

    info!(%drop_id, %user_id, serial = %drop.serial, "drop claimed");
    let instance = self.complete(&drop, user_id).await?;
    Ok(ClaimOutcome::Success(instance))
  }

  /// Claim the drop announced by `message_id`.
  pub async fn attempt_claim_by_message(
    &self,
    message_id: &str,
    user_id: &str,
  ) -> Result<ClaimOutcome> {
    let found = self
      .ctx
      .persist(self.ctx.store.lookup_message(message_id))
      .await?;
    match found {
      Some(drop_id) => self.attempt_claim(drop_id, user_id).await,
      None => Ok(ClaimOutcome::NotFound),
    }
  }

  /// Everything that follows a won claim: ledger append, timer cancel,
  /// message edit, record delete.
  ///
  /// Idempotent, so the recovery sweep can call it again for a claimed drop
  /// whose record survived. If the append fails the record is left in place
  /// for that sweep to pick up.
  pub async fn complete(&self, drop: &ActiveDrop, user_id: &str) -> Result<OwnedCardInstance> {
    let instance = OwnedCardInstance {
      card_id:     drop.card_id,
      version:     drop.version,
      serial:      drop.serial.clone(),
      user_id:     user_id.to_owned(),
      obtained_at: self.ctx.clock.now(),
      favorite:    false,
    };
    self.ledger.append(&instance).await?;

    self.monitor.cancel(drop.drop_id);
    self
      .ctx
      .update_message(drop, DropStatus::Claimed { by: user_id.to_owned() })
      .await;

    if let Err(e) = self.ctx.persist(self.ctx.store.delete_drop(drop.drop_id)).await {
      warn!(drop_id = %drop.drop_id, error = %e, "claimed drop left in place for the sweep");
    }
    Ok(instance)
  }
}
