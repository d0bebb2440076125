//! The inventory ledger: durable ownership of claimed instances.

use std::sync::Arc;

use deckdrop_core::{
  Error, Result,
  inventory::{Ack, LedgerAppend, OwnedCardInstance, PageQuery, UserInventory},
  store::DropStore,
};
use tracing::debug;

use crate::context::Context;

pub struct InventoryLedger<S, M, R> {
  ctx: Arc<Context<S, M, R>>,
}

impl<S, M, R> Clone for InventoryLedger<S, M, R> {
  fn clone(&self) -> Self { Self { ctx: Arc::clone(&self.ctx) } }
}

impl<S: DropStore, M, R> InventoryLedger<S, M, R> {
  pub fn new(ctx: Arc<Context<S, M, R>>) -> Self { Self { ctx } }

  /// Record `instance` in its owner's inventory.
  ///
  /// Safe to retry: appending the same `(user_id, serial)` again returns
  /// [`Ack::AlreadyRecorded`] and writes nothing.
  pub async fn append(&self, instance: &OwnedCardInstance) -> Result<Ack> {
    let outcome = self.ctx.persist(self.ctx.store.append_instance(instance)).await?;
    debug!(user_id = %instance.user_id, serial = %instance.serial, ?outcome, "ledger append");
    match outcome {
      LedgerAppend::Appended => Ok(Ack::Appended),
      LedgerAppend::AlreadyRecorded => Ok(Ack::AlreadyRecorded),
      LedgerAppend::OwnedElsewhere => Err(Error::LedgerConflict(instance.serial.clone())),
    }
  }

  /// A page of the user's collection, or `None` if they have never claimed.
  pub async fn inventory(&self, user_id: &str, page: PageQuery) -> Result<Option<UserInventory>> {
    self.ctx.persist(self.ctx.store.get_inventory(user_id, page)).await
  }

  pub async fn set_favorite(&self, user_id: &str, serial: &str, favorite: bool) -> Result<()> {
    let updated = self
      .ctx
      .persist(self.ctx.store.set_favorite(user_id, serial, favorite))
      .await?;
    if updated {
      Ok(())
    } else {
      Err(Error::InstanceNotFound { user_id: user_id.to_owned(), serial: serial.to_owned() })
    }
  }
}
