//! Serial and version allocation.
//!
//! A serial is a three-letter prefix taken from the card name plus a random
//! hex suffix, e.g. `DRA-A1B2`. The version comes from the store's per-card
//! counter, which is incremented atomically together with reserving the
//! serial.

use std::sync::Arc;

use deckdrop_core::{
  Error, Result,
  card::CardDefinition,
  drop::{AllocateOutcome, Allocation},
  store::DropStore,
};
use rand_core::{OsRng, RngCore};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::context::Context;

const PREFIX_LEN: usize = 3;

/// Upper-case the first three alphanumerics of `name`, padding with `X`.
pub fn serial_prefix(name: &str) -> String {
  let mut prefix: String = name
    .chars()
    .filter(|c| c.is_ascii_alphanumeric())
    .take(PREFIX_LEN)
    .map(|c| c.to_ascii_uppercase())
    .collect();
  while prefix.len() < PREFIX_LEN {
    prefix.push('X');
  }
  prefix
}

/// A fresh serial for `name` with `suffix_bytes` random bytes of suffix.
pub fn generate_serial(name: &str, suffix_bytes: usize) -> String {
  let mut suffix = vec![0u8; suffix_bytes.max(1)];
  OsRng.fill_bytes(&mut suffix);
  format!("{}-{}", serial_prefix(name), hex::encode_upper(suffix))
}

pub struct SerialAllocator<S, M, R> {
  ctx: Arc<Context<S, M, R>>,
}

impl<S, M, R> Clone for SerialAllocator<S, M, R> {
  fn clone(&self) -> Self { Self { ctx: Arc::clone(&self.ctx) } }
}

impl<S: DropStore, M, R> SerialAllocator<S, M, R> {
  pub fn new(ctx: Arc<Context<S, M, R>>) -> Self { Self { ctx } }

  /// Reserve `(version, serial)` for one new instance of `card`.
  ///
  /// A serial collision fails the allocation outright; retrying is the
  /// caller's decision.
  pub async fn allocate(&self, card: &CardDefinition) -> Result<Allocation> {
    let serial = generate_serial(&card.name, self.ctx.config.serial_suffix_bytes);
    let now = self.ctx.clock.now();

    let outcome = self
      .ctx
      .persist(self.ctx.store.allocate(card.card_id, &serial, now))
      .await
      .map_err(|e| Error::AllocationFailed(e.to_string()))?;

    match outcome {
      AllocateOutcome::Allocated { version } => {
        debug!(card = %card.name, version, %serial, "allocated serial");
        Ok(Allocation { version, serial })
      }
      AllocateOutcome::SerialTaken => {
        Err(Error::AllocationFailed(format!("serial {serial} has already been issued")))
      }
    }
  }

  /// Give `version` back if nothing newer has been allocated since. Used when
  /// a drop never reached a claimant.
  pub async fn release(&self, card_id: Uuid, version: u32) {
    match self.ctx.persist(self.ctx.store.release_version(card_id, version)).await {
      Ok(released) => debug!(%card_id, version, released, "released version"),
      Err(e) => warn!(%card_id, version, error = %e, "failed to release version"),
    }
  }
}
