//! The drop lifecycle manager.
//!
//! [`DropEngine`] wires the lifecycle components around one shared
//! [`Context`] and is what the HTTP surface and the server hold on to. Every
//! race (two claims, a claim against the expiry timer, two drops in one
//! channel) is settled by a conditional write in the [`DropStore`]; the
//! engine never decides a winner from state it read earlier.
//!
//! # Wiring
//!
//! ```rust,ignore
//! let engine = DropEngine::new(store, messenger, renderer, Arc::new(SystemClock), config);
//! engine.recover().await?;
//! let drop = engine.start_drop("general").await?;
//! ```

pub mod allocator;
pub mod arbiter;
mod catalog;
pub mod context;
pub mod expiry;
pub mod ledger;
pub mod scheduler;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::sync::Arc;

use deckdrop_core::{
  Result,
  clock::Clock,
  drop::{ActiveDrop, ClaimOutcome},
  store::DropStore,
  surface::{Messenger, Renderer},
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

pub use crate::context::{Context, EngineConfig, MAX_CLAIM_WINDOW};
use crate::{
  allocator::SerialAllocator, arbiter::ClaimArbiter, expiry::ExpiryMonitor,
  ledger::InventoryLedger, scheduler::DropScheduler,
};

/// What a recovery pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
  /// Unclaimed drops past their window that were retired.
  pub expired:   usize,
  /// Claimed drops whose follow-up writes were finished.
  pub completed: usize,
  /// Live drops that had no timer and were re-armed.
  pub resumed:   usize,
}

pub struct DropEngine<S, M, R> {
  ctx:       Arc<Context<S, M, R>>,
  scheduler: DropScheduler<S, M, R>,
  arbiter:   ClaimArbiter<S, M, R>,
  monitor:   ExpiryMonitor<S, M, R>,
  ledger:    InventoryLedger<S, M, R>,
}

impl<S, M, R> Clone for DropEngine<S, M, R> {
  fn clone(&self) -> Self {
    Self {
      ctx:       Arc::clone(&self.ctx),
      scheduler: self.scheduler.clone(),
      arbiter:   self.arbiter.clone(),
      monitor:   self.monitor.clone(),
      ledger:    self.ledger.clone(),
    }
  }
}

impl<S, M, R> DropEngine<S, M, R>
where
  S: DropStore,
  M: Messenger,
  R: Renderer,
{
  pub fn new(
    store: S,
    messenger: M,
    renderer: R,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
  ) -> Self {
    let ctx = Arc::new(Context { store, messenger, renderer, clock, config });
    let allocator = SerialAllocator::new(Arc::clone(&ctx));
    let ledger = InventoryLedger::new(Arc::clone(&ctx));
    let monitor = ExpiryMonitor::new(Arc::clone(&ctx), allocator.clone());
    let scheduler = DropScheduler::new(Arc::clone(&ctx), allocator, monitor.clone());
    let arbiter = ClaimArbiter::new(Arc::clone(&ctx), ledger.clone(), monitor.clone());
    Self { ctx, scheduler, arbiter, monitor, ledger }
  }

  pub fn store(&self) -> &S { &self.ctx.store }

  pub fn config(&self) -> &EngineConfig { &self.ctx.config }

  pub fn ledger(&self) -> &InventoryLedger<S, M, R> { &self.ledger }

  pub fn monitor(&self) -> &ExpiryMonitor<S, M, R> { &self.monitor }

  // ─── Lifecycle ────────────────────────────────────────────────────────────

  pub async fn start_drop(&self, channel_id: &str) -> Result<ActiveDrop> {
    self.scheduler.start_drop(channel_id).await
  }

  pub async fn attempt_claim(&self, drop_id: Uuid, user_id: &str) -> Result<ClaimOutcome> {
    self.arbiter.attempt_claim(drop_id, user_id).await
  }

  pub async fn attempt_claim_by_message(
    &self,
    message_id: &str,
    user_id: &str,
  ) -> Result<ClaimOutcome> {
    self.arbiter.attempt_claim_by_message(message_id, user_id).await
  }

  pub async fn get_drop(&self, drop_id: Uuid) -> Result<Option<ActiveDrop>> {
    self.ctx.persist(self.ctx.store.get_drop(drop_id)).await
  }

  // ─── Recovery ─────────────────────────────────────────────────────────────

  /// Re-arm timers for live drops that have none, e.g. after a restart.
  pub async fn resume(&self) -> Result<usize> {
    let now = self.ctx.clock.now();
    let mut resumed = 0;
    for drop in self.ctx.persist(self.ctx.store.list_drops()).await? {
      if drop.is_live(now) && !self.monitor.is_armed(drop.drop_id) {
        self.monitor.arm(&drop);
        resumed += 1;
      }
    }
    Ok(resumed)
  }

  /// Retire unclaimed drops past their window and finish claimed drops whose
  /// record is still present. Per-drop failures are logged and left for the
  /// next pass.
  pub async fn sweep(&self) -> Result<RecoveryReport> {
    let now = self.ctx.clock.now();
    let mut report = RecoveryReport::default();

    for drop in self.ctx.persist(self.ctx.store.list_drops()).await? {
      if let Some(user_id) = drop.claimed_by.as_deref().filter(|_| drop.claimed) {
        match self.arbiter.complete(&drop, user_id).await {
          Ok(_) => report.completed += 1,
          Err(e) => warn!(drop_id = %drop.drop_id, error = %e, "could not complete claimed drop"),
        }
      } else if drop.expires_at <= now {
        self.monitor.cancel(drop.drop_id);
        match self.monitor.retire(drop.drop_id).await {
          Ok(true) => report.expired += 1,
          Ok(false) => {}
          Err(e) => warn!(drop_id = %drop.drop_id, error = %e, "could not retire drop"),
        }
      }
    }
    Ok(report)
  }

  /// Startup recovery: [`Self::sweep`] then [`Self::resume`].
  pub async fn recover(&self) -> Result<RecoveryReport> {
    let mut report = self.sweep().await?;
    report.resumed = self.resume().await?;
    info!(
      expired = report.expired,
      completed = report.completed,
      resumed = report.resumed,
      "recovered persisted drops"
    );
    Ok(report)
  }
}

#[cfg(test)]
mod tests;
