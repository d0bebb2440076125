//! Expiry timers for live drops.
//!
//! Each drop gets one spawned timer task. When it fires, the drop is retired
//! through the store's conditional delete, which only matches an unclaimed
//! row; a timer that loses to a claim therefore does nothing. Cancelling a
//! timer is an optimisation, not a correctness requirement.

use std::{
  collections::HashMap,
  sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicU64, Ordering},
  },
  time::Duration,
};

use deckdrop_core::{
  Result,
  drop::ActiveDrop,
  store::DropStore,
  surface::{DropStatus, Messenger, Renderer},
};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{allocator::SerialAllocator, context::Context};

/// A revocable handle on one armed timer.
#[derive(Debug)]
pub struct ExpiryTimer {
  handle: AbortHandle,
  /// Distinguishes a re-armed timer from the one it replaced.
  token:  u64,
}

impl ExpiryTimer {
  pub fn revoke(self) { self.handle.abort(); }
}

type Timers = Arc<Mutex<HashMap<Uuid, ExpiryTimer>>>;

pub struct ExpiryMonitor<S, M, R> {
  ctx:       Arc<Context<S, M, R>>,
  allocator: SerialAllocator<S, M, R>,
  timers:    Timers,
  tokens:    Arc<AtomicU64>,
}

impl<S, M, R> Clone for ExpiryMonitor<S, M, R> {
  fn clone(&self) -> Self {
    Self {
      ctx:       Arc::clone(&self.ctx),
      allocator: self.allocator.clone(),
      timers:    Arc::clone(&self.timers),
      tokens:    Arc::clone(&self.tokens),
    }
  }
}

impl<S, M, R> ExpiryMonitor<S, M, R> {
  fn timers(&self) -> MutexGuard<'_, HashMap<Uuid, ExpiryTimer>> {
    self.timers.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Disarm the timer for `drop_id`. Returns `false` if there was none, e.g.
  /// because it already fired.
  pub fn cancel(&self, drop_id: Uuid) -> bool {
    match self.timers().remove(&drop_id) {
      Some(timer) => {
        timer.revoke();
        true
      }
      None => false,
    }
  }

  pub fn is_armed(&self, drop_id: Uuid) -> bool { self.timers().contains_key(&drop_id) }

  pub fn armed_count(&self) -> usize { self.timers().len() }
}

impl<S, M, R> ExpiryMonitor<S, M, R>
where
  S: DropStore,
  M: Messenger,
  R: Renderer,
{
  pub fn new(ctx: Arc<Context<S, M, R>>, allocator: SerialAllocator<S, M, R>) -> Self {
    Self { ctx, allocator, timers: Arc::default(), tokens: Arc::default() }
  }

  /// Start (or restart) the timer for `drop`, firing at its `expires_at`.
  pub fn arm(&self, drop: &ActiveDrop) {
    let drop_id = drop.drop_id;
    let delay = (drop.expires_at - self.ctx.clock.now())
      .to_std()
      .unwrap_or(Duration::ZERO);

    let token = self.tokens.fetch_add(1, Ordering::Relaxed);
    let monitor = self.clone();

    // The map stays locked until the timer is registered, so the task can
    // never look for its entry before it exists.
    let mut timers = self.timers();
    let task = tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      // Leave the map first so a racing claim cannot abort us mid-retire.
      // A newer timer for the same drop keeps its entry.
      {
        let mut timers = monitor.timers();
        if timers.get(&drop_id).is_some_and(|t| t.token == token) {
          timers.remove(&drop_id);
        }
      }
      if let Err(e) = monitor.retire(drop_id).await {
        warn!(%drop_id, error = %e, "expiry failed; the next sweep will retry");
      }
    });

    let timer = ExpiryTimer { handle: task.abort_handle(), token };
    if let Some(previous) = timers.insert(drop_id, timer) {
      previous.revoke();
    }
    std::mem::drop(timers);
    debug!(%drop_id, ?delay, "armed expiry timer");
  }

  /// Retire `drop_id` if it is still unclaimed. Returns whether this call
  /// expired it; `false` means a claim won or it was already retired.
  pub async fn retire(&self, drop_id: Uuid) -> Result<bool> {
    let Some(drop) = self.ctx.persist(self.ctx.store.expire_drop(drop_id)).await? else {
      debug!(%drop_id, "expiry skipped; drop already resolved");
      return Ok(false);
    };

    info!(
      %drop_id,
      channel_id = %drop.channel_id,
      serial = %drop.serial,
      "drop expired unclaimed"
    );
    self.allocator.release(drop.card_id, drop.version).await;
    self.ctx.update_message(&drop, DropStatus::Expired).await;
    Ok(true)
  }
}
