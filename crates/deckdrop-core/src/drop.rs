//! Drops: time-boxed, channel-scoped offers of one card instance.
//!
//! An [`ActiveDrop`] moves through `Active -> {Claimed, Expired}`. The claim
//! transition is a single conditional update in the store; the expiry
//! transition is a conditional delete. Whichever lands first wins and the
//! other becomes a no-op.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, inventory::OwnedCardInstance};

// ─── Allocation ──────────────────────────────────────────────────────────────

/// Version and serial reserved for one dropped instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
  pub version: u32,
  pub serial:  String,
}

/// Store-level result of reserving a serial and bumping a card's counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocateOutcome {
  Allocated { version: u32 },
  /// The serial was issued before; nothing was reserved.
  SerialTaken,
}

// ─── ActiveDrop ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveDrop {
  pub drop_id:    Uuid,
  pub card_id:    Uuid,
  pub channel_id: String,
  /// Identifier of the surfaced announcement on the messaging surface.
  pub message_id: String,
  pub version:    u32,
  pub serial:     String,
  pub created_at: DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
  pub claimed:    bool,
  pub claimed_by: Option<String>,
}

impl ActiveDrop {
  /// Unclaimed and inside its window.
  pub fn is_live(&self, now: DateTime<Utc>) -> bool {
    !self.claimed && self.expires_at > now
  }

  /// Time left in the window, rounded up to whole seconds.
  pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
    let millis = (self.expires_at - now).num_milliseconds().max(0) as u64;
    Duration::from_secs(millis.div_ceil(1000))
  }
}

/// Input to [`crate::store::DropStore::create_drop`].
#[derive(Debug, Clone)]
pub struct NewDrop {
  pub card_id:    Uuid,
  pub channel_id: String,
  pub message_id: String,
  pub allocation: Allocation,
  pub created_at: DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
}

/// Store-level result of the conditional drop insert.
#[derive(Debug, Clone)]
pub enum CreateDrop {
  Created(ActiveDrop),
  /// Another live drop already holds the channel.
  ChannelBusy(ActiveDrop),
}

// ─── Claims ──────────────────────────────────────────────────────────────────

/// Store-level result of the atomic conditional claim update.
#[derive(Debug, Clone)]
pub enum ClaimAttempt {
  /// This caller's update changed the row; the returned drop is claimed.
  Won(ActiveDrop),
  AlreadyClaimed,
  Expired,
  NotFound,
}

/// What a user sees after trying to claim a drop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "instance", rename_all = "snake_case")]
pub enum ClaimOutcome {
  Success(OwnedCardInstance),
  AlreadyClaimed,
  Expired,
  NotFound,
}

impl ClaimOutcome {
  pub fn is_success(&self) -> bool { matches!(self, Self::Success(_)) }

  /// Map non-success outcomes onto the error taxonomy.
  pub fn into_result(self, drop_id: Uuid) -> Result<OwnedCardInstance> {
    match self {
      Self::Success(instance) => Ok(instance),
      Self::AlreadyClaimed => Err(Error::ClaimAlreadyResolved(drop_id)),
      Self::Expired => Err(Error::ClaimExpired(drop_id)),
      Self::NotFound => Err(Error::DropNotFound(drop_id.to_string())),
    }
  }
}
