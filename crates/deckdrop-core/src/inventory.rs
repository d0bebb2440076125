//! Ownership records produced by successful claims.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::card::CardDefinition;

/// Default page size for inventory listings.
pub const DEFAULT_PAGE_SIZE: usize = 5;

/// One physical card held by a user. Immutable once written, apart from
/// `favorite`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedCardInstance {
  pub card_id:     Uuid,
  pub version:     u32,
  /// Unique across every instance ever created.
  pub serial:      String,
  pub user_id:     String,
  pub obtained_at: DateTime<Utc>,
  pub favorite:    bool,
}

/// Ledger acknowledgement. Appends are idempotent per `(user_id, serial)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ack {
  Appended,
  /// The same user already holds this serial; nothing was written.
  AlreadyRecorded,
}

/// Store-level result of a ledger append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerAppend {
  Appended,
  AlreadyRecorded,
  /// The serial is recorded under a different user.
  OwnedElsewhere,
}

/// An owned instance joined with its card definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryEntry {
  pub instance: OwnedCardInstance,
  pub card:     CardDefinition,
}

/// A page of a user's collection, Legendary first then newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInventory {
  pub user_id:    String,
  pub created_at: DateTime<Utc>,
  /// Number of instances held in total, not just on this page.
  pub total:      usize,
  pub cards:      Vec<InventoryEntry>,
}

/// Paging parameters for [`crate::store::DropStore::get_inventory`].
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

impl PageQuery {
  pub fn limit(&self) -> usize { self.limit.unwrap_or(DEFAULT_PAGE_SIZE) }

  pub fn offset(&self) -> usize { self.offset.unwrap_or(0) }
}
