//! The `DropStore` trait.
//!
//! Implemented by storage backends (e.g. `deckdrop-store-sqlite`). The
//! lifecycle engine depends on this abstraction, not on any concrete backend.
//!
//! Every race in the drop lifecycle is settled here: the claim is one
//! conditional update, expiry is one conditional delete, and drop creation is
//! a conditional insert. Callers must never read a flag and then write based
//! on it.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  card::{CardDefinition, NewCard},
  drop::{ActiveDrop, AllocateOutcome, ClaimAttempt, CreateDrop, NewDrop},
  inventory::{LedgerAppend, OwnedCardInstance, PageQuery, UserInventory},
};

/// Result of [`DropStore::add_card`].
#[derive(Debug, Clone)]
pub enum AddCard {
  Created(CardDefinition),
  NameTaken,
}

/// Abstraction over a deckdrop persistence backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait DropStore: Send + Sync + 'static {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Cheap round-trip used to detect an outage before starting work.
  fn ping(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Catalog ───────────────────────────────────────────────────────────

  fn add_card(
    &self,
    card: NewCard,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<AddCard, Self::Error>> + Send + '_;

  fn get_card(
    &self,
    card_id: Uuid,
  ) -> impl Future<Output = Result<Option<CardDefinition>, Self::Error>> + Send + '_;

  fn list_cards(
    &self,
  ) -> impl Future<Output = Result<Vec<CardDefinition>, Self::Error>> + Send + '_;

  fn count_cards(&self) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// One card chosen uniformly at random, or `None` for an empty catalog.
  fn random_card(
    &self,
  ) -> impl Future<Output = Result<Option<CardDefinition>, Self::Error>> + Send + '_;

  // ── Allocation ────────────────────────────────────────────────────────

  /// Reserve `serial` and atomically increment the card's version counter.
  /// Both happen or neither does.
  fn allocate<'a>(
    &'a self,
    card_id: Uuid,
    serial: &'a str,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<AllocateOutcome, Self::Error>> + Send + 'a;

  /// Hand `version` back to the counter if it is still the latest one for
  /// the card. Returns whether the counter moved.
  fn release_version(
    &self,
    card_id: Uuid,
    version: u32,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Drops ─────────────────────────────────────────────────────────────

  /// The unclaimed drop in `channel_id` whose window is still open.
  fn find_live_drop<'a>(
    &'a self,
    channel_id: &'a str,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<ActiveDrop>, Self::Error>> + Send + 'a;

  /// Insert a drop unless the channel already has a live one.
  fn create_drop(
    &self,
    input: NewDrop,
  ) -> impl Future<Output = Result<CreateDrop, Self::Error>> + Send + '_;

  fn get_drop(
    &self,
    drop_id: Uuid,
  ) -> impl Future<Output = Result<Option<ActiveDrop>, Self::Error>> + Send + '_;

  fn find_drop_by_message<'a>(
    &'a self,
    message_id: &'a str,
  ) -> impl Future<Output = Result<Option<ActiveDrop>, Self::Error>> + Send + 'a;

  /// The drop id announced by `message_id`, whether the drop is still live or
  /// already resolved.
  fn lookup_message<'a>(
    &'a self,
    message_id: &'a str,
  ) -> impl Future<Output = Result<Option<Uuid>, Self::Error>> + Send + 'a;

  /// Every drop record still present, claimed or not.
  fn list_drops(
    &self,
  ) -> impl Future<Output = Result<Vec<ActiveDrop>, Self::Error>> + Send + '_;

  /// Mark the drop claimed by `user_id` only if it is unclaimed and
  /// `expires_at > now`, as one indivisible operation. A drop that was
  /// already resolved reports how it ended rather than `NotFound`.
  fn claim_drop<'a>(
    &'a self,
    drop_id: Uuid,
    user_id: &'a str,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<ClaimAttempt, Self::Error>> + Send + 'a;

  /// Delete the drop only if it is still unclaimed, remembering it as
  /// expired. Returns the deleted record, or `None` when a claim got there
  /// first or it is already gone.
  fn expire_drop(
    &self,
    drop_id: Uuid,
  ) -> impl Future<Output = Result<Option<ActiveDrop>, Self::Error>> + Send + '_;

  /// Unconditional delete used once a claim has been recorded. The outcome
  /// is remembered so later claims are classified.
  fn delete_drop(
    &self,
    drop_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Ledger ────────────────────────────────────────────────────────────

  /// Append an instance to its owner's inventory, creating the inventory on
  /// first use. Idempotent per `(user_id, serial)`.
  fn append_instance<'a>(
    &'a self,
    instance: &'a OwnedCardInstance,
  ) -> impl Future<Output = Result<LedgerAppend, Self::Error>> + Send + 'a;

  /// Returns `None` for a user who has never claimed anything.
  fn get_inventory<'a>(
    &'a self,
    user_id: &'a str,
    page: PageQuery,
  ) -> impl Future<Output = Result<Option<UserInventory>, Self::Error>> + Send + 'a;

  /// Returns `false` when the user does not own `serial`.
  fn set_favorite<'a>(
    &'a self,
    user_id: &'a str,
    serial: &'a str,
    favorite: bool,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}
