//! Lifecycle tests against an in-memory SQLite store and recording fakes.

use std::{
  sync::{Arc, Mutex},
  time::Duration,
};

use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use deckdrop_core::{
  Error,
  card::{CardDefinition, CardStats, CardType, NewCard, Rarity},
  clock::{Clock, ManualClock, SystemClock},
  drop::{ActiveDrop, AllocateOutcome, Allocation, ClaimAttempt, ClaimOutcome, CreateDrop, NewDrop},
  inventory::{LedgerAppend, OwnedCardInstance, PageQuery, UserInventory},
  store::{AddCard, DropStore},
  surface::{DropStatus, Renderer},
};
use deckdrop_store_sqlite::SqliteStore;
use uuid::Uuid;

use crate::{
  DropEngine, EngineConfig,
  testing::{FailingRenderer, RecordingMessenger, SlowRenderer, StaticRenderer},
};

type Engine<R = StaticRenderer> = DropEngine<SqliteStore, RecordingMessenger, R>;

fn config(window: Duration) -> EngineConfig {
  EngineConfig { claim_window: window, ..EngineConfig::default() }
}

async fn engine_with<R: Renderer>(
  renderer: R,
  clock: Arc<dyn Clock>,
  config: EngineConfig,
) -> (Engine<R>, RecordingMessenger) {
  let store = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store");
  let messenger = RecordingMessenger::new();
  let engine = DropEngine::new(store, messenger.clone(), renderer, clock, config);
  (engine, messenger)
}

async fn engine() -> (Engine, RecordingMessenger) {
  engine_with(
    StaticRenderer(Bytes::from_static(b"png")),
    Arc::new(SystemClock),
    EngineConfig::default(),
  )
  .await
}

fn dragon_warrior() -> NewCard {
  NewCard {
    name:        "Dragon Warrior".into(),
    card_type:   CardType::Character,
    rarity:      Rarity::Legendary,
    image_url:   "https://example.com/dragon.png".into(),
    description: "A mighty warrior".into(),
    stats:       CardStats { attack: 9, defense: 7, cost: 6 },
    created_by:  "admin".into(),
  }
}

async fn seed<R: Renderer>(engine: &Engine<R>) -> CardDefinition {
  engine.add_card(dragon_warrior()).await.unwrap()
}

// ─── Store with a scripted drop insert ────────────────────────────────────────

/// How [`ScriptedStore::create_drop`] behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Insert {
  Normal,
  /// Answer with an error without touching the database.
  Refuse,
  /// Commit, then hold the answer back for `delay`.
  ReplyLate,
  /// Never answer; the insert commits in the background after `delay`.
  CommitLate,
}

#[derive(Debug, thiserror::Error)]
enum ScriptedError {
  #[error(transparent)]
  Sqlite(#[from] deckdrop_store_sqlite::Error),

  #[error("insert refused")]
  Refused,
}

/// Delegates to SQLite, except for drop inserts, which follow the script.
#[derive(Clone)]
struct ScriptedStore {
  inner:  SqliteStore,
  insert: Arc<Mutex<Insert>>,
  delay:  Duration,
}

impl ScriptedStore {
  fn set_insert(&self, insert: Insert) {
    *self.insert.lock().unwrap() = insert;
  }

  fn insert(&self) -> Insert { *self.insert.lock().unwrap() }
}

impl DropStore for ScriptedStore {
  type Error = ScriptedError;

  async fn ping(&self) -> Result<(), ScriptedError> { Ok(self.inner.ping().await?) }

  async fn add_card(&self, card: NewCard, now: DateTime<Utc>) -> Result<AddCard, ScriptedError> {
    Ok(self.inner.add_card(card, now).await?)
  }

  async fn get_card(&self, card_id: Uuid) -> Result<Option<CardDefinition>, ScriptedError> {
    Ok(self.inner.get_card(card_id).await?)
  }

  async fn list_cards(&self) -> Result<Vec<CardDefinition>, ScriptedError> {
    Ok(self.inner.list_cards().await?)
  }

  async fn count_cards(&self) -> Result<u64, ScriptedError> { Ok(self.inner.count_cards().await?) }

  async fn random_card(&self) -> Result<Option<CardDefinition>, ScriptedError> {
    Ok(self.inner.random_card().await?)
  }

  async fn allocate(
    &self,
    card_id: Uuid,
    serial: &str,
    now: DateTime<Utc>,
  ) -> Result<AllocateOutcome, ScriptedError> {
    Ok(self.inner.allocate(card_id, serial, now).await?)
  }

  async fn release_version(&self, card_id: Uuid, version: u32) -> Result<bool, ScriptedError> {
    Ok(self.inner.release_version(card_id, version).await?)
  }

  async fn find_live_drop(
    &self,
    channel_id: &str,
    now: DateTime<Utc>,
  ) -> Result<Option<ActiveDrop>, ScriptedError> {
    Ok(self.inner.find_live_drop(channel_id, now).await?)
  }

  async fn create_drop(&self, input: NewDrop) -> Result<CreateDrop, ScriptedError> {
    match self.insert() {
      Insert::Normal => Ok(self.inner.create_drop(input).await?),
      Insert::Refuse => Err(ScriptedError::Refused),
      Insert::ReplyLate => {
        let created = self.inner.create_drop(input).await?;
        tokio::time::sleep(self.delay).await;
        Ok(created)
      }
      Insert::CommitLate => {
        let inner = self.inner.clone();
        let delay = self.delay;
        tokio::spawn(async move {
          tokio::time::sleep(delay).await;
          inner.create_drop(input).await.unwrap();
        });
        std::future::pending().await
      }
    }
  }

  async fn get_drop(&self, drop_id: Uuid) -> Result<Option<ActiveDrop>, ScriptedError> {
    Ok(self.inner.get_drop(drop_id).await?)
  }

  async fn find_drop_by_message(&self, message_id: &str) -> Result<Option<ActiveDrop>, ScriptedError> {
    Ok(self.inner.find_drop_by_message(message_id).await?)
  }

  async fn lookup_message(&self, message_id: &str) -> Result<Option<Uuid>, ScriptedError> {
    Ok(self.inner.lookup_message(message_id).await?)
  }

  async fn list_drops(&self) -> Result<Vec<ActiveDrop>, ScriptedError> {
    Ok(self.inner.list_drops().await?)
  }

  async fn claim_drop(
    &self,
    drop_id: Uuid,
    user_id: &str,
    now: DateTime<Utc>,
  ) -> Result<ClaimAttempt, ScriptedError> {
    Ok(self.inner.claim_drop(drop_id, user_id, now).await?)
  }

  async fn expire_drop(&self, drop_id: Uuid) -> Result<Option<ActiveDrop>, ScriptedError> {
    Ok(self.inner.expire_drop(drop_id).await?)
  }

  async fn delete_drop(&self, drop_id: Uuid) -> Result<bool, ScriptedError> {
    Ok(self.inner.delete_drop(drop_id).await?)
  }

  async fn append_instance(&self, instance: &OwnedCardInstance) -> Result<LedgerAppend, ScriptedError> {
    Ok(self.inner.append_instance(instance).await?)
  }

  async fn get_inventory(
    &self,
    user_id: &str,
    page: PageQuery,
  ) -> Result<Option<UserInventory>, ScriptedError> {
    Ok(self.inner.get_inventory(user_id, page).await?)
  }

  async fn set_favorite(
    &self,
    user_id: &str,
    serial: &str,
    favorite: bool,
  ) -> Result<bool, ScriptedError> {
    Ok(self.inner.set_favorite(user_id, serial, favorite).await?)
  }
}

type ScriptedEngine = DropEngine<ScriptedStore, RecordingMessenger, StaticRenderer>;

/// An engine whose store answers drop inserts per `insert`, with a 50ms
/// dependency timeout and a 150ms late-insert delay.
async fn scripted_engine(insert: Insert) -> (ScriptedEngine, ScriptedStore, RecordingMessenger) {
  let store = ScriptedStore {
    inner:  SqliteStore::open_in_memory().await.expect("in-memory store"),
    insert: Arc::new(Mutex::new(insert)),
    delay:  Duration::from_millis(150),
  };
  let messenger = RecordingMessenger::new();
  let config = EngineConfig {
    dependency_timeout: Duration::from_millis(50),
    ..EngineConfig::default()
  };
  let engine = DropEngine::new(
    store.clone(),
    messenger.clone(),
    StaticRenderer::default(),
    Arc::new(SystemClock),
    config,
  );
  engine.add_card(dragon_warrior()).await.unwrap();
  (engine, store, messenger)
}

// ─── Starting drops ──────────────────────────────────────────────────────────

#[tokio::test]
async fn first_drop_gets_version_one() {
  let (engine, messenger) = engine().await;
  let card = seed(&engine).await;

  let drop = engine.start_drop("C").await.unwrap();
  assert_eq!(drop.card_id, card.card_id);
  assert_eq!(drop.version, 1);
  assert!(drop.serial.starts_with("DRA-"));
  assert_eq!(drop.serial.len(), "DRA-A1B2".len());
  assert!(!drop.claimed);
  assert_eq!(drop.expires_at - drop.created_at, TimeDelta::seconds(60));
  assert_eq!(drop.message_id, "m1");
  assert_eq!(messenger.posts(), 1);
  assert!(engine.monitor().is_armed(drop.drop_id));
}

#[tokio::test]
async fn second_drop_in_channel_is_rejected() {
  let (engine, messenger) = engine().await;
  seed(&engine).await;
  engine.start_drop("C").await.unwrap();

  let err = engine.start_drop("C").await.unwrap_err();
  match err {
    Error::ActiveDropExists { remaining } => {
      assert!(remaining > Duration::ZERO && remaining <= Duration::from_secs(60));
    }
    other => panic!("expected ActiveDropExists, got {other:?}"),
  }
  assert_eq!(messenger.posts(), 1);

  // Other channels are unaffected.
  engine.start_drop("D").await.unwrap();
}

#[tokio::test]
async fn racing_starts_in_one_channel_persist_once() {
  let (engine, messenger) = engine().await;
  seed(&engine).await;

  let a = tokio::spawn({
    let engine = engine.clone();
    async move { engine.start_drop("C").await }
  });
  let b = tokio::spawn({
    let engine = engine.clone();
    async move { engine.start_drop("C").await }
  });
  let results = [a.await.unwrap(), b.await.unwrap()];

  let started = results.iter().filter(|r| r.is_ok()).count();
  assert_eq!(started, 1);
  assert!(
    results
      .iter()
      .any(|r| matches!(r, Err(Error::ActiveDropExists { .. })))
  );
  assert_eq!(engine.store().list_drops().await.unwrap().len(), 1);

  // A loser that got as far as posting had its message retracted.
  let retracted = ["m1", "m2"]
    .iter()
    .flat_map(|m| messenger.edits_of(m))
    .filter(|s| matches!(s, DropStatus::Failed { .. }))
    .count();
  assert_eq!(retracted, messenger.posts() - 1);
}

#[tokio::test]
async fn empty_catalog_is_rejected() {
  let (engine, messenger) = engine().await;
  let err = engine.start_drop("C").await.unwrap_err();
  assert!(matches!(err, Error::CatalogEmpty));
  assert_eq!(messenger.posts(), 0);
}

#[tokio::test]
async fn render_failure_posts_nothing_and_releases_version() {
  let (engine, messenger) =
    engine_with(FailingRenderer, Arc::new(SystemClock), EngineConfig::default()).await;
  let card = seed(&engine).await;

  let err = engine.start_drop("C").await.unwrap_err();
  assert!(matches!(err, Error::RenderFailed(_)));
  assert_eq!(messenger.posts(), 0);
  assert!(engine.store().list_drops().await.unwrap().is_empty());

  let next = engine
    .store()
    .allocate(card.card_id, "DRA-0000", Utc::now())
    .await
    .unwrap();
  assert_eq!(next, AllocateOutcome::Allocated { version: 1 });
}

#[tokio::test]
async fn slow_render_hits_dependency_timeout() {
  let config = EngineConfig {
    dependency_timeout: Duration::from_millis(50),
    ..EngineConfig::default()
  };
  let (engine, messenger) =
    engine_with(SlowRenderer(Duration::from_secs(5)), Arc::new(SystemClock), config).await;
  seed(&engine).await;

  let err = engine.start_drop("C").await.unwrap_err();
  assert!(matches!(err, Error::RenderFailed(_)));
  assert_eq!(messenger.posts(), 0);
}

#[tokio::test]
async fn post_failure_records_no_drop() {
  let (engine, messenger) = engine().await;
  seed(&engine).await;
  messenger.fail_posts(true);

  let err = engine.start_drop("C").await.unwrap_err();
  assert!(matches!(err, Error::MessagingFailed(_)));
  assert!(engine.store().list_drops().await.unwrap().is_empty());

  messenger.fail_posts(false);
  let drop = engine.start_drop("C").await.unwrap();
  assert_eq!(drop.version, 1);
}

#[tokio::test]
async fn refused_insert_retracts_message_and_releases_version() {
  let (engine, store, messenger) = scripted_engine(Insert::Refuse).await;

  let err = engine.start_drop("C").await.unwrap_err();
  assert!(matches!(err, Error::PersistenceUnavailable(_)));
  assert_eq!(messenger.posts(), 1);
  let edits = messenger.edits_of("m1");
  assert_eq!(edits.len(), 1);
  assert!(matches!(&edits[0], DropStatus::Failed { reason } if reason.contains("insert refused")));
  assert!(engine.store().list_drops().await.unwrap().is_empty());
  assert_eq!(engine.monitor().armed_count(), 0);

  store.set_insert(Insert::Normal);
  let drop = engine.start_drop("C").await.unwrap();
  assert_eq!(drop.version, 1);
  assert_eq!(drop.message_id, "m2");
}

#[tokio::test]
async fn insert_answering_after_timeout_is_adopted() {
  let (engine, _, messenger) = scripted_engine(Insert::ReplyLate).await;

  let drop = engine.start_drop("C").await.unwrap();
  assert_eq!(drop.version, 1);
  assert_eq!(drop.message_id, "m1");
  assert!(messenger.edits_of("m1").is_empty());
  assert!(engine.monitor().is_armed(drop.drop_id));
  assert_eq!(engine.store().list_drops().await.unwrap().len(), 1);
}

#[tokio::test]
async fn insert_committing_after_timeout_keeps_its_version() {
  let (engine, store, messenger) = scripted_engine(Insert::CommitLate).await;

  let err = engine.start_drop("C").await.unwrap_err();
  assert!(matches!(err, Error::PersistenceUnavailable(_)));
  assert!(matches!(messenger.edits_of("m1").as_slice(), [DropStatus::Failed { .. }]));

  // Let the abandoned insert land.
  tokio::time::sleep(Duration::from_millis(400)).await;
  let late = engine.store().list_drops().await.unwrap();
  assert_eq!(late.len(), 1);
  assert_eq!(late[0].version, 1);

  store.set_insert(Insert::Normal);
  let next = engine.start_drop("D").await.unwrap();
  assert_eq!(next.version, 2);

  // Both instances can be owned without a version collision.
  assert!(engine.attempt_claim(late[0].drop_id, "alice").await.unwrap().is_success());
  assert!(engine.attempt_claim(next.drop_id, "bob").await.unwrap().is_success());
}

// ─── Claims ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn claim_moves_drop_into_inventory() {
  let (engine, messenger) = engine().await;
  seed(&engine).await;
  let drop = engine.start_drop("C").await.unwrap();

  let outcome = engine.attempt_claim(drop.drop_id, "alice").await.unwrap();
  let ClaimOutcome::Success(instance) = outcome else {
    panic!("expected success, got {outcome:?}");
  };
  assert_eq!(instance.version, drop.version);
  assert_eq!(instance.serial, drop.serial);
  assert_eq!(instance.user_id, "alice");
  assert!(!instance.favorite);

  assert!(engine.get_drop(drop.drop_id).await.unwrap().is_none());
  assert!(!engine.monitor().is_armed(drop.drop_id));
  assert_eq!(
    messenger.edits_of(&drop.message_id),
    vec![DropStatus::Claimed { by: "alice".into() }]
  );

  let inventory = engine
    .ledger()
    .inventory("alice", PageQuery::default())
    .await
    .unwrap()
    .expect("inventory created on first claim");
  assert_eq!(inventory.total, 1);
  assert_eq!(inventory.cards[0].instance.serial, drop.serial);
  assert_eq!(inventory.cards[0].card.name, "Dragon Warrior");
}

#[tokio::test]
async fn second_claim_loses() {
  let (engine, _) = engine().await;
  seed(&engine).await;
  let drop = engine.start_drop("C").await.unwrap();

  assert!(engine.attempt_claim(drop.drop_id, "alice").await.unwrap().is_success());
  // The winner deleted the record, but the loss is still reported as one.
  let late = engine.attempt_claim(drop.drop_id, "bob").await.unwrap();
  assert!(matches!(late, ClaimOutcome::AlreadyClaimed));
  let by_message = engine.attempt_claim_by_message(&drop.message_id, "carol").await.unwrap();
  assert!(matches!(by_message, ClaimOutcome::AlreadyClaimed));
  assert!(
    engine
      .ledger()
      .inventory("bob", PageQuery::default())
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_have_one_winner() {
  let (engine, _) = engine().await;
  seed(&engine).await;
  let drop = engine.start_drop("C").await.unwrap();

  let tasks: Vec<_> = (0..10)
    .map(|i| {
      let engine = engine.clone();
      tokio::spawn(async move { engine.attempt_claim(drop.drop_id, &format!("user{i}")).await })
    })
    .collect();

  let mut winners = Vec::new();
  for (i, task) in tasks.into_iter().enumerate() {
    match task.await.unwrap().unwrap() {
      ClaimOutcome::Success(instance) => winners.push((i, instance)),
      ClaimOutcome::AlreadyClaimed => {}
      other => panic!("losing claim reported {other:?}"),
    }
  }
  assert_eq!(winners.len(), 1);

  let (i, instance) = &winners[0];
  let inventory = engine
    .ledger()
    .inventory(&format!("user{i}"), PageQuery::default())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(inventory.total, 1);
  assert_eq!(inventory.cards[0].instance.serial, instance.serial);
}

#[tokio::test]
async fn claim_after_window_is_expired() {
  let clock = Arc::new(ManualClock::new(Utc::now()));
  let (engine, _) = engine_with(
    StaticRenderer::default(),
    clock.clone(),
    EngineConfig::default(),
  )
  .await;
  seed(&engine).await;
  let drop = engine.start_drop("C").await.unwrap();

  clock.advance(TimeDelta::seconds(61));
  let outcome = engine.attempt_claim(drop.drop_id, "alice").await.unwrap();
  assert!(matches!(outcome, ClaimOutcome::Expired));

  // The monitor has not run yet, so the record is still there, unclaimed.
  let stored = engine.get_drop(drop.drop_id).await.unwrap().unwrap();
  assert!(!stored.claimed);
}

#[tokio::test]
async fn claim_by_message_id() {
  let (engine, _) = engine().await;
  seed(&engine).await;
  let drop = engine.start_drop("C").await.unwrap();

  let outcome = engine.attempt_claim_by_message(&drop.message_id, "alice").await.unwrap();
  assert!(outcome.is_success());

  let missing = engine.attempt_claim_by_message("nope", "alice").await.unwrap();
  assert!(matches!(missing, ClaimOutcome::NotFound));
}

#[tokio::test]
async fn claim_of_unknown_drop_is_not_found() {
  let (engine, _) = engine().await;
  let outcome = engine.attempt_claim(Uuid::new_v4(), "alice").await.unwrap();
  assert!(matches!(outcome, ClaimOutcome::NotFound));
}

#[tokio::test]
async fn claimed_versions_increase_per_card() {
  let (engine, _) = engine().await;
  seed(&engine).await;

  let mut versions = Vec::new();
  for user in ["alice", "bob", "carol"] {
    let drop = engine.start_drop("C").await.unwrap();
    let ClaimOutcome::Success(instance) = engine.attempt_claim(drop.drop_id, user).await.unwrap()
    else {
      panic!("claim failed");
    };
    versions.push(instance.version);
  }
  assert_eq!(versions, vec![1, 2, 3]);
}

// ─── Expiry ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unclaimed_drop_expires_after_window() {
  let (engine, messenger) = engine_with(
    StaticRenderer::default(),
    Arc::new(SystemClock),
    config(Duration::from_millis(200)),
  )
  .await;
  seed(&engine).await;
  let drop = engine.start_drop("C").await.unwrap();

  tokio::time::sleep(Duration::from_millis(800)).await;

  assert!(engine.get_drop(drop.drop_id).await.unwrap().is_none());
  assert!(!engine.monitor().is_armed(drop.drop_id));
  assert_eq!(messenger.edits_of(&drop.message_id), vec![DropStatus::Expired]);

  // Claims on the retired drop say it expired.
  let late = engine.attempt_claim(drop.drop_id, "alice").await.unwrap();
  assert!(matches!(late, ClaimOutcome::Expired));
  let by_message = engine.attempt_claim_by_message(&drop.message_id, "alice").await.unwrap();
  assert!(matches!(by_message, ClaimOutcome::Expired));

  // The expired drop gave its version back.
  let next = engine.start_drop("C").await.unwrap();
  assert_eq!(next.version, 1);
  assert_ne!(next.serial, drop.serial);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn past_due_timers_leave_no_entries() {
  let (engine, _) = engine().await;
  let card = seed(&engine).await;
  let past = Utc::now() - TimeDelta::seconds(120);

  let mut drops = Vec::new();
  for i in 0..32 {
    let drop = persist_drop(&engine, &card, &format!("c{i}"), &format!("DRA-{i:04}"), past).await;
    engine.monitor().arm(&drop);
    drops.push(drop);
  }
  // Re-arming replaces the entry instead of adding one.
  engine.monitor().arm(&drops[0]);

  tokio::time::sleep(Duration::from_millis(500)).await;
  assert_eq!(engine.monitor().armed_count(), 0);
  assert!(engine.store().list_drops().await.unwrap().is_empty());
}

#[tokio::test]
async fn timer_after_claim_is_a_no_op() {
  let (engine, messenger) = engine().await;
  seed(&engine).await;
  let drop = engine.start_drop("C").await.unwrap();
  assert!(engine.attempt_claim(drop.drop_id, "alice").await.unwrap().is_success());

  assert!(!engine.monitor().retire(drop.drop_id).await.unwrap());
  assert!(!engine.monitor().cancel(drop.drop_id));
  assert_eq!(
    messenger.edits_of(&drop.message_id),
    vec![DropStatus::Claimed { by: "alice".into() }]
  );
}

#[tokio::test]
async fn retire_skips_a_claimed_record() {
  let (engine, _) = engine().await;
  seed(&engine).await;
  let drop = engine.start_drop("C").await.unwrap();

  // Claim straight through the store so the record is left in place.
  let attempt = engine
    .store()
    .claim_drop(drop.drop_id, "alice", Utc::now())
    .await
    .unwrap();
  assert!(matches!(attempt, ClaimAttempt::Won(_)));

  assert!(!engine.monitor().retire(drop.drop_id).await.unwrap());
  assert!(engine.get_drop(drop.drop_id).await.unwrap().unwrap().claimed);
}

// ─── Recovery ────────────────────────────────────────────────────────────────

async fn persist_drop(
  engine: &Engine,
  card: &CardDefinition,
  channel: &str,
  serial: &str,
  created: DateTime<Utc>,
) -> ActiveDrop {
  let AllocateOutcome::Allocated { version } =
    engine.store().allocate(card.card_id, serial, created).await.unwrap()
  else {
    panic!("serial taken");
  };
  let input = NewDrop {
    card_id: card.card_id,
    channel_id: channel.into(),
    message_id: format!("msg-{channel}"),
    allocation: Allocation { version, serial: serial.into() },
    created_at: created,
    expires_at: created + TimeDelta::seconds(60),
  };
  match engine.store().create_drop(input).await.unwrap() {
    CreateDrop::Created(drop) => drop,
    CreateDrop::ChannelBusy(_) => panic!("channel busy"),
  }
}

#[tokio::test]
async fn recover_handles_leftover_drops() {
  let (engine, messenger) = engine().await;
  let card = seed(&engine).await;
  let now = Utc::now();

  let stale = persist_drop(&engine, &card, "stale", "DRA-0001", now - TimeDelta::seconds(120)).await;
  let claimed = persist_drop(&engine, &card, "claimed", "DRA-0002", now).await;
  let live = persist_drop(&engine, &card, "live", "DRA-0003", now).await;
  engine
    .store()
    .claim_drop(claimed.drop_id, "alice", now)
    .await
    .unwrap();

  let report = engine.recover().await.unwrap();
  assert_eq!(report.expired, 1);
  assert_eq!(report.completed, 1);
  assert_eq!(report.resumed, 1);

  assert!(engine.get_drop(stale.drop_id).await.unwrap().is_none());
  assert_eq!(messenger.edits_of(&stale.message_id), vec![DropStatus::Expired]);

  assert!(engine.get_drop(claimed.drop_id).await.unwrap().is_none());
  let inventory = engine
    .ledger()
    .inventory("alice", PageQuery::default())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(inventory.cards[0].instance.serial, "DRA-0002");

  assert!(engine.monitor().is_armed(live.drop_id));

  // A second pass finds nothing new to do.
  let again = engine.recover().await.unwrap();
  assert_eq!(again, crate::RecoveryReport::default());
}

#[tokio::test]
async fn completing_twice_records_once() {
  let (engine, _) = engine().await;
  let card = seed(&engine).await;
  let drop = persist_drop(&engine, &card, "C", "DRA-0001", Utc::now()).await;
  engine
    .store()
    .claim_drop(drop.drop_id, "alice", Utc::now())
    .await
    .unwrap();

  let first = engine.arbiter.complete(&drop, "alice").await.unwrap();
  let second = engine.arbiter.complete(&drop, "alice").await.unwrap();
  assert_eq!(first.serial, second.serial);

  let inventory = engine
    .ledger()
    .inventory("alice", PageQuery::default())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(inventory.total, 1);

  let err = engine.arbiter.complete(&drop, "bob").await.unwrap_err();
  assert!(matches!(err, Error::LedgerConflict(_)));
}

// ─── Catalog and ledger ──────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_card_names_conflict() {
  let (engine, _) = engine().await;
  seed(&engine).await;

  let mut shouty = dragon_warrior();
  shouty.name = "  DRAGON WARRIOR ".into();
  let err = engine.add_card(shouty).await.unwrap_err();
  assert!(matches!(err, Error::CardNameConflict(name) if name == "DRAGON WARRIOR"));

  let mut blank = dragon_warrior();
  blank.name = "   ".into();
  assert!(matches!(engine.add_card(blank).await, Err(Error::InvalidCard(_))));

  assert_eq!(engine.list_cards().await.unwrap().len(), 1);
}

#[tokio::test]
async fn favorite_requires_ownership() {
  let (engine, _) = engine().await;
  seed(&engine).await;
  let drop = engine.start_drop("C").await.unwrap();
  engine.attempt_claim(drop.drop_id, "alice").await.unwrap();

  engine.ledger().set_favorite("alice", &drop.serial, true).await.unwrap();
  let inventory = engine
    .ledger()
    .inventory("alice", PageQuery::default())
    .await
    .unwrap()
    .unwrap();
  assert!(inventory.cards[0].instance.favorite);

  let err = engine
    .ledger()
    .set_favorite("bob", &drop.serial, true)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InstanceNotFound { .. }));
}
