//! [`SqliteStore`]: the SQLite implementation of [`DropStore`].

use std::{path::Path, time::Duration};

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use deckdrop_core::{
  card::{CardDefinition, NewCard},
  drop::{ActiveDrop, AllocateOutcome, ClaimAttempt, CreateDrop, NewDrop},
  inventory::{
    InventoryEntry, LedgerAppend, OwnedCardInstance, PageQuery, UserInventory,
  },
  store::{AddCard, DropStore},
};

use crate::{
  Result,
  encode::{
    CARD_COLUMNS, DROP_COLUMNS, RawCard, RawDrop, RawEntry, decode_dt, decode_uuid,
    encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

/// How long a writer waits on another connection's lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// `resolved_drops.outcome` values.
const CLAIMED: &str = "claimed";
const EXPIRED: &str = "expired";

/// Why a conditional claim update matched nothing.
enum Resolution {
  /// Still in `active_drops`, with its `claimed` flag.
  Active(bool),
  /// Moved to `resolved_drops` with this outcome.
  Resolved(String),
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A deckdrop store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. Several
/// stores (or processes) may open the same file; the conditional statements
/// below stay correct because SQLite serialises writers.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn query_drop(&self, column: &'static str, key: String) -> Result<Option<ActiveDrop>> {
    let raw: Option<RawDrop> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {DROP_COLUMNS} FROM active_drops WHERE {column} = ?1"),
            rusqlite::params![key],
            RawDrop::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawDrop::into_drop).transpose()
  }
}

// ─── DropStore impl ──────────────────────────────────────────────────────────

impl DropStore for SqliteStore {
  type Error = crate::Error;

  async fn ping(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Catalog ───────────────────────────────────────────────────────────────

  async fn add_card(&self, card: NewCard, now: DateTime<Utc>) -> Result<AddCard> {
    let definition = CardDefinition {
      card_id:     Uuid::new_v4(),
      name:        card.name,
      card_type:   card.card_type,
      rarity:      card.rarity,
      stats:       card.stats,
      image_url:   card.image_url,
      description: card.description,
      created_by:  card.created_by,
      created_at:  now,
    };

    let id_str    = encode_uuid(definition.card_id);
    let name      = definition.name.clone();
    let card_type = definition.card_type.as_ref().to_owned();
    let rarity    = definition.rarity.as_ref().to_owned();
    let stats     = definition.stats;
    let image_url = definition.image_url.clone();
    let desc      = definition.description.clone();
    let creator   = definition.created_by.clone();
    let at_str    = encode_dt(now);

    let inserted = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "INSERT INTO cards (
             card_id, name, card_type, rarity, attack, defense, cost,
             image_url, description, created_by, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
           ON CONFLICT(name) DO NOTHING",
          rusqlite::params![
            id_str,
            name,
            card_type,
            rarity,
            stats.attack,
            stats.defense,
            stats.cost,
            image_url,
            desc,
            creator,
            at_str,
          ],
        )?;
        Ok(changed == 1)
      })
      .await?;

    Ok(if inserted { AddCard::Created(definition) } else { AddCard::NameTaken })
  }

  async fn get_card(&self, card_id: Uuid) -> Result<Option<CardDefinition>> {
    let id_str = encode_uuid(card_id);

    let raw: Option<RawCard> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {CARD_COLUMNS} FROM cards WHERE card_id = ?1"),
            rusqlite::params![id_str],
            |row| RawCard::from_row(row, 0),
          )
          .optional()?)
      })
      .await?;

    raw.map(RawCard::into_card).transpose()
  }

  async fn list_cards(&self) -> Result<Vec<CardDefinition>> {
    let raws: Vec<RawCard> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {CARD_COLUMNS} FROM cards ORDER BY name"))?;
        let rows = stmt
          .query_map([], |row| RawCard::from_row(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCard::into_card).collect()
  }

  async fn count_cards(&self) -> Result<u64> {
    let count: i64 = self
      .conn
      .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM cards", [], |r| r.get(0))?))
      .await?;
    Ok(count.max(0) as u64)
  }

  async fn random_card(&self) -> Result<Option<CardDefinition>> {
    let raw: Option<RawCard> = self
      .conn
      .call(|conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {CARD_COLUMNS} FROM cards ORDER BY RANDOM() LIMIT 1"),
            [],
            |row| RawCard::from_row(row, 0),
          )
          .optional()?)
      })
      .await?;

    raw.map(RawCard::into_card).transpose()
  }

  // ── Allocation ────────────────────────────────────────────────────────────

  async fn allocate(
    &self,
    card_id: Uuid,
    serial: &str,
    now: DateTime<Utc>,
  ) -> Result<AllocateOutcome> {
    let id_str = encode_uuid(card_id);
    let serial = serial.to_owned();
    let at_str = encode_dt(now);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let reserved = tx.execute(
          "INSERT OR IGNORE INTO serials (serial, card_id, allocated_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![serial, id_str, at_str],
        )?;
        if reserved == 0 {
          return Ok(AllocateOutcome::SerialTaken);
        }

        let version: u32 = tx.query_row(
          "INSERT INTO card_versions (card_id, last_version) VALUES (?1, 1)
           ON CONFLICT(card_id) DO UPDATE SET last_version = last_version + 1
           RETURNING last_version",
          rusqlite::params![id_str],
          |r| r.get(0),
        )?;

        tx.commit()?;
        Ok(AllocateOutcome::Allocated { version })
      })
      .await?;

    Ok(outcome)
  }

  async fn release_version(&self, card_id: Uuid, version: u32) -> Result<bool> {
    let id_str = encode_uuid(card_id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE card_versions SET last_version = last_version - 1
           WHERE card_id = ?1 AND last_version = ?2",
          rusqlite::params![id_str, version],
        )?)
      })
      .await?;

    Ok(changed == 1)
  }

  // ── Drops ─────────────────────────────────────────────────────────────────

  async fn find_live_drop(
    &self,
    channel_id: &str,
    now: DateTime<Utc>,
  ) -> Result<Option<ActiveDrop>> {
    let channel = channel_id.to_owned();
    let now_str = encode_dt(now);

    let raw: Option<RawDrop> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {DROP_COLUMNS} FROM active_drops
               WHERE channel_id = ?1 AND claimed = 0 AND expires_at > ?2
               ORDER BY expires_at DESC LIMIT 1"
            ),
            rusqlite::params![channel, now_str],
            RawDrop::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawDrop::into_drop).transpose()
  }

  async fn create_drop(&self, input: NewDrop) -> Result<CreateDrop> {
    let drop = ActiveDrop {
      drop_id:    Uuid::new_v4(),
      card_id:    input.card_id,
      channel_id: input.channel_id,
      message_id: input.message_id,
      version:    input.allocation.version,
      serial:     input.allocation.serial,
      created_at: input.created_at,
      expires_at: input.expires_at,
      claimed:    false,
      claimed_by: None,
    };

    let drop_id_str = encode_uuid(drop.drop_id);
    let card_id_str = encode_uuid(drop.card_id);
    let channel     = drop.channel_id.clone();
    let message_id  = drop.message_id.clone();
    let version     = drop.version;
    let serial      = drop.serial.clone();
    let created_str = encode_dt(drop.created_at);
    let expires_str = encode_dt(drop.expires_at);

    // The channel check and the insert share one write transaction, so two
    // racing creators cannot both observe an empty channel.
    let busy: Option<RawDrop> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let live = tx
          .query_row(
            &format!(
              "SELECT {DROP_COLUMNS} FROM active_drops
               WHERE channel_id = ?1 AND claimed = 0 AND expires_at > ?2
               LIMIT 1"
            ),
            rusqlite::params![channel, created_str],
            RawDrop::from_row,
          )
          .optional()?;
        if live.is_some() {
          return Ok(live);
        }

        tx.execute(
          "INSERT INTO active_drops (
             drop_id, card_id, channel_id, message_id, version, serial,
             created_at, expires_at, claimed, claimed_by
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, NULL)",
          rusqlite::params![
            drop_id_str,
            card_id_str,
            channel,
            message_id,
            version,
            serial,
            created_str,
            expires_str,
          ],
        )?;
        tx.commit()?;
        Ok(None)
      })
      .await?;

    match busy {
      Some(raw) => Ok(CreateDrop::ChannelBusy(raw.into_drop()?)),
      None => Ok(CreateDrop::Created(drop)),
    }
  }

  async fn get_drop(&self, drop_id: Uuid) -> Result<Option<ActiveDrop>> {
    self.query_drop("drop_id", encode_uuid(drop_id)).await
  }

  async fn find_drop_by_message(&self, message_id: &str) -> Result<Option<ActiveDrop>> {
    self.query_drop("message_id", message_id.to_owned()).await
  }

  async fn lookup_message(&self, message_id: &str) -> Result<Option<Uuid>> {
    let message_id = message_id.to_owned();

    let id: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT drop_id FROM active_drops WHERE message_id = ?1
             UNION ALL
             SELECT drop_id FROM resolved_drops WHERE message_id = ?1
             LIMIT 1",
            rusqlite::params![message_id],
            |r| r.get(0),
          )
          .optional()?)
      })
      .await?;

    id.as_deref().map(decode_uuid).transpose()
  }

  async fn list_drops(&self) -> Result<Vec<ActiveDrop>> {
    let raws: Vec<RawDrop> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {DROP_COLUMNS} FROM active_drops ORDER BY expires_at"
        ))?;
        let rows = stmt
          .query_map([], RawDrop::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDrop::into_drop).collect()
  }

  async fn claim_drop(
    &self,
    drop_id: Uuid,
    user_id: &str,
    now: DateTime<Utc>,
  ) -> Result<ClaimAttempt> {
    let id_str  = encode_uuid(drop_id);
    let user    = user_id.to_owned();
    let now_str = encode_dt(now);

    // `won` is decided solely by whether the conditional UPDATE touched the
    // row. The follow-up SELECT only explains a loss; it decides nothing.
    let (won, resolution): (Option<RawDrop>, Option<Resolution>) = self
      .conn
      .call(move |conn| {
        let won = conn
          .query_row(
            &format!(
              "UPDATE active_drops SET claimed = 1, claimed_by = ?2
               WHERE drop_id = ?1 AND claimed = 0 AND expires_at > ?3
               RETURNING {DROP_COLUMNS}"
            ),
            rusqlite::params![id_str, user, now_str],
            RawDrop::from_row,
          )
          .optional()?;
        if won.is_some() {
          return Ok((won, None));
        }

        let claimed: Option<bool> = conn
          .query_row(
            "SELECT claimed FROM active_drops WHERE drop_id = ?1",
            rusqlite::params![id_str],
            |r| r.get(0),
          )
          .optional()?;
        if claimed.is_some() {
          return Ok((None, claimed.map(Resolution::Active)));
        }

        let outcome: Option<String> = conn
          .query_row(
            "SELECT outcome FROM resolved_drops WHERE drop_id = ?1",
            rusqlite::params![id_str],
            |r| r.get(0),
          )
          .optional()?;
        Ok((None, outcome.map(Resolution::Resolved)))
      })
      .await?;

    if let Some(raw) = won {
      return Ok(ClaimAttempt::Won(raw.into_drop()?));
    }

    // An unclaimed row that the update skipped can only have expired.
    Ok(match resolution {
      None => ClaimAttempt::NotFound,
      Some(Resolution::Active(true)) => ClaimAttempt::AlreadyClaimed,
      Some(Resolution::Active(false)) => ClaimAttempt::Expired,
      Some(Resolution::Resolved(outcome)) if outcome == CLAIMED => ClaimAttempt::AlreadyClaimed,
      Some(Resolution::Resolved(_)) => ClaimAttempt::Expired,
    })
  }

  async fn expire_drop(&self, drop_id: Uuid) -> Result<Option<ActiveDrop>> {
    let id_str = encode_uuid(drop_id);

    let raw: Option<RawDrop> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let raw = tx
          .query_row(
            &format!(
              "DELETE FROM active_drops WHERE drop_id = ?1 AND claimed = 0
               RETURNING {DROP_COLUMNS}"
            ),
            rusqlite::params![id_str],
            RawDrop::from_row,
          )
          .optional()?;
        if let Some(raw) = &raw {
          tx.execute(
            "INSERT OR IGNORE INTO resolved_drops (drop_id, message_id, outcome)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![raw.drop_id, raw.message_id, EXPIRED],
          )?;
        }
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.map(RawDrop::into_drop).transpose()
  }

  async fn delete_drop(&self, drop_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(drop_id);

    let changed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
          "INSERT OR IGNORE INTO resolved_drops (drop_id, message_id, outcome)
           SELECT drop_id, message_id, CASE claimed WHEN 1 THEN ?2 ELSE ?3 END
           FROM active_drops WHERE drop_id = ?1",
          rusqlite::params![id_str, CLAIMED, EXPIRED],
        )?;
        let changed = tx.execute(
          "DELETE FROM active_drops WHERE drop_id = ?1",
          rusqlite::params![id_str],
        )?;
        tx.commit()?;
        Ok(changed)
      })
      .await?;

    Ok(changed == 1)
  }

  // ── Ledger ────────────────────────────────────────────────────────────────

  async fn append_instance(&self, instance: &OwnedCardInstance) -> Result<LedgerAppend> {
    let serial      = instance.serial.clone();
    let user        = instance.user_id.clone();
    let card_id_str = encode_uuid(instance.card_id);
    let version     = instance.version;
    let at_str      = encode_dt(instance.obtained_at);
    let favorite    = instance.favorite;

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let owner: Option<String> = tx
          .query_row(
            "SELECT user_id FROM owned_cards WHERE serial = ?1",
            rusqlite::params![serial],
            |r| r.get(0),
          )
          .optional()?;
        match owner {
          Some(o) if o == user => return Ok(LedgerAppend::AlreadyRecorded),
          Some(_) => return Ok(LedgerAppend::OwnedElsewhere),
          None => {}
        }

        tx.execute(
          "INSERT OR IGNORE INTO inventories (user_id, created_at) VALUES (?1, ?2)",
          rusqlite::params![user, at_str],
        )?;
        tx.execute(
          "INSERT INTO owned_cards (serial, user_id, card_id, version, obtained_at, favorite)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![serial, user, card_id_str, version, at_str, favorite],
        )?;
        tx.commit()?;
        Ok(LedgerAppend::Appended)
      })
      .await?;

    Ok(outcome)
  }

  async fn get_inventory(
    &self,
    user_id: &str,
    page: PageQuery,
  ) -> Result<Option<UserInventory>> {
    let user   = user_id.to_owned();
    let limit  = i64::try_from(page.limit()).unwrap_or(i64::MAX);
    let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);

    type Header = (String, i64);
    let (header, raws): (Option<Header>, Vec<RawEntry>) = self
      .conn
      .call(move |conn| {
        let header: Option<Header> = conn
          .query_row(
            "SELECT i.created_at, (SELECT COUNT(*) FROM owned_cards o WHERE o.user_id = i.user_id)
             FROM inventories i WHERE i.user_id = ?1",
            rusqlite::params![user],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?;
        if header.is_none() {
          return Ok((None, Vec::new()));
        }

        let card_columns = CARD_COLUMNS
          .split(", ")
          .map(|c| format!("c.{}", c.trim()))
          .collect::<Vec<_>>()
          .join(", ");
        let mut stmt = conn.prepare(&format!(
          "SELECT o.serial, o.user_id, o.version, o.obtained_at, o.favorite, {card_columns}
           FROM owned_cards o
           JOIN cards c ON c.card_id = o.card_id
           WHERE o.user_id = ?1
           ORDER BY CASE c.rarity
                      WHEN 'Legendary' THEN 0
                      WHEN 'Epic'      THEN 1
                      WHEN 'Rare'      THEN 2
                      WHEN 'Uncommon'  THEN 3
                      ELSE 4
                    END,
                    o.obtained_at DESC
           LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![user, limit, offset], RawEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((header, rows))
      })
      .await?;

    let Some((created_at, total)) = header else {
      return Ok(None);
    };

    let cards = raws
      .into_iter()
      .map(|raw| {
        let (instance, card) = raw.into_parts()?;
        Ok(InventoryEntry { instance, card })
      })
      .collect::<Result<Vec<_>>>()?;

    Ok(Some(UserInventory {
      user_id: user_id.to_owned(),
      created_at: decode_dt(&created_at)?,
      total: total.max(0) as usize,
      cards,
    }))
  }

  async fn set_favorite(&self, user_id: &str, serial: &str, favorite: bool) -> Result<bool> {
    let user   = user_id.to_owned();
    let serial = serial.to_owned();

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE owned_cards SET favorite = ?3 WHERE user_id = ?1 AND serial = ?2",
          rusqlite::params![user, serial, favorite],
        )?)
      })
      .await?;

    Ok(changed == 1)
  }
}
