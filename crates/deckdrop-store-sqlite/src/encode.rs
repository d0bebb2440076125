//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that SQL text comparison orders them correctly.
//! UUIDs are stored as hyphenated lowercase strings; enums as their variant
//! names.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use deckdrop_core::{
  card::{CardDefinition, CardStats, CardType, Rarity},
  drop::ActiveDrop,
  inventory::OwnedCardInstance,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

fn decode_variant<T: FromStr>(column: &'static str, s: &str) -> Result<T> {
  T::from_str(s).map_err(|_| Error::UnknownVariant { column, value: s.to_owned() })
}

pub fn decode_card_type(s: &str) -> Result<CardType> { decode_variant("card_type", s) }

pub fn decode_rarity(s: &str) -> Result<Rarity> { decode_variant("rarity", s) }

// ─── Column lists ────────────────────────────────────────────────────────────

pub const CARD_COLUMNS: &str = "card_id, name, card_type, rarity, attack, defense, cost, \
                                image_url, description, created_by, created_at";

pub const DROP_COLUMNS: &str = "drop_id, card_id, channel_id, message_id, version, serial, \
                                created_at, expires_at, claimed, claimed_by";

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `cards` row, starting at column `offset`.
pub struct RawCard {
  pub card_id:     String,
  pub name:        String,
  pub card_type:   String,
  pub rarity:      String,
  pub attack:      u32,
  pub defense:     u32,
  pub cost:        u32,
  pub image_url:   String,
  pub description: String,
  pub created_by:  String,
  pub created_at:  String,
}

impl RawCard {
  pub fn from_row(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      card_id:     row.get(offset)?,
      name:        row.get(offset + 1)?,
      card_type:   row.get(offset + 2)?,
      rarity:      row.get(offset + 3)?,
      attack:      row.get(offset + 4)?,
      defense:     row.get(offset + 5)?,
      cost:        row.get(offset + 6)?,
      image_url:   row.get(offset + 7)?,
      description: row.get(offset + 8)?,
      created_by:  row.get(offset + 9)?,
      created_at:  row.get(offset + 10)?,
    })
  }

  pub fn into_card(self) -> Result<CardDefinition> {
    Ok(CardDefinition {
      card_id:     decode_uuid(&self.card_id)?,
      name:        self.name,
      card_type:   decode_card_type(&self.card_type)?,
      rarity:      decode_rarity(&self.rarity)?,
      stats:       CardStats {
        attack:  self.attack,
        defense: self.defense,
        cost:    self.cost,
      },
      image_url:   self.image_url,
      description: self.description,
      created_by:  self.created_by,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from an `active_drops` row.
pub struct RawDrop {
  pub drop_id:    String,
  pub card_id:    String,
  pub channel_id: String,
  pub message_id: String,
  pub version:    u32,
  pub serial:     String,
  pub created_at: String,
  pub expires_at: String,
  pub claimed:    bool,
  pub claimed_by: Option<String>,
}

impl RawDrop {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      drop_id:    row.get(0)?,
      card_id:    row.get(1)?,
      channel_id: row.get(2)?,
      message_id: row.get(3)?,
      version:    row.get(4)?,
      serial:     row.get(5)?,
      created_at: row.get(6)?,
      expires_at: row.get(7)?,
      claimed:    row.get(8)?,
      claimed_by: row.get(9)?,
    })
  }

  pub fn into_drop(self) -> Result<ActiveDrop> {
    Ok(ActiveDrop {
      drop_id:    decode_uuid(&self.drop_id)?,
      card_id:    decode_uuid(&self.card_id)?,
      channel_id: self.channel_id,
      message_id: self.message_id,
      version:    self.version,
      serial:     self.serial,
      created_at: decode_dt(&self.created_at)?,
      expires_at: decode_dt(&self.expires_at)?,
      claimed:    self.claimed,
      claimed_by: self.claimed_by,
    })
  }
}

/// An `owned_cards` row joined with its `cards` row.
pub struct RawEntry {
  pub serial:      String,
  pub user_id:     String,
  pub card_id:     String,
  pub version:     u32,
  pub obtained_at: String,
  pub favorite:    bool,
  pub card:        RawCard,
}

impl RawEntry {
  /// Expects the five `owned_cards` columns followed by [`CARD_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      serial:      row.get(0)?,
      user_id:     row.get(1)?,
      version:     row.get(2)?,
      obtained_at: row.get(3)?,
      favorite:    row.get(4)?,
      card_id:     row.get(5)?,
      card:        RawCard::from_row(row, 5)?,
    })
  }

  pub fn into_parts(self) -> Result<(OwnedCardInstance, CardDefinition)> {
    let instance = OwnedCardInstance {
      card_id:     decode_uuid(&self.card_id)?,
      version:     self.version,
      serial:      self.serial,
      user_id:     self.user_id,
      obtained_at: decode_dt(&self.obtained_at)?,
      favorite:    self.favorite,
    };
    Ok((instance, self.card.into_card()?))
  }
}
