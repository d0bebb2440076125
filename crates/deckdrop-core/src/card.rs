//! Card definitions: the immutable templates that drops are minted from.
//!
//! Definitions are created by the catalog surface and never mutated by the
//! drop lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

pub const MAX_NAME_LEN: usize = 50;
pub const MAX_DESCRIPTION_LEN: usize = 500;

// ─── Classification ──────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumIter,
  EnumString,
)]
pub enum CardType {
  Character,
  Spell,
  Item,
  Environment,
}

/// Presentation tier of a card. Ordered from most to least common, so
/// `Rarity::Legendary > Rarity::Common`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Default,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumIter,
  EnumString,
)]
pub enum Rarity {
  #[default]
  Common,
  Uncommon,
  Rare,
  Epic,
  Legendary,
}

impl Rarity {
  /// Accent colour used when a drop of this rarity is surfaced.
  pub fn color(self) -> u32 {
    match self {
      Self::Common => 0x95a5a6,
      Self::Uncommon => 0x2ecc71,
      Self::Rare => 0x3498db,
      Self::Epic => 0x9b59b6,
      Self::Legendary => 0xf1c40f,
    }
  }
}

// ─── Definition ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardStats {
  pub attack:  u32,
  pub defense: u32,
  pub cost:    u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDefinition {
  pub card_id:     Uuid,
  /// Unique across the catalog, compared case-insensitively.
  pub name:        String,
  pub card_type:   CardType,
  pub rarity:      Rarity,
  pub stats:       CardStats,
  /// Base artwork handed to the render service.
  pub image_url:   String,
  pub description: String,
  pub created_by:  String,
  pub created_at:  DateTime<Utc>,
}

// ─── NewCard ─────────────────────────────────────────────────────────────────

/// Input to [`crate::store::DropStore::add_card`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewCard {
  pub name:        String,
  pub card_type:   CardType,
  #[serde(default)]
  pub rarity:      Rarity,
  pub image_url:   String,
  pub description: String,
  #[serde(default)]
  pub stats:       CardStats,
  pub created_by:  String,
}

impl NewCard {
  /// Trim free-text fields and check them against the catalog limits.
  pub fn validate(mut self) -> Result<Self> {
    self.name = self.name.trim().to_owned();
    self.description = self.description.trim().to_owned();
    self.image_url = self.image_url.trim().to_owned();

    if self.name.is_empty() {
      return Err(Error::InvalidCard("card name is required".into()));
    }
    if self.name.chars().count() > MAX_NAME_LEN {
      return Err(Error::InvalidCard(format!(
        "card name cannot be longer than {MAX_NAME_LEN} characters"
      )));
    }
    if self.description.is_empty() {
      return Err(Error::InvalidCard("card description is required".into()));
    }
    if self.description.chars().count() > MAX_DESCRIPTION_LEN {
      return Err(Error::InvalidCard(format!(
        "description cannot be longer than {MAX_DESCRIPTION_LEN} characters"
      )));
    }
    if !is_image_url(&self.image_url) {
      return Err(Error::InvalidCard(format!(
        "{:?} is not a valid image URL",
        self.image_url
      )));
    }
    if self.created_by.trim().is_empty() {
      return Err(Error::InvalidCard("creator id is required".into()));
    }
    Ok(self)
  }
}

/// Accepts `http(s)://host.tld/...` with no whitespace.
fn is_image_url(url: &str) -> bool {
  let rest = url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url);
  let host = rest.split(['/', '?']).next().unwrap_or_default();
  !url.chars().any(char::is_whitespace)
    && host.contains('.')
    && !host.starts_with('.')
    && !host.ends_with('.')
}

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use super::*;

  fn dragon() -> NewCard {
    NewCard {
      name:        "  Dragon Warrior ".into(),
      card_type:   CardType::Character,
      rarity:      Rarity::Rare,
      image_url:   "https://example.com/dragon.png".into(),
      description: "A mighty dragon warrior".into(),
      stats:       CardStats { attack: 7, defense: 4, cost: 5 },
      created_by:  "admin".into(),
    }
  }

  #[test]
  fn validate_trims_name() {
    let card = dragon().validate().unwrap();
    assert_eq!(card.name, "Dragon Warrior");
  }

  #[test]
  fn validate_rejects_long_name() {
    let mut card = dragon();
    card.name = "x".repeat(MAX_NAME_LEN + 1);
    assert!(matches!(card.validate(), Err(Error::InvalidCard(_))));
  }

  #[test]
  fn validate_rejects_bad_url() {
    for url in ["not a url", "https://localhost", "ftp//x", ""] {
      let mut card = dragon();
      card.image_url = url.into();
      assert!(card.validate().is_err(), "accepted {url:?}");
    }
  }

  #[test]
  fn rarity_orders_legendary_highest() {
    assert!(Rarity::Legendary > Rarity::Epic);
    assert!(Rarity::Uncommon > Rarity::Common);
  }

  #[test]
  fn enums_parse_from_display() {
    assert_eq!(CardType::from_str("Spell").unwrap(), CardType::Spell);
    assert_eq!(Rarity::Epic.to_string(), "Epic");
    assert!(Rarity::from_str("Mythic").is_err());
  }
}
