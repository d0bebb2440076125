//! The outward-facing collaborators: where drops are announced and how their
//! card art is produced.

use std::{future::Future, time::Duration};

use bytes::Bytes;
use serde::Serialize;

use crate::card::CardDefinition;

/// What the surfaced message currently says about its drop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DropStatus {
  Open { expires_in_secs: u64 },
  Claimed { by: String },
  Expired,
  /// The drop could not be recorded after it was announced.
  Failed { reason: String },
}

/// Everything a messaging surface needs to render one drop message.
#[derive(Debug, Clone)]
pub struct DropAnnouncement {
  pub card:    CardDefinition,
  pub version: u32,
  pub serial:  String,
  pub status:  DropStatus,
  /// Watermarked art; only present on the initial post.
  pub image:   Option<Bytes>,
}

impl DropAnnouncement {
  pub fn open(
    card: CardDefinition,
    version: u32,
    serial: String,
    window: Duration,
    image: Bytes,
  ) -> Self {
    Self {
      card,
      version,
      serial,
      status: DropStatus::Open { expires_in_secs: window.as_secs() },
      image: Some(image),
    }
  }

  /// The same drop with a new status and no re-upload of the art.
  pub fn with_status(&self, status: DropStatus) -> Self {
    Self { status, image: None, ..self.clone() }
  }

  pub fn title(&self) -> String {
    let base = format!("🎴 {} (v{})", self.card.name, self.version);
    match &self.status {
      DropStatus::Open { .. } => base,
      DropStatus::Claimed { .. } => format!("{base} - CLAIMED"),
      DropStatus::Expired => format!("{base} - EXPIRED"),
      DropStatus::Failed { .. } => format!("{base} - UNAVAILABLE"),
    }
  }

  pub fn footer(&self) -> String {
    match &self.status {
      DropStatus::Open { expires_in_secs } => {
        format!("Click the button below to claim! • Expires in {expires_in_secs} seconds")
      }
      DropStatus::Claimed { by } => format!("Claimed by {by}"),
      DropStatus::Expired => "This drop has expired".into(),
      DropStatus::Failed { reason } => format!("This drop was cancelled: {reason}"),
    }
  }

  /// Whether the claim button should still be shown.
  pub fn is_claimable(&self) -> bool {
    matches!(self.status, DropStatus::Open { .. })
  }
}

/// Posts and edits drop announcements in chat channels.
pub trait Messenger: Send + Sync + 'static {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Post a new announcement and return the surface's message identifier.
  fn post<'a>(
    &'a self,
    channel_id: &'a str,
    announcement: &'a DropAnnouncement,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'a;

  fn edit<'a>(
    &'a self,
    message_id: &'a str,
    announcement: &'a DropAnnouncement,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

/// Watermarks a card's base image with its version and serial.
pub trait Renderer: Send + Sync + 'static {
  type Error: std::error::Error + Send + Sync + 'static;

  fn render<'a>(
    &'a self,
    base_image: &'a str,
    version: u32,
    serial: &'a str,
  ) -> impl Future<Output = Result<Bytes, Self::Error>> + Send + 'a;
}
