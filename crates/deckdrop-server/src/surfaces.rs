//! Outbound adapters: the chat webhook drops are announced through and the
//! card render service.

use bytes::Bytes;
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use deckdrop_core::surface::{DropAnnouncement, Messenger, Renderer};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SurfaceError {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("webhook response did not include a message id")]
  MissingMessageId,
}

// ─── Payload ─────────────────────────────────────────────────────────────────

/// JSON body sent to the chat webhook for both posts and edits.
#[derive(Debug, Serialize)]
pub struct MessagePayload<'a> {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub channel_id:   Option<&'a str>,
  pub title:        String,
  pub description:  &'a str,
  pub color:        u32,
  pub card_type:    &'a str,
  pub rarity:       &'a str,
  pub attack:       u32,
  pub defense:      u32,
  pub cost:         u32,
  pub version:      u32,
  pub serial:       &'a str,
  pub footer:       String,
  pub claimable:    bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub image_base64: Option<String>,
}

impl<'a> MessagePayload<'a> {
  pub fn new(channel_id: Option<&'a str>, a: &'a DropAnnouncement) -> Self {
    Self {
      channel_id,
      title: a.title(),
      description: &a.card.description,
      color: a.card.rarity.color(),
      card_type: a.card.card_type.as_ref(),
      rarity: a.card.rarity.as_ref(),
      attack: a.card.stats.attack,
      defense: a.card.stats.defense,
      cost: a.card.stats.cost,
      version: a.version,
      serial: &a.serial,
      footer: a.footer(),
      claimable: a.is_claimable(),
      image_base64: a.image.as_ref().filter(|b| !b.is_empty()).map(|b| B64.encode(b)),
    }
  }
}

#[derive(Debug, Deserialize)]
struct PostResponse {
  id: Option<serde_json::Value>,
}

// ─── Messengers ──────────────────────────────────────────────────────────────

/// Posts to `{url}` and edits through `PATCH {url}/messages/{id}`.
#[derive(Debug, Clone)]
pub struct WebhookMessenger {
  client: reqwest::Client,
  url:    String,
}

impl WebhookMessenger {
  pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
    Self { client, url: url.into().trim_end_matches('/').to_owned() }
  }

  async fn post(&self, channel_id: &str, a: &DropAnnouncement) -> Result<String, SurfaceError> {
    let resp: PostResponse = self
      .client
      .post(&self.url)
      .query(&[("wait", "true")])
      .json(&MessagePayload::new(Some(channel_id), a))
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;

    match resp.id {
      Some(serde_json::Value::String(id)) => Ok(id),
      Some(serde_json::Value::Number(id)) => Ok(id.to_string()),
      _ => Err(SurfaceError::MissingMessageId),
    }
  }

  async fn edit(&self, message_id: &str, a: &DropAnnouncement) -> Result<(), SurfaceError> {
    self
      .client
      .patch(format!("{}/messages/{message_id}", self.url))
      .json(&MessagePayload::new(None, a))
      .send()
      .await?
      .error_for_status()?;
    Ok(())
  }
}

/// Writes announcements to the log; used when no webhook is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMessenger;

impl LogMessenger {
  fn post(&self, channel_id: &str, a: &DropAnnouncement) -> String {
    let message_id = Uuid::new_v4().to_string();
    info!(%channel_id, %message_id, title = %a.title(), serial = %a.serial, "announce drop");
    message_id
  }

  fn edit(&self, message_id: &str, a: &DropAnnouncement) {
    info!(%message_id, title = %a.title(), footer = %a.footer(), "update drop");
  }
}

#[derive(Debug, Clone)]
pub enum ChatMessenger {
  Webhook(WebhookMessenger),
  Log(LogMessenger),
}

impl ChatMessenger {
  pub fn from_config(client: &reqwest::Client, webhook_url: Option<&str>) -> Self {
    match webhook_url {
      Some(url) => Self::Webhook(WebhookMessenger::new(client.clone(), url)),
      None => Self::Log(LogMessenger),
    }
  }
}

impl Messenger for ChatMessenger {
  type Error = SurfaceError;

  async fn post(
    &self,
    channel_id: &str,
    announcement: &DropAnnouncement,
  ) -> Result<String, SurfaceError> {
    match self {
      Self::Webhook(w) => w.post(channel_id, announcement).await,
      Self::Log(l) => Ok(l.post(channel_id, announcement)),
    }
  }

  async fn edit(&self, message_id: &str, announcement: &DropAnnouncement) -> Result<(), SurfaceError> {
    match self {
      Self::Webhook(w) => w.edit(message_id, announcement).await,
      Self::Log(l) => {
        l.edit(message_id, announcement);
        Ok(())
      }
    }
  }
}

// ─── Renderers ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct RenderRequest<'a> {
  base_image: &'a str,
  version:    u32,
  serial:     &'a str,
}

/// POSTs `{base_image, version, serial}` and takes the body as image bytes.
#[derive(Debug, Clone)]
pub struct HttpRenderer {
  client: reqwest::Client,
  url:    String,
}

impl HttpRenderer {
  pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
    Self { client, url: url.into() }
  }

  async fn render(&self, base_image: &str, version: u32, serial: &str) -> Result<Bytes, SurfaceError> {
    let bytes = self
      .client
      .post(&self.url)
      .json(&RenderRequest { base_image, version, serial })
      .send()
      .await?
      .error_for_status()?
      .bytes()
      .await?;
    Ok(bytes)
  }
}

#[derive(Debug, Clone)]
pub enum CardRenderer {
  Http(HttpRenderer),
  /// No render service: drops are announced without art.
  Passthrough,
}

impl CardRenderer {
  pub fn from_config(client: &reqwest::Client, render_url: Option<&str>) -> Self {
    match render_url {
      Some(url) => Self::Http(HttpRenderer::new(client.clone(), url)),
      None => Self::Passthrough,
    }
  }
}

impl Renderer for CardRenderer {
  type Error = SurfaceError;

  async fn render(&self, base_image: &str, version: u32, serial: &str) -> Result<Bytes, SurfaceError> {
    match self {
      Self::Http(h) => h.render(base_image, version, serial).await,
      Self::Passthrough => Ok(Bytes::new()),
    }
  }
}
