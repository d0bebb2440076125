//! In-memory fakes for the outward-facing collaborators.

use std::{
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicU64, Ordering},
  },
  time::Duration,
};

use bytes::Bytes;
use deckdrop_core::surface::{DropAnnouncement, DropStatus, Messenger, Renderer};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct FakeError(pub &'static str);

// ─── Messenger ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
  Post { channel_id: String, message_id: String, title: String },
  Edit { message_id: String, status: DropStatus },
}

/// Assigns sequential message ids (`m1`, `m2`, ...) and records every call.
#[derive(Debug, Clone, Default)]
pub struct RecordingMessenger {
  sent:       Arc<Mutex<Vec<Sent>>>,
  next_id:    Arc<AtomicU64>,
  fail_posts: Arc<AtomicBool>,
}

impl RecordingMessenger {
  pub fn new() -> Self { Self::default() }

  pub fn fail_posts(&self, fail: bool) { self.fail_posts.store(fail, Ordering::SeqCst); }

  pub fn sent(&self) -> Vec<Sent> {
    self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
  }

  pub fn posts(&self) -> usize {
    self.sent().iter().filter(|s| matches!(s, Sent::Post { .. })).count()
  }

  /// Statuses the given message has been edited to, oldest first.
  pub fn edits_of(&self, message_id: &str) -> Vec<DropStatus> {
    self
      .sent()
      .into_iter()
      .filter_map(|s| match s {
        Sent::Edit { message_id: m, status } if m == message_id => Some(status),
        _ => None,
      })
      .collect()
  }

  fn record(&self, sent: Sent) {
    self.sent.lock().unwrap_or_else(|e| e.into_inner()).push(sent);
  }
}

impl Messenger for RecordingMessenger {
  type Error = FakeError;

  async fn post(
    &self,
    channel_id: &str,
    announcement: &DropAnnouncement,
  ) -> Result<String, FakeError> {
    if self.fail_posts.load(Ordering::SeqCst) {
      return Err(FakeError("messaging surface is down"));
    }
    let message_id = format!("m{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
    self.record(Sent::Post {
      channel_id: channel_id.to_owned(),
      message_id: message_id.clone(),
      title:      announcement.title(),
    });
    Ok(message_id)
  }

  async fn edit(&self, message_id: &str, announcement: &DropAnnouncement) -> Result<(), FakeError> {
    self.record(Sent::Edit {
      message_id: message_id.to_owned(),
      status:     announcement.status.clone(),
    });
    Ok(())
  }
}

// ─── Renderers ───────────────────────────────────────────────────────────────

/// Returns the same bytes for every render.
#[derive(Debug, Clone, Default)]
pub struct StaticRenderer(pub Bytes);

impl Renderer for StaticRenderer {
  type Error = FakeError;

  async fn render(&self, _: &str, _: u32, _: &str) -> Result<Bytes, FakeError> {
    Ok(self.0.clone())
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FailingRenderer;

impl Renderer for FailingRenderer {
  type Error = FakeError;

  async fn render(&self, _: &str, _: u32, _: &str) -> Result<Bytes, FakeError> {
    Err(FakeError("render service unavailable"))
  }
}

/// Sleeps before answering; used to trip the dependency timeout.
#[derive(Debug, Clone, Copy)]
pub struct SlowRenderer(pub Duration);

impl Renderer for SlowRenderer {
  type Error = FakeError;

  async fn render(&self, _: &str, _: u32, _: &str) -> Result<Bytes, FakeError> {
    tokio::time::sleep(self.0).await;
    Ok(Bytes::new())
  }
}
