//! Runtime server configuration, deserialised from `deckdrop.toml` and
//! `DECKDROP_*` environment variables.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::bail;
use deckdrop_engine::{EngineConfig, MAX_CLAIM_WINDOW};
use serde::Deserialize;

/// Widest serial suffix accepted, in random bytes.
const MAX_SERIAL_SUFFIX_BYTES: usize = 16;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                    String,
  pub port:                    u16,
  pub store_path:              PathBuf,
  pub claim_window_secs:       u64,
  pub dependency_timeout_secs: u64,
  pub serial_suffix_bytes:     usize,
  pub sweep_interval_secs:     u64,
  /// Chat webhook drops are announced through. Announcements are only
  /// logged when unset.
  pub webhook_url:             Option<String>,
  /// Card render service. Drops go out without art when unset.
  pub render_url:              Option<String>,
}

impl Default for ServerConfig {
  fn default() -> Self {
    let engine = EngineConfig::default();
    Self {
      host:                    "127.0.0.1".to_string(),
      port:                    8080,
      store_path:              PathBuf::from("~/.local/share/deckdrop/deckdrop.db"),
      claim_window_secs:       engine.claim_window.as_secs(),
      dependency_timeout_secs: engine.dependency_timeout.as_secs(),
      serial_suffix_bytes:     engine.serial_suffix_bytes,
      sweep_interval_secs:     30,
      webhook_url:             None,
      render_url:              None,
    }
  }
}

impl ServerConfig {
  /// Engine settings, rejecting values the lifecycle cannot schedule.
  pub fn engine(&self) -> anyhow::Result<EngineConfig> {
    let max_window = MAX_CLAIM_WINDOW.as_secs();
    if !(1..=max_window).contains(&self.claim_window_secs) {
      bail!("claim_window_secs must be between 1 and {max_window}, got {}", self.claim_window_secs);
    }
    if self.dependency_timeout_secs == 0 {
      bail!("dependency_timeout_secs must be at least 1");
    }
    if !(1..=MAX_SERIAL_SUFFIX_BYTES).contains(&self.serial_suffix_bytes) {
      bail!(
        "serial_suffix_bytes must be between 1 and {MAX_SERIAL_SUFFIX_BYTES}, got {}",
        self.serial_suffix_bytes
      );
    }

    Ok(EngineConfig {
      claim_window:        Duration::from_secs(self.claim_window_secs),
      dependency_timeout:  self.dependency_timeout(),
      serial_suffix_bytes: self.serial_suffix_bytes,
    })
  }

  pub fn dependency_timeout(&self) -> Duration {
    Duration::from_secs(self.dependency_timeout_secs)
  }

  pub fn sweep_interval(&self) -> Duration {
    Duration::from_secs(self.sweep_interval_secs.max(1))
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
