//! deckdrop server binary.
//!
//! Reads `deckdrop.toml` (or the path given with `--config`) layered with
//! `DECKDROP_*` environment variables, opens the SQLite store, recovers drops
//! left over from a previous run and serves the JSON API over HTTP.

mod settings;
mod surfaces;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use axum::Router;
use clap::Parser;
use deckdrop_core::{
  clock::SystemClock,
  store::DropStore,
  surface::{Messenger, Renderer},
};
use deckdrop_engine::DropEngine;
use deckdrop_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::{
  settings::{ServerConfig, expand_tilde},
  surfaces::{CardRenderer, ChatMessenger},
};

#[derive(Parser)]
#[command(author, version, about = "deckdrop card drop server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "deckdrop.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("DECKDROP"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;
  let engine_cfg = server_cfg.engine().context("invalid engine settings")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  // Outbound adapters share one client; the engine bounds each call anyway.
  let client = reqwest::Client::builder()
    .timeout(server_cfg.dependency_timeout())
    .build()
    .context("failed to build http client")?;
  let messenger = ChatMessenger::from_config(&client, server_cfg.webhook_url.as_deref());
  let renderer = CardRenderer::from_config(&client, server_cfg.render_url.as_deref());
  if server_cfg.webhook_url.is_none() {
    tracing::warn!("no webhook_url configured; drops will only be logged");
  }

  let engine = DropEngine::new(
    store,
    messenger,
    renderer,
    Arc::new(SystemClock),
    engine_cfg,
  );

  engine
    .recover()
    .await
    .context("failed to recover persisted drops")?;
  tokio::spawn(sweep_forever(engine.clone(), server_cfg.clone()));

  let app = Router::new()
    .merge(deckdrop_api::api_router(engine))
    .layer(TraceLayer::new_for_http());
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  Ok(())
}

/// Periodically retire missed expiries and finish half-completed claims.
async fn sweep_forever<S, M, R>(engine: DropEngine<S, M, R>, cfg: ServerConfig)
where
  S: DropStore,
  M: Messenger,
  R: Renderer,
{
  let mut interval = tokio::time::interval(cfg.sweep_interval());
  // The first tick fires immediately and startup recovery already ran.
  interval.tick().await;
  loop {
    interval.tick().await;
    match engine.sweep().await {
      Ok(report) if report.expired + report.completed > 0 => {
        tracing::info!(expired = report.expired, completed = report.completed, "sweep");
      }
      Ok(_) => {}
      Err(e) => tracing::warn!(error = %e, "sweep failed"),
    }
  }
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::warn!(error = %e, "failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutting down");
}
