//! rapport-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store, connects the HTTP transcription and suggestion workers, and serves
//! the review API over HTTP.

mod config;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use rapport_api::AppState;
use rapport_pipeline::{
  Backends, Engine,
  blob::FsBlobStore,
  http::{HttpGenerator, HttpTranscriber},
};
use rapport_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::{ServerConfig, expand_tilde};

#[derive(Parser)]
#[command(author, version, about = "Rapport artifact pipeline and review API")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

/// SQLite persistence, HTTP workers, and blobs on the local filesystem.
struct Production;

impl Backends for Production {
  type Store = SqliteStore;
  type Transcriber = HttpTranscriber;
  type Generator = HttpGenerator;
  type Blobs = FsBlobStore;
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = ServerConfig::load(&cli.config)?;

  let store_path = expand_tilde(&cfg.store_path);
  if let Some(parent) = store_path.parent() {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let transcriber = HttpTranscriber::new(cfg.transcriber.clone())
    .context("failed to build transcriber client")?;
  let generator =
    HttpGenerator::new(cfg.generator.clone()).context("failed to build generator client")?;
  let blobs = FsBlobStore::new(expand_tilde(&cfg.blob_dir));

  let engine: Arc<Engine<Production>> = Arc::new(Engine::new(
    store,
    transcriber,
    generator,
    blobs,
    cfg.engine_config(),
  ));
  let state = AppState { engine, selection_threshold: cfg.selection_threshold };

  let app = axum::Router::new()
    .nest("/api", rapport_api::api_router(state))
    .layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", cfg.host, cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
