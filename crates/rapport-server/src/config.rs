//! Runtime configuration, layered from `config.toml` and `RAPPORT_*`
//! environment variables.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use rapport_core::suggestion::DEFAULT_SELECTION_THRESHOLD;
use rapport_pipeline::{EngineConfig, http::EndpointConfig};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                String,
  #[serde(default = "default_port")]
  pub port:                u16,
  #[serde(default = "default_store_path")]
  pub store_path:          PathBuf,
  /// Root directory that artifact `audio_ref`s are resolved against.
  #[serde(default = "default_blob_dir")]
  pub blob_dir:            PathBuf,
  #[serde(default = "default_selection_threshold")]
  pub selection_threshold: f64,
  pub transcriber:         EndpointConfig,
  pub generator:           EndpointConfig,
}

fn default_host() -> String { "127.0.0.1".to_owned() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/rapport/rapport.db") }
fn default_blob_dir() -> PathBuf { PathBuf::from("~/.local/share/rapport/blobs") }
fn default_selection_threshold() -> f64 { DEFAULT_SELECTION_THRESHOLD }

impl ServerConfig {
  /// Read `path` (if it exists) under `RAPPORT_`-prefixed environment
  /// overrides. Nested keys use `__`, e.g. `RAPPORT_TRANSCRIBER__URL`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .set_default("transcriber.timeout_secs", 300)?
      .set_default("generator.timeout_secs", 120)?
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("RAPPORT")
          .prefix_separator("_")
          .separator("__"),
      )
      .build()
      .context("failed to read config file")?;

    let cfg: Self = settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")?;

    if !(0.0..=1.0).contains(&cfg.selection_threshold) {
      anyhow::bail!(
        "selection_threshold must be within [0, 1], got {}",
        cfg.selection_threshold
      );
    }
    Ok(cfg)
  }

  pub fn engine_config(&self) -> EngineConfig {
    EngineConfig {
      transcription_timeout: Duration::from_secs(self.transcriber.timeout_secs),
      generation_timeout: Duration::from_secs(self.generator.timeout_secs),
      ..EngineConfig::default()
    }
  }
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
