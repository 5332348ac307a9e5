//! JSON-over-HTTP clients for the worker contracts.
//!
//! Each client `POST`s the request body as JSON to its configured URL and
//! expects the matching response body back. Both are cheap to clone, since
//! the inner [`reqwest::Client`] is `Arc`-based.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::worker::{
  GenerationRequest, GenerationResponse, SuggestionGenerator, Transcriber,
  TranscriptionRequest, TranscriptionResponse, WorkerError,
};

/// Where a worker lives and how long to wait for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
  pub url:          String,
  /// Sent as a bearer token when present.
  #[serde(default)]
  pub api_key:      Option<String>,
  pub timeout_secs: u64,
}

impl EndpointConfig {
  pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }
}

/// The shared request path of both clients.
#[derive(Debug, Clone)]
struct JsonEndpoint {
  client: Client,
  config: EndpointConfig,
}

impl JsonEndpoint {
  fn new(config: EndpointConfig) -> Result<Self, reqwest::Error> {
    // Backstop only; the engine enforces the configured timeout itself.
    let client = Client::builder()
      .timeout(config.timeout() + Duration::from_secs(5))
      .build()?;
    Ok(Self { client, config })
  }

  async fn post<Req, Resp>(&self, body: &Req) -> Result<Resp, WorkerError>
  where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
  {
    let mut req = self.client.post(&self.config.url).json(body);
    if let Some(key) = &self.config.api_key {
      req = req.bearer_auth(key);
    }

    let resp = req.send().await.map_err(|e| {
      if e.is_timeout() {
        WorkerError::Timeout(self.config.timeout())
      } else {
        WorkerError::Upstream(format!("POST {} failed: {e}", self.config.url))
      }
    })?;

    let status = resp.status();
    if !status.is_success() {
      let detail = resp.text().await.unwrap_or_default();
      return Err(WorkerError::Upstream(format!(
        "POST {} → {status}: {}",
        self.config.url,
        detail.trim()
      )));
    }

    resp
      .json()
      .await
      .map_err(|e| WorkerError::Malformed(e.to_string()))
  }
}

// ─── Clients ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct HttpTranscriber(JsonEndpoint);

impl HttpTranscriber {
  pub fn new(config: EndpointConfig) -> Result<Self, reqwest::Error> {
    JsonEndpoint::new(config).map(Self)
  }
}

impl Transcriber for HttpTranscriber {
  async fn transcribe(
    &self,
    request: TranscriptionRequest,
  ) -> Result<TranscriptionResponse, WorkerError> {
    self.0.post(&request).await
  }
}

#[derive(Debug, Clone)]
pub struct HttpGenerator(JsonEndpoint);

impl HttpGenerator {
  pub fn new(config: EndpointConfig) -> Result<Self, reqwest::Error> {
    JsonEndpoint::new(config).map(Self)
  }
}

impl SuggestionGenerator for HttpGenerator {
  async fn generate(
    &self,
    request: GenerationRequest,
  ) -> Result<GenerationResponse, WorkerError> {
    self.0.post(&request).await
  }
}
