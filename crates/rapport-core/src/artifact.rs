//! Artifacts: persisted units of raw evidence about a contact.
//!
//! The payload of an artifact never changes after ingestion. Only its two
//! processing stages move, and only through the transitions in
//! [`crate::lifecycle`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

// ─── Kind ────────────────────────────────────────────────────────────────────

/// The kind of evidence an artifact carries.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ArtifactKind {
  VoiceMemo,
  Email,
  SocialProfile,
  Meeting,
  Note,
  Document,
}

impl ArtifactKind {
  /// Whether raw media must be turned into text before suggestions can be
  /// generated.
  pub fn requires_extraction(self) -> bool { matches!(self, Self::VoiceMemo) }
}

// ─── Stages ──────────────────────────────────────────────────────────────────

/// One of the two sequential processing stages.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
  /// Transcription of raw media into text.
  Extraction,
  /// Derivation of proposed contact edits.
  Ai,
}

impl Stage {
  /// The `metadata` key under which this stage's failure reason is stored.
  pub fn error_key(self) -> &'static str {
    match self {
      Self::Extraction => "extraction_error",
      Self::Ai => "ai_error",
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StageStatus {
  #[default]
  Pending,
  Processing,
  Completed,
  Failed,
}

/// Progress of a single stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageState {
  pub status:       StageStatus,
  pub started_at:   Option<DateTime<Utc>>,
  pub completed_at: Option<DateTime<Utc>>,
  /// The run allowed to complete this stage. Cleared on reset, so results
  /// from a superseded run are discarded.
  pub run_id:       Option<Uuid>,
}

impl StageState {
  pub fn pending() -> Self { Self::default() }

  /// A stage that needed no work and is complete as of `at`.
  pub fn not_required(at: DateTime<Utc>) -> Self {
    Self {
      status:       StageStatus::Completed,
      started_at:   None,
      completed_at: Some(at),
      run_id:       None,
    }
  }
}

// ─── Artifact ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
  pub artifact_id:   Uuid,
  /// The owning user; only they may reprocess or delete the artifact.
  pub user_id:       Uuid,
  pub contact_id:    Option<Uuid>,
  pub kind:          ArtifactKind,
  pub content:       Option<String>,
  /// Type-specific metadata. Stage failure reasons live here too.
  pub metadata:      serde_json::Map<String, serde_json::Value>,
  pub transcript:    Option<String>,
  pub duration_secs: Option<f64>,
  /// Reference into the blob store for audio or file payloads.
  pub audio_ref:     Option<String>,
  pub extraction:    StageState,
  pub ai:            StageState,
  /// Incremented by the store on every write; used for compare-and-swap.
  pub revision:      i64,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

impl Artifact {
  pub fn stage(&self, stage: Stage) -> &StageState {
    match stage {
      Stage::Extraction => &self.extraction,
      Stage::Ai => &self.ai,
    }
  }

  pub fn stage_mut(&mut self, stage: Stage) -> &mut StageState {
    match stage {
      Stage::Extraction => &mut self.extraction,
      Stage::Ai => &mut self.ai,
    }
  }

  /// The text the suggestion generator reads: the transcript if there is
  /// one, otherwise the free-text content.
  pub fn source_text(&self) -> Option<&str> {
    self
      .transcript
      .as_deref()
      .or(self.content.as_deref())
      .filter(|t| !t.trim().is_empty())
  }

  /// The recorded reason the stage failed, if any.
  pub fn failure_reason(&self, stage: Stage) -> Option<&str> {
    self.metadata.get(stage.error_key()).and_then(|v| v.as_str())
  }
}

// ─── NewArtifact ─────────────────────────────────────────────────────────────

/// Input to [`crate::store::ContactStore::add_artifact`].
#[derive(Debug, Clone)]
pub struct NewArtifact {
  pub user_id:    Uuid,
  pub contact_id: Option<Uuid>,
  pub kind:       ArtifactKind,
  pub content:    Option<String>,
  pub metadata:   serde_json::Map<String, serde_json::Value>,
  pub audio_ref:  Option<String>,
}

impl NewArtifact {
  pub fn new(user_id: Uuid, kind: ArtifactKind) -> Self {
    Self {
      user_id,
      contact_id: None,
      kind,
      content: None,
      metadata: serde_json::Map::new(),
      audio_ref: None,
    }
  }

  /// Build the stored artifact. Kinds without an extraction stage start with
  /// extraction already completed so the AI stage is armed immediately.
  pub fn into_artifact(self, now: DateTime<Utc>) -> Artifact {
    let extraction = if self.kind.requires_extraction() {
      StageState::pending()
    } else {
      StageState::not_required(now)
    };

    Artifact {
      artifact_id: Uuid::new_v4(),
      user_id: self.user_id,
      contact_id: self.contact_id,
      kind: self.kind,
      content: self.content,
      metadata: self.metadata,
      transcript: None,
      duration_secs: None,
      audio_ref: self.audio_ref,
      extraction,
      ai: StageState::pending(),
      revision: 0,
      created_at: now,
      updated_at: now,
    }
  }
}
