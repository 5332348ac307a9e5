//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as fixed-width RFC 3339 UTC strings, so they sort
//! lexically. Enums are stored as their snake_case names. Contexts, metadata,
//! provenance, suggestions and selections are stored as compact JSON. UUIDs
//! are stored as hyphenated lowercase strings.
//!
//! Each `Raw*` row type converts both ways: `encode` builds the owned column
//! values moved into a `tokio_rusqlite` call, and `into_*` decodes a row read
//! back out of one.

use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, SecondsFormat, Utc};
use rapport_core::{
  artifact::{Artifact, StageState},
  contact::Contact,
  suggestion::SuggestionBatch,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<&str>) -> Result<Option<Uuid>> {
  s.map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("bad timestamp {s:?}: {e}")))
}

fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_enum<T>(s: &str, what: &str) -> Result<T>
where
  T: FromStr,
  T::Err: Display,
{
  s.parse()
    .map_err(|e| Error::Decode(format!("unknown {what} {s:?}: {e}")))
}

// ─── Stage state ─────────────────────────────────────────────────────────────

/// The four columns one processing stage occupies in the `artifacts` table.
pub struct RawStage {
  pub status:       String,
  pub started_at:   Option<String>,
  pub completed_at: Option<String>,
  pub run_id:       Option<String>,
}

impl RawStage {
  pub fn encode(state: &StageState) -> Self {
    Self {
      status:       state.status.to_string(),
      started_at:   state.started_at.map(encode_dt),
      completed_at: state.completed_at.map(encode_dt),
      run_id:       state.run_id.map(encode_uuid),
    }
  }

  pub fn into_stage(self) -> Result<StageState> {
    Ok(StageState {
      status:       decode_enum(&self.status, "stage status")?,
      started_at:   decode_opt_dt(self.started_at.as_deref())?,
      completed_at: decode_opt_dt(self.completed_at.as_deref())?,
      run_id:       decode_opt_uuid(self.run_id.as_deref())?,
    })
  }
}

// ─── Artifact rows ───────────────────────────────────────────────────────────

/// Column list matching [`RawArtifact::from_row`].
pub const ARTIFACT_COLUMNS: &str = "
  artifact_id, user_id, contact_id, kind, content, metadata, transcript,
  duration_secs, audio_ref,
  extraction_status, extraction_started_at, extraction_completed_at, extraction_run_id,
  ai_status, ai_started_at, ai_completed_at, ai_run_id,
  revision, created_at, updated_at";

pub struct RawArtifact {
  pub artifact_id:   String,
  pub user_id:       String,
  pub contact_id:    Option<String>,
  pub kind:          String,
  pub content:       Option<String>,
  pub metadata:      String,
  pub transcript:    Option<String>,
  pub duration_secs: Option<f64>,
  pub audio_ref:     Option<String>,
  pub extraction:    RawStage,
  pub ai:            RawStage,
  pub revision:      i64,
  pub created_at:    String,
  pub updated_at:    String,
}

impl RawArtifact {
  pub fn encode(a: &Artifact) -> Result<Self> {
    Ok(Self {
      artifact_id:   encode_uuid(a.artifact_id),
      user_id:       encode_uuid(a.user_id),
      contact_id:    a.contact_id.map(encode_uuid),
      kind:          a.kind.to_string(),
      content:       a.content.clone(),
      metadata:      serde_json::to_string(&a.metadata)?,
      transcript:    a.transcript.clone(),
      duration_secs: a.duration_secs,
      audio_ref:     a.audio_ref.clone(),
      extraction:    RawStage::encode(&a.extraction),
      ai:            RawStage::encode(&a.ai),
      revision:      a.revision,
      created_at:    encode_dt(a.created_at),
      updated_at:    encode_dt(a.updated_at),
    })
  }

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      artifact_id:   row.get(0)?,
      user_id:       row.get(1)?,
      contact_id:    row.get(2)?,
      kind:          row.get(3)?,
      content:       row.get(4)?,
      metadata:      row.get(5)?,
      transcript:    row.get(6)?,
      duration_secs: row.get(7)?,
      audio_ref:     row.get(8)?,
      extraction:    RawStage {
        status:       row.get(9)?,
        started_at:   row.get(10)?,
        completed_at: row.get(11)?,
        run_id:       row.get(12)?,
      },
      ai:            RawStage {
        status:       row.get(13)?,
        started_at:   row.get(14)?,
        completed_at: row.get(15)?,
        run_id:       row.get(16)?,
      },
      revision:      row.get(17)?,
      created_at:    row.get(18)?,
      updated_at:    row.get(19)?,
    })
  }

  pub fn into_artifact(self) -> Result<Artifact> {
    Ok(Artifact {
      artifact_id:   decode_uuid(&self.artifact_id)?,
      user_id:       decode_uuid(&self.user_id)?,
      contact_id:    decode_opt_uuid(self.contact_id.as_deref())?,
      kind:          decode_enum(&self.kind, "artifact kind")?,
      content:       self.content,
      metadata:      serde_json::from_str(&self.metadata)?,
      transcript:    self.transcript,
      duration_secs: self.duration_secs,
      audio_ref:     self.audio_ref,
      extraction:    self.extraction.into_stage()?,
      ai:            self.ai.into_stage()?,
      revision:      self.revision,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Contact rows ────────────────────────────────────────────────────────────

/// Column list matching [`RawContact::from_row`].
pub const CONTACT_COLUMNS: &str = "
  contact_id, user_id, name, company, title, location, email, phone,
  linkedin_url, notes, professional_context, personal_context, field_sources,
  revision, created_at, updated_at";

pub struct RawContact {
  pub contact_id:           String,
  pub user_id:              String,
  pub name:                 String,
  pub company:              Option<String>,
  pub title:                Option<String>,
  pub location:             Option<String>,
  pub email:                Option<String>,
  pub phone:                Option<String>,
  pub linkedin_url:         Option<String>,
  pub notes:                Option<String>,
  pub professional_context: String,
  pub personal_context:     String,
  pub field_sources:        String,
  pub revision:             i64,
  pub created_at:           String,
  pub updated_at:           String,
}

impl RawContact {
  pub fn encode(c: &Contact) -> Result<Self> {
    Ok(Self {
      contact_id:           encode_uuid(c.contact_id),
      user_id:              encode_uuid(c.user_id),
      name:                 c.name.clone(),
      company:              c.company.clone(),
      title:                c.title.clone(),
      location:             c.location.clone(),
      email:                c.email.clone(),
      phone:                c.phone.clone(),
      linkedin_url:         c.linkedin_url.clone(),
      notes:                c.notes.clone(),
      professional_context: serde_json::to_string(&c.professional_context)?,
      personal_context:     serde_json::to_string(&c.personal_context)?,
      field_sources:        serde_json::to_string(&c.field_sources)?,
      revision:             c.revision,
      created_at:           encode_dt(c.created_at),
      updated_at:           encode_dt(c.updated_at),
    })
  }

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      contact_id:           row.get(0)?,
      user_id:              row.get(1)?,
      name:                 row.get(2)?,
      company:              row.get(3)?,
      title:                row.get(4)?,
      location:             row.get(5)?,
      email:                row.get(6)?,
      phone:                row.get(7)?,
      linkedin_url:         row.get(8)?,
      notes:                row.get(9)?,
      professional_context: row.get(10)?,
      personal_context:     row.get(11)?,
      field_sources:        row.get(12)?,
      revision:             row.get(13)?,
      created_at:           row.get(14)?,
      updated_at:           row.get(15)?,
    })
  }

  pub fn into_contact(self) -> Result<Contact> {
    Ok(Contact {
      contact_id:           decode_uuid(&self.contact_id)?,
      user_id:              decode_uuid(&self.user_id)?,
      name:                 self.name,
      company:              self.company,
      title:                self.title,
      location:             self.location,
      email:                self.email,
      phone:                self.phone,
      linkedin_url:         self.linkedin_url,
      notes:                self.notes,
      professional_context: serde_json::from_str(&self.professional_context)?,
      personal_context:     serde_json::from_str(&self.personal_context)?,
      field_sources:        serde_json::from_str(&self.field_sources)?,
      revision:             self.revision,
      created_at:           decode_dt(&self.created_at)?,
      updated_at:           decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Suggestion batch rows ───────────────────────────────────────────────────

/// Column list matching [`RawBatch::from_row`].
pub const BATCH_COLUMNS: &str = "
  batch_id, artifact_id, contact_id, user_id, suggestions, status,
  user_selections, created_at, reviewed_at, applied_at";

pub struct RawBatch {
  pub batch_id:        String,
  pub artifact_id:     String,
  pub contact_id:      String,
  pub user_id:         String,
  pub suggestions:     String,
  pub status:          String,
  pub user_selections: String,
  pub created_at:      String,
  pub reviewed_at:     Option<String>,
  pub applied_at:      Option<String>,
}

impl RawBatch {
  pub fn encode(b: &SuggestionBatch) -> Result<Self> {
    Ok(Self {
      batch_id:        encode_uuid(b.batch_id),
      artifact_id:     encode_uuid(b.artifact_id),
      contact_id:      encode_uuid(b.contact_id),
      user_id:         encode_uuid(b.user_id),
      suggestions:     serde_json::to_string(&b.suggestions)?,
      status:          b.status.to_string(),
      user_selections: serde_json::to_string(&b.user_selections)?,
      created_at:      encode_dt(b.created_at),
      reviewed_at:     b.reviewed_at.map(encode_dt),
      applied_at:      b.applied_at.map(encode_dt),
    })
  }

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      batch_id:        row.get(0)?,
      artifact_id:     row.get(1)?,
      contact_id:      row.get(2)?,
      user_id:         row.get(3)?,
      suggestions:     row.get(4)?,
      status:          row.get(5)?,
      user_selections: row.get(6)?,
      created_at:      row.get(7)?,
      reviewed_at:     row.get(8)?,
      applied_at:      row.get(9)?,
    })
  }

  pub fn into_batch(self) -> Result<SuggestionBatch> {
    Ok(SuggestionBatch {
      batch_id:        decode_uuid(&self.batch_id)?,
      artifact_id:     decode_uuid(&self.artifact_id)?,
      contact_id:      decode_uuid(&self.contact_id)?,
      user_id:         decode_uuid(&self.user_id)?,
      suggestions:     serde_json::from_str(&self.suggestions)?,
      status:          decode_enum(&self.status, "batch status")?,
      user_selections: serde_json::from_str(&self.user_selections)?,
      created_at:      decode_dt(&self.created_at)?,
      reviewed_at:     decode_opt_dt(self.reviewed_at.as_deref())?,
      applied_at:      decode_opt_dt(self.applied_at.as_deref())?,
    })
  }
}
