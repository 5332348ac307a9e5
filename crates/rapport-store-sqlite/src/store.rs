//! [`SqliteStore`], the SQLite implementation of [`ContactStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use rapport_core::{
  artifact::{Artifact, NewArtifact},
  contact::{Contact, NewContact},
  store::{
    ArtifactQuery, ArtifactReferences, BatchQuery, ContactStore, DeleteOutcome,
    ReviewCommit, SourceFieldRef, StageCommit,
  },
  suggestion::{NewSuggestionBatch, SuggestionBatch},
};

use crate::{
  Error, Result,
  encode::{
    ARTIFACT_COLUMNS, BATCH_COLUMNS, CONTACT_COLUMNS, RawArtifact, RawBatch, RawContact,
    decode_enum, decode_uuid, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Rapport store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Statement helpers ───────────────────────────────────────────────────────
//
// These run on the connection thread, inside or outside a transaction
// (`rusqlite::Transaction` derefs to `Connection`).

fn insert_artifact(conn: &rusqlite::Connection, r: &RawArtifact) -> rusqlite::Result<()> {
  conn.execute(
    &format!("INSERT INTO artifacts ({ARTIFACT_COLUMNS}) VALUES (
       ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
       ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20
     )"),
    rusqlite::params![
      r.artifact_id,
      r.user_id,
      r.contact_id,
      r.kind,
      r.content,
      r.metadata,
      r.transcript,
      r.duration_secs,
      r.audio_ref,
      r.extraction.status,
      r.extraction.started_at,
      r.extraction.completed_at,
      r.extraction.run_id,
      r.ai.status,
      r.ai.started_at,
      r.ai.completed_at,
      r.ai.run_id,
      r.revision,
      r.created_at,
      r.updated_at,
    ],
  )?;
  Ok(())
}

/// Compare-and-swap write of an artifact's mutable columns. Returns the
/// number of rows changed: 0 on a revision conflict or missing row.
fn update_artifact(conn: &rusqlite::Connection, r: &RawArtifact) -> rusqlite::Result<usize> {
  conn.execute(
    "UPDATE artifacts SET
       metadata                = ?1,
       transcript              = ?2,
       duration_secs           = ?3,
       extraction_status       = ?4,
       extraction_started_at   = ?5,
       extraction_completed_at = ?6,
       extraction_run_id       = ?7,
       ai_status               = ?8,
       ai_started_at           = ?9,
       ai_completed_at         = ?10,
       ai_run_id               = ?11,
       updated_at              = ?12,
       revision                = revision + 1
     WHERE artifact_id = ?13 AND revision = ?14",
    rusqlite::params![
      r.metadata,
      r.transcript,
      r.duration_secs,
      r.extraction.status,
      r.extraction.started_at,
      r.extraction.completed_at,
      r.extraction.run_id,
      r.ai.status,
      r.ai.started_at,
      r.ai.completed_at,
      r.ai.run_id,
      r.updated_at,
      r.artifact_id,
      r.revision,
    ],
  )
}

fn insert_contact(conn: &rusqlite::Connection, r: &RawContact) -> rusqlite::Result<()> {
  conn.execute(
    &format!("INSERT INTO contacts ({CONTACT_COLUMNS}) VALUES (
       ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16
     )"),
    rusqlite::params![
      r.contact_id,
      r.user_id,
      r.name,
      r.company,
      r.title,
      r.location,
      r.email,
      r.phone,
      r.linkedin_url,
      r.notes,
      r.professional_context,
      r.personal_context,
      r.field_sources,
      r.revision,
      r.created_at,
      r.updated_at,
    ],
  )?;
  Ok(())
}

/// Compare-and-swap write of every mutable contact column.
fn update_contact(conn: &rusqlite::Connection, r: &RawContact) -> rusqlite::Result<usize> {
  conn.execute(
    "UPDATE contacts SET
       name                 = ?1,
       company              = ?2,
       title                = ?3,
       location             = ?4,
       email                = ?5,
       phone                = ?6,
       linkedin_url         = ?7,
       notes                = ?8,
       professional_context = ?9,
       personal_context     = ?10,
       field_sources        = ?11,
       updated_at           = ?12,
       revision             = revision + 1
     WHERE contact_id = ?13 AND revision = ?14",
    rusqlite::params![
      r.name,
      r.company,
      r.title,
      r.location,
      r.email,
      r.phone,
      r.linkedin_url,
      r.notes,
      r.professional_context,
      r.personal_context,
      r.field_sources,
      r.updated_at,
      r.contact_id,
      r.revision,
    ],
  )
}

fn insert_batch(conn: &rusqlite::Connection, r: &RawBatch) -> rusqlite::Result<()> {
  conn.execute(
    &format!("INSERT INTO suggestion_batches ({BATCH_COLUMNS}) VALUES (
       ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10
     )"),
    rusqlite::params![
      r.batch_id,
      r.artifact_id,
      r.contact_id,
      r.user_id,
      r.suggestions,
      r.status,
      r.user_selections,
      r.created_at,
      r.reviewed_at,
      r.applied_at,
    ],
  )?;
  Ok(())
}

/// Mark every pending batch for an artifact stale, returning their ids.
fn stale_pending_batches(
  conn: &rusqlite::Connection,
  artifact_id: &str,
) -> rusqlite::Result<Vec<String>> {
  let ids = conn
    .prepare(
      "SELECT batch_id FROM suggestion_batches
       WHERE artifact_id = ?1 AND status = 'pending'",
    )?
    .query_map(rusqlite::params![artifact_id], |row| row.get(0))?
    .collect::<rusqlite::Result<Vec<String>>>()?;

  conn.execute(
    "UPDATE suggestion_batches SET status = 'stale'
     WHERE artifact_id = ?1 AND status = 'pending'",
    rusqlite::params![artifact_id],
  )?;
  Ok(ids)
}

/// `WHERE` clause builder for the optional filters of the list queries. All
/// filter values are stored as text, so the parameters are plain strings.
#[derive(Default)]
struct Filter {
  clauses: Vec<&'static str>,
  params:  Vec<String>,
}

impl Filter {
  fn eq(&mut self, clause: &'static str, value: Option<String>) {
    if let Some(value) = value {
      self.clauses.push(clause);
      self.params.push(value);
    }
  }

  fn sql(&self) -> String {
    if self.clauses.is_empty() {
      String::new()
    } else {
      format!("WHERE {}", self.clauses.join(" AND "))
    }
  }
}

// ─── Transaction outcomes ────────────────────────────────────────────────────
//
// Undecoded results carried back from the connection thread.

enum RawDelete {
  Deleted(RawArtifact),
  NotFound,
  Referenced {
    source_fields:   Vec<(String, String)>,
    applied_batches: Vec<String>,
  },
}

enum RawReview {
  Committed,
  ContactChanged,
  BatchStatus(String),
  ArtifactMissing,
  BatchMissing,
}

// ─── ContactStore impl ───────────────────────────────────────────────────────

impl ContactStore for SqliteStore {
  type Error = Error;

  // ── Contacts ──────────────────────────────────────────────────────────────

  async fn add_contact(&self, input: NewContact) -> Result<Contact> {
    let contact = input.into_contact(Utc::now());
    let raw = RawContact::encode(&contact)?;

    self
      .conn
      .call(move |conn| {
        insert_contact(conn, &raw)?;
        Ok(())
      })
      .await?;

    Ok(contact)
  }

  async fn get_contact(&self, id: Uuid) -> Result<Option<Contact>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawContact> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE contact_id = ?1"),
            rusqlite::params![id_str],
            RawContact::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawContact::into_contact).transpose()
  }

  // ── Artifacts ─────────────────────────────────────────────────────────────

  async fn add_artifact(&self, input: NewArtifact) -> Result<Artifact> {
    let artifact = input.into_artifact(Utc::now());
    let raw = RawArtifact::encode(&artifact)?;

    self
      .conn
      .call(move |conn| {
        insert_artifact(conn, &raw)?;
        Ok(())
      })
      .await?;

    Ok(artifact)
  }

  async fn get_artifact(&self, id: Uuid) -> Result<Option<Artifact>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawArtifact> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE artifact_id = ?1"),
            rusqlite::params![id_str],
            RawArtifact::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawArtifact::into_artifact).transpose()
  }

  async fn list_artifacts<'a>(&'a self, query: &'a ArtifactQuery) -> Result<Vec<Artifact>> {
    let mut filter = Filter::default();
    filter.eq("user_id = ?", query.user_id.map(encode_uuid));
    filter.eq("contact_id = ?", query.contact_id.map(encode_uuid));
    let limit = query
      .limit
      .map(|n| format!("LIMIT {n}"))
      .unwrap_or_default();

    let sql = format!(
      "SELECT {ARTIFACT_COLUMNS} FROM artifacts {}
       ORDER BY created_at DESC, rowid DESC {limit}",
      filter.sql(),
    );

    let raws: Vec<RawArtifact> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(filter.params), RawArtifact::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawArtifact::into_artifact).collect()
  }

  async fn save_artifact<'a>(&'a self, artifact: &'a Artifact) -> Result<Option<Artifact>> {
    let raw = RawArtifact::encode(artifact)?;

    let changed = self
      .conn
      .call(move |conn| Ok(update_artifact(conn, &raw)?))
      .await?;

    if changed == 0 {
      tracing::debug!(artifact_id = %artifact.artifact_id, "artifact revision conflict");
      return Ok(None);
    }

    let mut saved = artifact.clone();
    saved.revision += 1;
    Ok(Some(saved))
  }

  async fn delete_artifact_if_unreferenced(&self, id: Uuid) -> Result<DeleteOutcome> {
    let id_str = encode_uuid(id);

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let Some(artifact) = tx
          .query_row(
            &format!("SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE artifact_id = ?1"),
            rusqlite::params![id_str],
            RawArtifact::from_row,
          )
          .optional()?
        else {
          return Ok(RawDelete::NotFound);
        };

        let source_fields = tx
          .prepare(
            "SELECT c.contact_id, j.key
             FROM contacts c, json_each(c.field_sources) j
             WHERE j.value = ?1
             ORDER BY c.contact_id, j.key",
          )?
          .query_map(rusqlite::params![id_str], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<(String, String)>>>()?;

        let applied_batches = tx
          .prepare(
            "SELECT batch_id FROM suggestion_batches
             WHERE artifact_id = ?1 AND status IN ('approved', 'partial')
             ORDER BY created_at",
          )?
          .query_map(rusqlite::params![id_str], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;

        if !source_fields.is_empty() || !applied_batches.is_empty() {
          return Ok(RawDelete::Referenced { source_fields, applied_batches });
        }

        tx.execute(
          "DELETE FROM artifacts WHERE artifact_id = ?1",
          rusqlite::params![id_str],
        )?;
        stale_pending_batches(&tx, &id_str)?;
        tx.commit()?;

        Ok(RawDelete::Deleted(artifact))
      })
      .await?;

    match raw {
      RawDelete::Deleted(artifact) => Ok(DeleteOutcome::Deleted(artifact.into_artifact()?)),
      RawDelete::NotFound => Ok(DeleteOutcome::NotFound),
      RawDelete::Referenced { source_fields, applied_batches } => {
        let source_fields = source_fields
          .into_iter()
          .map(|(contact_id, path)| {
            Ok(SourceFieldRef {
              contact_id: decode_uuid(&contact_id)?,
              field_path: decode_enum(&path, "field path")?,
            })
          })
          .collect::<Result<Vec<_>>>()?;
        let applied_batches = applied_batches
          .iter()
          .map(|id| decode_uuid(id))
          .collect::<Result<Vec<_>>>()?;

        Ok(DeleteOutcome::Referenced(ArtifactReferences {
          source_fields,
          applied_batches,
        }))
      }
    }
  }

  // ── Suggestion batches ────────────────────────────────────────────────────

  async fn get_batch(&self, id: Uuid) -> Result<Option<SuggestionBatch>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawBatch> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {BATCH_COLUMNS} FROM suggestion_batches WHERE batch_id = ?1"),
            rusqlite::params![id_str],
            RawBatch::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawBatch::into_batch).transpose()
  }

  async fn list_batches<'a>(&'a self, query: &'a BatchQuery) -> Result<Vec<SuggestionBatch>> {
    let mut filter = Filter::default();
    filter.eq("user_id = ?", query.user_id.map(encode_uuid));
    filter.eq("artifact_id = ?", query.artifact_id.map(encode_uuid));
    filter.eq("contact_id = ?", query.contact_id.map(encode_uuid));
    filter.eq("status = ?", query.status.map(|s| s.to_string()));

    let sql = format!(
      "SELECT {BATCH_COLUMNS} FROM suggestion_batches {}
       ORDER BY created_at DESC, rowid DESC",
      filter.sql(),
    );

    let raws: Vec<RawBatch> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(filter.params), RawBatch::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawBatch::into_batch).collect()
  }

  async fn complete_suggestion_stage<'a>(
    &'a self,
    artifact: &'a Artifact,
    batch: NewSuggestionBatch,
  ) -> Result<Option<StageCommit>> {
    let batch = batch.into_batch(Utc::now());
    let raw_artifact = RawArtifact::encode(artifact)?;
    let raw_batch = RawBatch::encode(&batch)?;

    let staled = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if update_artifact(&tx, &raw_artifact)? == 0 {
          return Ok(None);
        }
        let staled = stale_pending_batches(&tx, &raw_artifact.artifact_id)?;
        insert_batch(&tx, &raw_batch)?;
        tx.commit()?;
        Ok(Some(staled))
      })
      .await?;

    let Some(staled) = staled else {
      tracing::debug!(artifact_id = %artifact.artifact_id, "artifact revision conflict");
      return Ok(None);
    };

    let mut saved = artifact.clone();
    saved.revision += 1;
    Ok(Some(StageCommit {
      artifact: saved,
      batch,
      staled: staled
        .iter()
        .map(|id| decode_uuid(id))
        .collect::<Result<Vec<_>>>()?,
    }))
  }

  async fn commit_review<'a>(
    &'a self,
    contact: Option<&'a Contact>,
    batch: &'a SuggestionBatch,
  ) -> Result<ReviewCommit> {
    let raw_contact = contact.map(RawContact::encode).transpose()?;
    let raw_batch = RawBatch::encode(batch)?;

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let status: Option<String> = tx
          .query_row(
            "SELECT status FROM suggestion_batches WHERE batch_id = ?1",
            rusqlite::params![raw_batch.batch_id],
            |row| row.get(0),
          )
          .optional()?;
        match status {
          None => return Ok(RawReview::BatchMissing),
          Some(s) if s != "pending" => return Ok(RawReview::BatchStatus(s)),
          Some(_) => {}
        }

        let artifact_exists = tx
          .query_row(
            "SELECT 1 FROM artifacts WHERE artifact_id = ?1",
            rusqlite::params![raw_batch.artifact_id],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !artifact_exists {
          return Ok(RawReview::ArtifactMissing);
        }

        if let Some(raw_contact) = &raw_contact {
          if update_contact(&tx, raw_contact)? == 0 {
            return Ok(RawReview::ContactChanged);
          }
        }

        tx.execute(
          "UPDATE suggestion_batches SET
             status          = ?1,
             user_selections = ?2,
             reviewed_at     = ?3,
             applied_at      = ?4
           WHERE batch_id = ?5 AND status = 'pending'",
          rusqlite::params![
            raw_batch.status,
            raw_batch.user_selections,
            raw_batch.reviewed_at,
            raw_batch.applied_at,
            raw_batch.batch_id,
          ],
        )?;
        tx.commit()?;
        Ok(RawReview::Committed)
      })
      .await?;

    match raw {
      RawReview::Committed => Ok(ReviewCommit::Committed {
        contact: contact.map(|c| Contact { revision: c.revision + 1, ..c.clone() }),
        batch:   batch.clone(),
      }),
      RawReview::ContactChanged => Ok(ReviewCommit::ContactChanged),
      RawReview::BatchStatus(s) => {
        Ok(ReviewCommit::BatchNotPending(decode_enum(&s, "batch status")?))
      }
      RawReview::ArtifactMissing => Ok(ReviewCommit::ArtifactMissing),
      RawReview::BatchMissing => Err(Error::BatchNotFound(batch.batch_id)),
    }
  }
}
