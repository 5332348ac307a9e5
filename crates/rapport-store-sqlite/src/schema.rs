//! SQL schema for the Rapport SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.
//!
//! Tables reference each other by id only. Referential rules (provenance,
//! the deletion guard) are enforced in the store's transactions.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS contacts (
    contact_id           TEXT PRIMARY KEY,
    user_id              TEXT NOT NULL,
    name                 TEXT NOT NULL,
    company              TEXT,
    title                TEXT,
    location             TEXT,
    email                TEXT,
    phone                TEXT,
    linkedin_url         TEXT,
    notes                TEXT,
    professional_context TEXT NOT NULL DEFAULT '{}',  -- JSON object
    personal_context     TEXT NOT NULL DEFAULT '{}',  -- JSON object
    field_sources        TEXT NOT NULL DEFAULT '{}',  -- JSON: dotted path -> artifact_id
    revision             INTEGER NOT NULL DEFAULT 0,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL
);

-- The payload columns (kind .. audio_ref) are never updated after insert.
CREATE TABLE IF NOT EXISTS artifacts (
    artifact_id             TEXT PRIMARY KEY,
    user_id                 TEXT NOT NULL,
    contact_id              TEXT,
    kind                    TEXT NOT NULL,
    content                 TEXT,
    metadata                TEXT NOT NULL DEFAULT '{}',
    transcript              TEXT,
    duration_secs           REAL,
    audio_ref               TEXT,
    extraction_status       TEXT NOT NULL,   -- 'pending' | 'processing' | 'completed' | 'failed'
    extraction_started_at   TEXT,
    extraction_completed_at TEXT,
    extraction_run_id       TEXT,
    ai_status               TEXT NOT NULL,
    ai_started_at           TEXT,
    ai_completed_at         TEXT,
    ai_run_id               TEXT,
    revision                INTEGER NOT NULL DEFAULT 0,
    created_at              TEXT NOT NULL,
    updated_at              TEXT NOT NULL
);

-- The suggestions column is immutable; only the review columns change, once.
CREATE TABLE IF NOT EXISTS suggestion_batches (
    batch_id        TEXT PRIMARY KEY,
    artifact_id     TEXT NOT NULL,
    contact_id      TEXT NOT NULL,
    user_id         TEXT NOT NULL,
    suggestions     TEXT NOT NULL,                    -- JSON array
    status          TEXT NOT NULL DEFAULT 'pending',
    user_selections TEXT NOT NULL DEFAULT '{}',       -- JSON: dotted path -> bool
    created_at      TEXT NOT NULL,
    reviewed_at     TEXT,
    applied_at      TEXT
);

CREATE INDEX IF NOT EXISTS artifacts_contact_idx ON artifacts(contact_id);
CREATE INDEX IF NOT EXISTS artifacts_user_idx    ON artifacts(user_id);
CREATE INDEX IF NOT EXISTS batches_artifact_idx  ON suggestion_batches(artifact_id);
CREATE INDEX IF NOT EXISTS batches_contact_idx   ON suggestion_batches(contact_id);

PRAGMA user_version = 1;
";
