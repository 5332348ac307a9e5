//! End-to-end pipeline tests against an in-memory store and scripted workers.

use std::{
  collections::BTreeSet,
  sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use chrono::Utc;
use rapport_core::{
  artifact::{Artifact, ArtifactKind, NewArtifact, Stage, StageStatus},
  contact::{Contact, NewContact},
  field::{ContactField, FieldPath, ProfessionalField},
  store::{BatchQuery, ContactStore},
  suggestion::{BatchStatus, DEFAULT_SELECTION_THRESHOLD, ProposedSuggestion, SuggestionBatch},
};
use rapport_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
  Backends, Engine, EngineConfig, Error,
  blob::{BlobError, BlobStore},
  worker::{
    GenerationRequest, GenerationResponse, SuggestionGenerator, Transcriber,
    TranscriptionRequest, TranscriptionResponse, WorkerError,
  },
};

const GOALS: FieldPath = FieldPath::Professional(ProfessionalField::Goals);
const TITLE: FieldPath = FieldPath::Top(ContactField::Title);
const MEMO: &str = "I want to focus on mentoring and fundraising this year";

// ─── Scripted workers ────────────────────────────────────────────────────────

#[derive(Clone)]
enum Reply<T> {
  Ok(T),
  Fail,
  Hang,
}

impl<T: Clone> Reply<T> {
  async fn play(&self) -> Result<T, WorkerError> {
    match self {
      Reply::Ok(value) => Ok(value.clone()),
      Reply::Fail => Err(WorkerError::Upstream("502 Bad Gateway".into())),
      Reply::Hang => {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Err(WorkerError::Upstream("hung worker was not timed out".into()))
      }
    }
  }
}

#[derive(Clone)]
struct FakeTranscriber {
  reply: Arc<Mutex<Reply<String>>>,
  calls: Arc<AtomicUsize>,
}

impl FakeTranscriber {
  fn set(&self, reply: Reply<String>) { *self.reply.lock().unwrap() = reply; }
}

impl Transcriber for FakeTranscriber {
  async fn transcribe(
    &self,
    _request: TranscriptionRequest,
  ) -> Result<TranscriptionResponse, WorkerError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    let reply = self.reply.lock().unwrap().clone();
    let text = reply.play().await?;
    Ok(TranscriptionResponse { text, duration_secs: Some(4.2) })
  }
}

#[derive(Clone)]
struct FakeGenerator {
  reply: Arc<Mutex<Reply<Vec<ProposedSuggestion>>>>,
  seen:  Arc<Mutex<Vec<GenerationRequest>>>,
}

impl FakeGenerator {
  fn set(&self, reply: Reply<Vec<ProposedSuggestion>>) { *self.reply.lock().unwrap() = reply; }

  fn last_text(&self) -> Option<String> {
    self.seen.lock().unwrap().last().map(|r| r.text.clone())
  }
}

impl SuggestionGenerator for FakeGenerator {
  async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, WorkerError> {
    self.seen.lock().unwrap().push(request);
    let reply = self.reply.lock().unwrap().clone();
    Ok(GenerationResponse { suggestions: reply.play().await? })
  }
}

#[derive(Clone, Default)]
struct FakeBlobs {
  deleted: Arc<Mutex<Vec<String>>>,
  broken:  bool,
}

impl BlobStore for FakeBlobs {
  async fn delete<'a>(&'a self, blob_ref: &'a str) -> Result<(), BlobError> {
    if self.broken {
      return Err(BlobError::Io(std::io::Error::other("disk unplugged")));
    }
    self.deleted.lock().unwrap().push(blob_ref.to_owned());
    Ok(())
  }
}

struct TestBackends;

impl Backends for TestBackends {
  type Store = SqliteStore;
  type Transcriber = FakeTranscriber;
  type Generator = FakeGenerator;
  type Blobs = FakeBlobs;
}

// ─── Harness ─────────────────────────────────────────────────────────────────

fn proposed(path: &str, action: &str, value: Value, confidence: f64) -> ProposedSuggestion {
  ProposedSuggestion {
    field_path: path.into(),
    action: action.into(),
    suggested_value: value,
    confidence,
    reasoning: Some("mentioned in the memo".into()),
  }
}

fn memo_suggestions() -> Vec<ProposedSuggestion> {
  vec![
    proposed("professional_context.goals", "add", json!(["mentoring", "fundraising"]), 0.92),
    proposed("title", "update", json!("VP Engineering"), 0.4),
  ]
}

struct Harness {
  engine:      Arc<Engine<TestBackends>>,
  transcriber: FakeTranscriber,
  generator:   FakeGenerator,
  blobs:       FakeBlobs,
  user:        Uuid,
  contact:     Contact,
}

impl Harness {
  async fn new() -> Self { Self::with_blobs(FakeBlobs::default()).await }

  async fn with_blobs(blobs: FakeBlobs) -> Self {
    let store = SqliteStore::open_in_memory().await.expect("in-memory store");
    let user = Uuid::new_v4();
    let mut input = NewContact::new(user, "Dana Whitfield");
    input.title = Some("Director of Engineering".into());
    let contact = store.add_contact(input).await.unwrap();

    let transcriber = FakeTranscriber {
      reply: Arc::new(Mutex::new(Reply::Ok(MEMO.into()))),
      calls: Arc::default(),
    };
    let generator = FakeGenerator {
      reply: Arc::new(Mutex::new(Reply::Ok(memo_suggestions()))),
      seen:  Arc::default(),
    };
    let config = EngineConfig {
      transcription_timeout: Duration::from_millis(50),
      generation_timeout:    Duration::from_millis(50),
      ..EngineConfig::default()
    };
    let engine = Arc::new(Engine::new(
      store,
      transcriber.clone(),
      generator.clone(),
      blobs.clone(),
      config,
    ));

    Self { engine, transcriber, generator, blobs, user, contact }
  }

  /// Store an artifact without starting its pipeline.
  async fn add(&self, kind: ArtifactKind, configure: impl FnOnce(&mut NewArtifact)) -> Artifact {
    let mut input = NewArtifact::new(self.user, kind);
    input.contact_id = Some(self.contact.contact_id);
    configure(&mut input);
    self.engine.store().add_artifact(input).await.unwrap()
  }

  async fn voice_memo(&self) -> Artifact {
    self
      .add(ArtifactKind::VoiceMemo, |a| a.audio_ref = Some("memos/dana.m4a".into()))
      .await
  }

  async fn batches(&self, artifact_id: Uuid) -> Vec<SuggestionBatch> {
    let query = BatchQuery { artifact_id: Some(artifact_id), ..Default::default() };
    self.engine.store().list_batches(&query).await.unwrap()
  }

  async fn only_batch(&self, artifact_id: Uuid) -> SuggestionBatch {
    let mut batches = self.batches(artifact_id).await;
    assert_eq!(batches.len(), 1, "expected exactly one batch");
    batches.remove(0)
  }

  async fn contact(&self) -> Contact {
    self
      .engine
      .store()
      .get_contact(self.contact.contact_id)
      .await
      .unwrap()
      .unwrap()
  }
}

fn paths(paths: &[FieldPath]) -> BTreeSet<FieldPath> { paths.iter().copied().collect() }

// ─── Stage runs ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn voice_memo_goes_from_audio_to_partial_review() {
  let h = Harness::new().await;
  let memo = h.voice_memo().await;

  let done = h.engine.process(memo.artifact_id).await.unwrap();
  assert_eq!(done.extraction.status, StageStatus::Completed);
  assert_eq!(done.ai.status, StageStatus::Completed);
  assert_eq!(done.transcript.as_deref(), Some(MEMO));
  assert_eq!(done.duration_secs, Some(4.2));
  assert_eq!(h.generator.last_text().as_deref(), Some(MEMO));

  let batch = h.only_batch(memo.artifact_id).await;
  assert_eq!(batch.status, BatchStatus::Pending);
  assert_eq!(batch.default_selection(DEFAULT_SELECTION_THRESHOLD), [GOALS]);

  let outcome = h
    .engine
    .apply(h.user, batch.batch_id, paths(&[GOALS]))
    .await
    .unwrap();

  let contact = h.contact().await;
  assert_eq!(contact, outcome.contact);
  assert_eq!(contact.professional_context.goals, ["mentoring", "fundraising"]);
  assert_eq!(contact.title.as_deref(), Some("Director of Engineering"));
  assert_eq!(contact.source_of(GOALS), Some(memo.artifact_id));
  assert_eq!(contact.source_of(TITLE), None);
  assert_eq!(outcome.batch.status, BatchStatus::Partial);
  assert_eq!(outcome.batch.user_selections.get(&GOALS), Some(&true));
  assert_eq!(outcome.batch.user_selections.get(&TITLE), Some(&false));
}

#[tokio::test]
async fn text_artifacts_skip_the_transcriber() {
  let h = Harness::new().await;
  let email = h
    .add(ArtifactKind::Email, |a| a.content = Some("Thrilled to start fundraising!".into()))
    .await;

  let done = h.engine.process(email.artifact_id).await.unwrap();
  assert_eq!(done.ai.status, StageStatus::Completed);
  assert_eq!(h.transcriber.calls.load(Ordering::SeqCst), 0);
  assert_eq!(h.generator.last_text().as_deref(), Some("Thrilled to start fundraising!"));
  h.only_batch(email.artifact_id).await;
}

#[tokio::test]
async fn transcription_timeout_fails_extraction() {
  let h = Harness::new().await;
  h.transcriber.set(Reply::Hang);
  let memo = h.voice_memo().await;

  let done = h.engine.process(memo.artifact_id).await.unwrap();
  assert_eq!(done.extraction.status, StageStatus::Failed);
  assert!(done.failure_reason(Stage::Extraction).unwrap().contains("timed out"));
  assert_eq!(done.ai.status, StageStatus::Pending);
  assert!(h.generator.seen.lock().unwrap().is_empty());
  assert!(h.batches(memo.artifact_id).await.is_empty());
}

#[tokio::test]
async fn empty_transcript_is_a_failure() {
  let h = Harness::new().await;
  h.transcriber.set(Reply::Ok("   ".into()));
  let memo = h.voice_memo().await;

  let done = h.engine.process(memo.artifact_id).await.unwrap();
  assert_eq!(done.extraction.status, StageStatus::Failed);
  assert!(done.failure_reason(Stage::Extraction).unwrap().contains("empty transcript"));
  assert_eq!(done.transcript, None);
}

#[tokio::test]
async fn voice_memo_without_audio_fails_without_calling_worker() {
  let h = Harness::new().await;
  let memo = h.add(ArtifactKind::VoiceMemo, |_| {}).await;

  let done = h.engine.process(memo.artifact_id).await.unwrap();
  assert_eq!(done.extraction.status, StageStatus::Failed);
  assert_eq!(h.transcriber.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn generator_failure_is_recorded_and_reprocessable() {
  let h = Harness::new().await;
  h.generator.set(Reply::Fail);
  let memo = h.voice_memo().await;

  let failed = h.engine.process(memo.artifact_id).await.unwrap();
  assert_eq!(failed.extraction.status, StageStatus::Completed);
  assert_eq!(failed.ai.status, StageStatus::Failed);
  assert!(failed.failure_reason(Stage::Ai).unwrap().contains("502 Bad Gateway"));
  assert!(h.batches(memo.artifact_id).await.is_empty());

  h.generator.set(Reply::Ok(memo_suggestions()));
  let reset = h
    .engine
    .reset(h.user, memo.artifact_id, Some(Stage::Ai))
    .await
    .unwrap();
  assert_eq!(reset.ai.status, StageStatus::Pending);
  assert_eq!(reset.failure_reason(Stage::Ai), None);
  assert_eq!(reset.extraction.status, StageStatus::Completed);

  let done = h.engine.process(memo.artifact_id).await.unwrap();
  assert_eq!(done.ai.status, StageStatus::Completed);
  assert_eq!(h.transcriber.calls.load(Ordering::SeqCst), 1);
  h.only_batch(memo.artifact_id).await;
}

#[tokio::test]
async fn generation_timeout_fails_ai_stage() {
  let h = Harness::new().await;
  h.generator.set(Reply::Hang);
  let note = h.add(ArtifactKind::Note, |a| a.content = Some("Coffee next week".into())).await;

  let done = h.engine.process(note.artifact_id).await.unwrap();
  assert_eq!(done.ai.status, StageStatus::Failed);
  assert!(done.failure_reason(Stage::Ai).unwrap().contains("timed out"));
}

#[tokio::test]
async fn artifact_without_contact_fails_ai_stage() {
  let h = Harness::new().await;
  let note = h
    .add(ArtifactKind::Note, |a| {
      a.contact_id = None;
      a.content = Some("Someone at the meetup".into());
    })
    .await;

  let done = h.engine.process(note.artifact_id).await.unwrap();
  assert_eq!(done.ai.status, StageStatus::Failed);
  assert!(done.failure_reason(Stage::Ai).unwrap().contains("not linked to a contact"));
}

#[tokio::test]
async fn unknown_generated_paths_are_dropped() {
  let h = Harness::new().await;
  h.generator.set(Reply::Ok(vec![
    proposed("professional_context.salary", "update", json!("lots"), 0.99),
    proposed("personal_context.hobbies", "add", json!("sailing"), 0.8),
  ]));
  let note = h.add(ArtifactKind::Note, |a| a.content = Some("Sails on weekends".into())).await;

  h.engine.process(note.artifact_id).await.unwrap();
  let batch = h.only_batch(note.artifact_id).await;
  assert_eq!(batch.suggestions.len(), 1);
  assert_eq!(batch.suggestions[0].field_path.to_string(), "personal_context.hobbies");
}

#[tokio::test]
async fn misshapen_generated_values_never_reach_review() {
  let h = Harness::new().await;
  let generated = vec![
    proposed("title", "update", json!(["VP Engineering", "CTO"]), 0.95),
    proposed("professional_context.goals", "add", Value::Null, 0.9),
    proposed("personal_context.hobbies", "add", json!("sailing"), 0.9),
    proposed("company", "update", json!(42), 0.8),
    proposed("location", "update", json!("Lisbon"), 0.3),
  ];
  h.generator.set(Reply::Ok(generated));

  let first = h.add(ArtifactKind::Note, |a| a.content = Some("Sails on weekends".into())).await;
  h.engine.process(first.artifact_id).await.unwrap();
  let batch = h.only_batch(first.artifact_id).await;
  let kept: Vec<String> = batch.suggestions.iter().map(|s| s.field_path.to_string()).collect();
  assert_eq!(kept, ["personal_context.hobbies", "company", "location"]);

  let preselected: BTreeSet<_> = batch
    .default_selection(DEFAULT_SELECTION_THRESHOLD)
    .into_iter()
    .collect();
  let outcome = h.engine.apply(h.user, batch.batch_id, preselected).await.unwrap();
  assert_eq!(outcome.batch.status, BatchStatus::Partial);
  assert_eq!(outcome.contact.personal_context.hobbies, ["sailing"]);
  assert_eq!(outcome.contact.company.as_deref(), Some("42"));
  assert_eq!(outcome.contact.title.as_deref(), Some("Director of Engineering"));

  let second = h.add(ArtifactKind::Note, |a| a.content = Some("Still sailing".into())).await;
  h.engine.process(second.artifact_id).await.unwrap();
  let batch = h.only_batch(second.artifact_id).await;
  let outcome = h
    .engine
    .apply(h.user, batch.batch_id, batch.field_paths())
    .await
    .unwrap();
  assert_eq!(outcome.batch.status, BatchStatus::Approved);
  assert_eq!(outcome.contact.location.as_deref(), Some("Lisbon"));
}

#[tokio::test]
async fn late_result_of_a_reset_run_is_discarded() {
  let h = Harness::new().await;
  let memo = h.voice_memo().await;

  let (claimed, old_run) = h
    .engine
    .update_artifact(memo.artifact_id, |a| a.begin(Stage::Extraction, Utc::now()))
    .await
    .unwrap()
    .unwrap();
  h.engine.reset(h.user, memo.artifact_id, None).await.unwrap();

  let settled = h.engine.run_extraction(claimed, old_run).await.unwrap();
  assert!(settled.is_none(), "a discarded run must not hand back its claimed snapshot");

  let stored = h.engine.artifact_for(h.user, memo.artifact_id).await.unwrap();
  assert_eq!(stored.extraction.status, StageStatus::Pending);
  assert_eq!(stored.transcript, None);
}

#[tokio::test]
async fn ingest_runs_both_stages_in_the_background() {
  let h = Harness::new().await;
  let mut input = NewArtifact::new(h.user, ArtifactKind::VoiceMemo);
  input.contact_id = Some(h.contact.contact_id);
  input.audio_ref = Some("memos/dana.m4a".into());

  let memo = h.engine.ingest(input).await.unwrap();
  assert_eq!(memo.extraction.status, StageStatus::Pending);

  let mut done = None;
  for _ in 0..100 {
    let current = h.engine.artifact_for(h.user, memo.artifact_id).await.unwrap();
    if current.ai.status == StageStatus::Completed {
      done = Some(current);
      break;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  let done = done.expect("pipeline did not finish");
  assert_eq!(done.transcript.as_deref(), Some(MEMO));
  h.only_batch(memo.artifact_id).await;
}

#[tokio::test]
async fn ingest_rejects_someone_elses_contact() {
  let h = Harness::new().await;
  let mut input = NewArtifact::new(Uuid::new_v4(), ArtifactKind::Note);
  input.contact_id = Some(h.contact.contact_id);

  let err = h.engine.ingest(input).await.unwrap_err();
  assert_eq!(err.code(), "FORBIDDEN");
}

// ─── Reprocessing ────────────────────────────────────────────────────────────

#[tokio::test]
async fn reset_of_pending_stage_changes_nothing() {
  let h = Harness::new().await;
  let memo = h.voice_memo().await;

  let once = h.engine.reset(h.user, memo.artifact_id, None).await.unwrap();
  let twice = h.engine.reset(h.user, memo.artifact_id, None).await.unwrap();
  assert_eq!(once.extraction, memo.extraction);
  assert_eq!(twice.extraction, memo.extraction);
  assert_eq!(twice.updated_at, memo.updated_at);
}

#[tokio::test]
async fn reset_ai_before_extraction_is_invalid() {
  let h = Harness::new().await;
  let memo = h.voice_memo().await;

  let err = h
    .engine
    .reset(h.user, memo.artifact_id, Some(Stage::Ai))
    .await
    .unwrap_err();
  assert_eq!(err.code(), "VALIDATION_ERROR");
}

#[tokio::test]
async fn only_the_owner_may_reprocess() {
  let h = Harness::new().await;
  let memo = h.voice_memo().await;

  let err = h
    .engine
    .reset(Uuid::new_v4(), memo.artifact_id, None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Forbidden { kind: "artifact", .. }));
  assert_eq!(err.code(), "FORBIDDEN");
}

#[tokio::test]
async fn reprocessing_supersedes_the_pending_batch() {
  let h = Harness::new().await;
  let note = h.add(ArtifactKind::Note, |a| a.content = Some("Hiring two engineers".into())).await;
  h.engine.process(note.artifact_id).await.unwrap();
  let first = h.only_batch(note.artifact_id).await;

  h.engine.reset(h.user, note.artifact_id, None).await.unwrap();
  h.engine.process(note.artifact_id).await.unwrap();

  let batches = h.batches(note.artifact_id).await;
  assert_eq!(batches.len(), 2);
  assert_eq!(batches[0].status, BatchStatus::Pending);
  assert_eq!(batches[1].batch_id, first.batch_id);
  assert_eq!(batches[1].status, BatchStatus::Stale);

  let err = h
    .engine
    .apply(h.user, first.batch_id, paths(&[GOALS]))
    .await
    .unwrap_err();
  assert_eq!(err.code(), "RECONCILIATION_ERROR");
}

// ─── Review ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_selection_rejects_batch() {
  let h = Harness::new().await;
  let memo = h.voice_memo().await;
  h.engine.process(memo.artifact_id).await.unwrap();
  let batch = h.only_batch(memo.artifact_id).await;

  let outcome = h
    .engine
    .apply(h.user, batch.batch_id, BTreeSet::new())
    .await
    .unwrap();
  assert_eq!(outcome.batch.status, BatchStatus::Rejected);
  assert!(outcome.batch.user_selections.is_empty());
  assert_eq!(h.contact().await, h.contact);
}

#[tokio::test]
async fn applying_twice_is_a_reconciliation_error() {
  let h = Harness::new().await;
  let memo = h.voice_memo().await;
  h.engine.process(memo.artifact_id).await.unwrap();
  let batch = h.only_batch(memo.artifact_id).await;

  let all = paths(&[GOALS, TITLE]);
  let first = h.engine.apply(h.user, batch.batch_id, all.clone()).await.unwrap();
  assert_eq!(first.batch.status, BatchStatus::Approved);

  let err = h.engine.apply(h.user, batch.batch_id, all).await.unwrap_err();
  assert_eq!(err.code(), "RECONCILIATION_ERROR");
  assert_eq!(h.contact().await.revision, 1);
}

#[tokio::test]
async fn selection_outside_batch_is_invalid() {
  let h = Harness::new().await;
  let memo = h.voice_memo().await;
  h.engine.process(memo.artifact_id).await.unwrap();
  let batch = h.only_batch(memo.artifact_id).await;

  let stray = FieldPath::Top(ContactField::Phone);
  let err = h
    .engine
    .apply(h.user, batch.batch_id, paths(&[GOALS, stray]))
    .await
    .unwrap_err();
  assert_eq!(err.code(), "VALIDATION_ERROR");
  assert_eq!(h.contact().await.revision, 0);
}

#[tokio::test]
async fn concurrent_reviews_of_one_contact_both_land() {
  let h = Harness::new().await;

  h.generator.set(Reply::Ok(vec![proposed(
    "professional_context.goals",
    "add",
    json!("mentoring"),
    0.9,
  )]));
  let a = h.add(ArtifactKind::Note, |a| a.content = Some("mentoring".into())).await;
  h.engine.process(a.artifact_id).await.unwrap();

  h.generator.set(Reply::Ok(vec![proposed(
    "professional_context.goals",
    "add",
    json!("fundraising"),
    0.9,
  )]));
  let b = h.add(ArtifactKind::Note, |a| a.content = Some("fundraising".into())).await;
  h.engine.process(b.artifact_id).await.unwrap();

  let (batch_a, batch_b) = (h.only_batch(a.artifact_id).await, h.only_batch(b.artifact_id).await);
  let (ra, rb) = tokio::join!(
    h.engine.apply(h.user, batch_a.batch_id, paths(&[GOALS])),
    h.engine.apply(h.user, batch_b.batch_id, paths(&[GOALS])),
  );
  ra.unwrap();
  rb.unwrap();

  let contact = h.contact().await;
  let goals: BTreeSet<&str> = contact
    .professional_context
    .goals
    .iter()
    .map(String::as_str)
    .collect();
  assert_eq!(goals, BTreeSet::from(["mentoring", "fundraising"]));
  assert_eq!(contact.revision, 2);
}

// ─── Deletion guard ──────────────────────────────────────────────────────────

#[tokio::test]
async fn source_artifacts_cannot_be_deleted() {
  let h = Harness::new().await;
  let memo = h.voice_memo().await;
  h.engine.process(memo.artifact_id).await.unwrap();
  let batch = h.only_batch(memo.artifact_id).await;
  h.engine
    .apply(h.user, batch.batch_id, paths(&[GOALS]))
    .await
    .unwrap();

  let err = h
    .engine
    .delete_artifact(h.user, memo.artifact_id)
    .await
    .unwrap_err();
  assert_eq!(err.code(), "ARTIFACT_IS_SOURCE");
  let Error::ArtifactIsSource { references, .. } = err else { unreachable!() };
  assert_eq!(references.source_fields[0].field_path, GOALS);
  assert_eq!(references.applied_batches, [batch.batch_id]);

  assert!(h.blobs.deleted.lock().unwrap().is_empty());
  h.engine.artifact_for(h.user, memo.artifact_id).await.unwrap();
}

#[tokio::test]
async fn unreferenced_artifact_is_deleted_with_its_blob() {
  let h = Harness::new().await;
  let memo = h.voice_memo().await;
  h.engine.process(memo.artifact_id).await.unwrap();
  let batch = h.only_batch(memo.artifact_id).await;

  let deleted = h.engine.delete_artifact(h.user, memo.artifact_id).await.unwrap();
  assert_eq!(deleted.artifact_id, memo.artifact_id);
  assert_eq!(*h.blobs.deleted.lock().unwrap(), ["memos/dana.m4a"]);

  let err = h.engine.artifact_for(h.user, memo.artifact_id).await.unwrap_err();
  assert_eq!(err.code(), "NOT_FOUND");

  let stale = h.engine.batch_for(h.user, batch.batch_id).await.unwrap();
  assert_eq!(stale.status, BatchStatus::Stale);
}

#[tokio::test]
async fn blob_failure_does_not_undo_deletion() {
  let h = Harness::with_blobs(FakeBlobs { broken: true, ..FakeBlobs::default() }).await;
  let memo = h.voice_memo().await;

  h.engine.delete_artifact(h.user, memo.artifact_id).await.unwrap();
  assert!(h.engine.store().get_artifact(memo.artifact_id).await.unwrap().is_none());
}

#[tokio::test]
async fn only_the_owner_may_delete() {
  let h = Harness::new().await;
  let memo = h.voice_memo().await;

  let err = h
    .engine
    .delete_artifact(Uuid::new_v4(), memo.artifact_id)
    .await
    .unwrap_err();
  assert_eq!(err.code(), "FORBIDDEN");
  h.engine.artifact_for(h.user, memo.artifact_id).await.unwrap();
}
