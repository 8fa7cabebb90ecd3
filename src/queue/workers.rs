// Job worker: pop, decode, run the pipeline, persist

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, RwLock};
use tracing::{debug, error, info, warn};

use crate::agents::QuizPipeline;
use crate::config::Config;
use crate::db::QuizStore;
use crate::models::{ErrorRecord, QuizEntry, QuizResult};
use crate::queue::jobs::Job;
use crate::queue::JobQueue;
use crate::types::{AppError, AppResult};
use crate::utils::BackoffPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkerState {
    Waiting,
    Decoding,
    Processing,
    Persisting,
}

/// Live counters shared with the health endpoint.
#[derive(Debug)]
pub struct WorkerStats {
    state: RwLock<WorkerState>,
    last_job_at: RwLock<Option<DateTime<Utc>>>,
    processed: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerSnapshot {
    pub state: WorkerState,
    pub processed: u64,
    pub failed: u64,
    pub last_job_at: Option<DateTime<Utc>>,
}

impl Default for WorkerStats {
    fn default() -> Self {
        Self {
            state: RwLock::new(WorkerState::Waiting),
            last_job_at: RwLock::new(None),
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }
}

impl WorkerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_state(&self, state: WorkerState) {
        *self.state.write().await = state;
    }

    async fn record(&self, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Completed { .. } => self.processed.fetch_add(1, Ordering::Relaxed),
            JobOutcome::Failed(_) => self.failed.fetch_add(1, Ordering::Relaxed),
        };
        *self.last_job_at.write().await = Some(Utc::now());
    }

    pub async fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            state: *self.state.read().await,
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            last_job_at: *self.last_job_at.read().await,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub files_dir: PathBuf,
    pub pop_timeout: Duration,
    pub backoff: BackoffPolicy,
}

impl TryFrom<&Config> for WorkerSettings {
    type Error = AppError;

    fn try_from(config: &Config) -> AppResult<Self> {
        Ok(Self {
            files_dir: config.worker.files_dir.clone(),
            pop_timeout: config.pop_timeout()?,
            backoff: BackoffPolicy::from_millis(config.worker.backoff_base_ms, config.worker.backoff_max_ms),
        })
    }
}

/// How a dequeued job ended. Either way the job is closed.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Completed {
        quiz_id: String,
        entries: usize,
        /// Quiz documents the append matched; 0 means the quiz id is unknown.
        matched: u64,
    },
    Failed(ErrorRecord),
}

pub struct Worker {
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn QuizStore>,
    pipeline: Arc<QuizPipeline>,
    settings: WorkerSettings,
    stats: Arc<WorkerStats>,
}

impl Worker {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        store: Arc<dyn QuizStore>,
        pipeline: Arc<QuizPipeline>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            queue,
            store,
            pipeline,
            settings,
            stats: Arc::new(WorkerStats::new()),
        }
    }

    pub fn stats(&self) -> Arc<WorkerStats> {
        self.stats.clone()
    }

    /// Process jobs until `shutdown` turns true or its sender is dropped.
    /// Transport errors never end the loop; they pause it.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            queue = self.queue.name(),
            files_dir = %self.settings.files_dir.display(),
            "Worker started"
        );
        let mut backoff = self.settings.backoff.start();

        loop {
            if *shutdown.borrow() || shutdown.has_changed().is_err() {
                break;
            }

            match self.run_once().await {
                Ok(_) => backoff.reset(),
                Err(e) => {
                    let delay = backoff.next_delay();
                    error!(
                        error = %e,
                        attempt = backoff.attempts(),
                        delay_ms = delay.as_millis() as u64,
                        "Worker iteration failed"
                    );
                    self.stats.set_state(WorkerState::Waiting).await;
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
        }

        info!("Worker stopped");
    }

    /// One WAITING pass: `Ok(None)` when the pop timed out.
    pub async fn run_once(&self) -> AppResult<Option<JobOutcome>> {
        self.stats.set_state(WorkerState::Waiting).await;

        let Some(raw) = self.queue.pop(self.settings.pop_timeout).await? else {
            return Ok(None);
        };
        debug!(queue = %raw.queue, bytes = raw.payload.len(), "Job received");

        let outcome = self.process_job(&raw.payload).await?;
        self.stats.set_state(WorkerState::Waiting).await;
        Ok(Some(outcome))
    }

    /// Decode, process and persist one payload. Only a failure to persist
    /// the error record itself is returned as `Err`.
    pub async fn process_job(&self, payload: &[u8]) -> AppResult<JobOutcome> {
        let started = Instant::now();
        self.stats.set_state(WorkerState::Decoding).await;

        let job = match Job::decode(payload) {
            Ok(job) => job,
            Err(e) => {
                warn!(job_id = e.job_id_or_unknown(), error = %e, "Rejecting malformed job");
                let record = ErrorRecord::failed(
                    e.job_id_or_unknown(),
                    e.quiz_id.clone(),
                    e.file_name_or_unknown(),
                    e.to_string(),
                );
                return self.fail(record).await;
            }
        };

        info!(
            job_id = job.job_id_or_unknown(),
            quiz_id = %job.quiz_id,
            file = %job.file_name,
            "Processing job"
        );

        match self.execute(&job).await {
            Ok((entries, matched)) => {
                if matched == 0 {
                    warn!(quiz_id = %job.quiz_id, "No quiz document matched, result discarded");
                }
                info!(
                    job_id = job.job_id_or_unknown(),
                    quiz_id = %job.quiz_id,
                    entries,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Job completed"
                );
                let outcome = JobOutcome::Completed {
                    quiz_id: job.quiz_id,
                    entries,
                    matched,
                };
                self.stats.record(&outcome).await;
                Ok(outcome)
            }
            Err(e) => {
                warn!(job_id = job.job_id_or_unknown(), quiz_id = %job.quiz_id, error = %e, "Job failed");
                let record = ErrorRecord::failed(
                    job.job_id_or_unknown(),
                    Some(job.quiz_id.clone()),
                    job.file_name.clone(),
                    e.to_string(),
                );
                self.fail(record).await
            }
        }
    }

    async fn execute(&self, job: &Job) -> AppResult<(usize, u64)> {
        let path = job.resolve_path(&self.settings.files_dir)?;

        self.stats.set_state(WorkerState::Processing).await;
        let entries: Vec<QuizEntry> = self.pipeline.run(&path).await?;
        if entries.is_empty() {
            warn!(quiz_id = %job.quiz_id, "Pipeline produced no questions");
        }

        self.stats.set_state(WorkerState::Persisting).await;
        let result = QuizResult {
            quiz_id: job.quiz_id.clone(),
            entries,
        };
        let matched = self.store.append_quiz(&result).await?;
        Ok((result.entries.len(), matched))
    }

    async fn fail(&self, record: ErrorRecord) -> AppResult<JobOutcome> {
        self.stats.set_state(WorkerState::Persisting).await;
        self.store.record_failure(&record).await?;
        let outcome = JobOutcome::Failed(record);
        self.stats.record(&outcome).await;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::QuestionAgent;
    use crate::config::{PipelineConfig, PipelineMode};
    use crate::models::OptionLetter;
    use crate::testing::{llm_with, MemoryQueue, MemoryStore, QueueEvent, ScriptedAdapter, StubExtractor};
    use std::path::Path;

    const MCQ_REPLY: &str = "Question: What gas do plants absorb?\n\
        A. Oxygen\n\
        B. Carbon dioxide\n\
        C. Nitrogen\n\
        D. Helium\n\
        Correct Answer: B";

    fn pipeline_config() -> PipelineConfig {
        PipelineConfig {
            mode: PipelineMode::Mcq,
            chunk_size: 250,
            chunk_overlap: 50,
            answer_chunk_size: 200,
            answer_chunk_overlap: 25,
            max_chunks: 10,
            max_questions: 5,
            retrieval_top_k: 4,
        }
    }

    fn settings() -> WorkerSettings {
        WorkerSettings {
            files_dir: PathBuf::from("/data/uploads"),
            pop_timeout: Duration::from_millis(10),
            backoff: BackoffPolicy::Fixed(Duration::from_millis(1)),
        }
    }

    struct Harness {
        worker: Worker,
        store: Arc<MemoryStore>,
        queue: Arc<MemoryQueue>,
        extracted: Arc<std::sync::Mutex<Vec<PathBuf>>>,
    }

    fn harness(queue: MemoryQueue, store: MemoryStore, extractor: StubExtractor) -> Harness {
        let extracted = extractor.paths();
        let pipeline = QuizPipeline::new(
            Arc::new(extractor),
            QuestionAgent::new(llm_with(ScriptedAdapter::always(MCQ_REPLY))),
            None,
            pipeline_config(),
        )
        .unwrap();
        let store = Arc::new(store);
        let queue = Arc::new(queue);
        let worker = Worker::new(queue.clone(), store.clone(), Arc::new(pipeline), settings());
        Harness {
            worker,
            store,
            queue,
            extracted,
        }
    }

    #[tokio::test]
    async fn test_successful_job_appends_one_update() {
        let h = harness(
            MemoryQueue::payloads(&[r#"{"fileName":"test.pdf","quizId":"q1"}"#]),
            MemoryStore::new(),
            StubExtractor::text("Plants absorb carbon dioxide from the air."),
        );

        let outcome = h.worker.run_once().await.unwrap().unwrap();

        assert!(matches!(outcome, JobOutcome::Completed { entries: 1, matched: 1, .. }));
        let updates = h.store.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].quiz_id, "q1");
        match &updates[0].entries[..] {
            [QuizEntry::MultipleChoice(mcq)] => {
                assert_eq!(mcq.question, "What gas do plants absorb?");
                assert_eq!(mcq.options.b, "Carbon dioxide");
                assert_eq!(mcq.correct_option, OptionLetter::B);
            }
            other => panic!("unexpected entries: {:?}", other),
        }
        assert!(h.store.errors().is_empty());
        assert_eq!(
            h.extracted.lock().unwrap().as_slice(),
            &[Path::new("/data/uploads/test.pdf").to_path_buf()]
        );
    }

    #[tokio::test]
    async fn test_invalid_json_records_failure_and_next_job_runs() {
        let h = harness(
            MemoryQueue::payloads(&["{not json", r#"{"fileName":"b.pdf","quizId":"q2"}"#]),
            MemoryStore::new(),
            StubExtractor::text("Some text."),
        );

        let first = h.worker.run_once().await.unwrap().unwrap();
        let second = h.worker.run_once().await.unwrap().unwrap();

        let errors = h.store.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].status, "failed");
        assert_eq!(errors[0].job_id, "unknown");
        assert_eq!(errors[0].filename, "unknown");
        assert!(matches!(first, JobOutcome::Failed(_)));
        assert!(matches!(second, JobOutcome::Completed { .. }));
        assert_eq!(h.store.updates().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_quiz_id_salvages_fields() {
        let h = harness(MemoryQueue::new(vec![]), MemoryStore::new(), StubExtractor::text("x"));

        h.worker
            .process_job(br#"{"filename":"a.pdf","job_id":"j7"}"#)
            .await
            .unwrap();

        let errors = h.store.errors();
        assert_eq!(errors[0].job_id, "j7");
        assert_eq!(errors[0].filename, "a.pdf");
        assert!(errors[0].quiz_id.is_none());
    }

    #[tokio::test]
    async fn test_extraction_failure_records_error() {
        let h = harness(
            MemoryQueue::new(vec![]),
            MemoryStore::new(),
            StubExtractor::failing("file not found"),
        );

        let outcome = h
            .worker
            .process_job(br#"{"fileName":"gone.pdf","quizId":"q3","jobId":"j3"}"#)
            .await
            .unwrap();

        let JobOutcome::Failed(record) = outcome else {
            panic!("expected failure");
        };
        assert_eq!(record.job_id, "j3");
        assert_eq!(record.quiz_id.as_deref(), Some("q3"));
        assert!(record.error.contains("file not found"));
        assert!(h.store.updates().is_empty());
    }

    #[tokio::test]
    async fn test_path_traversal_never_reaches_extractor() {
        let h = harness(MemoryQueue::new(vec![]), MemoryStore::new(), StubExtractor::text("x"));

        let outcome = h
            .worker
            .process_job(br#"{"fileName":"../../etc/passwd","quizId":"q1"}"#)
            .await
            .unwrap();

        assert!(matches!(outcome, JobOutcome::Failed(_)));
        assert!(h.extracted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_quiz_completes_without_error_record() {
        let h = harness(
            MemoryQueue::new(vec![]),
            MemoryStore::knowing(&["other"]),
            StubExtractor::text("Plants absorb carbon dioxide."),
        );

        let outcome = h
            .worker
            .process_job(br#"{"fileName":"test.pdf","quizId":"missing"}"#)
            .await
            .unwrap();

        assert!(matches!(outcome, JobOutcome::Completed { matched: 0, .. }));
        assert!(h.store.errors().is_empty());
        assert_eq!(h.worker.stats().snapshot().await.processed, 1);
    }

    #[tokio::test]
    async fn test_unavailable_store_surfaces_error() {
        let h = harness(
            MemoryQueue::new(vec![]),
            MemoryStore::unavailable(),
            StubExtractor::text("text"),
        );
        assert!(h.worker.process_job(b"garbage").await.is_err());
    }

    #[tokio::test]
    async fn test_run_survives_transport_errors_and_stops_on_shutdown() {
        let h = harness(
            MemoryQueue::new(vec![
                QueueEvent::TransportError("connection reset".to_string()),
                QueueEvent::Payload(br#"{"fileName":"test.pdf","quizId":"q1"}"#.to_vec()),
            ]),
            MemoryStore::new(),
            StubExtractor::text("Plants absorb carbon dioxide."),
        );
        let (tx, rx) = watch::channel(false);
        let store = h.store.clone();
        let queue = h.queue.clone();
        let stats = h.worker.stats();

        let handle = tokio::spawn(async move { h.worker.run(rx).await });

        for _ in 0..200 {
            if !store.updates().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker did not stop")
            .unwrap();

        assert_eq!(queue.remaining(), 0);
        assert_eq!(store.updates().len(), 1);
        assert_eq!(stats.snapshot().await.processed, 1);
        assert_eq!(stats.snapshot().await.state, WorkerState::Waiting);
    }
}
