//! Job Coordinator
//!
//! Drives documents through their lifecycle:
//!
//! ```text
//! uploaded --claim--> processing --+--> ocr_completed
//!                                  +--> error
//! ```
//!
//! One cycle asks the [`WorkSource`] for a pending document, claims it with a
//! compare-and-set on its status, and only then reads the source, extracts the lines and
//! recognizes them one by one in page order. Failures are handled at three levels:
//!
//! - a line whose recognition fails, or whose text is blank, is skipped and logged
//! - any other failure while a document is claimed discards the attempt's result and
//!   segments and moves the document to `error`
//! - a failure while looking for work is reported to [`JobCoordinator::run`], which logs
//!   it and backs off before polling again

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::source::{StorePoller, WorkSource};
use crate::artifacts::ArtifactStore;
use crate::core::config::WorkerConfig;
use crate::core::errors::{BoxError, JobError, PipelineError, PipelineStage};
use crate::domain::{
    Document, DocumentId, DocumentStatus, NewLineSegment, ResultId, join_lines, mean_confidence,
};
use crate::pipeline::LineExtractor;
use crate::recognizer::LineRecognizer;
use crate::store::DocumentStore;

/// Longest uninterrupted sleep; the shutdown flag is checked at least this often.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// What one cycle of the coordinator did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing was waiting.
    Idle,
    /// The document reached `ocr_completed` with `lines` persisted segments.
    Completed { document_id: DocumentId, lines: usize },
    /// The document reached `error`.
    Failed { document_id: DocumentId },
    /// Another worker claimed the document first.
    Skipped { document_id: DocumentId },
}

/// Counters reported when [`JobCoordinator::run`] returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cycle_errors: usize,
}

/// Claims pending documents and processes them to a terminal status.
pub struct JobCoordinator {
    store: Arc<dyn DocumentStore>,
    source: Box<dyn WorkSource>,
    artifacts: Arc<dyn ArtifactStore>,
    extractor: Arc<dyn LineExtractor>,
    recognizer: Arc<dyn LineRecognizer>,
    config: WorkerConfig,
}

impl JobCoordinator {
    /// Builds a coordinator polling `store` for work.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        artifacts: Arc<dyn ArtifactStore>,
        extractor: Arc<dyn LineExtractor>,
        recognizer: Arc<dyn LineRecognizer>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            source: Box::new(StorePoller::new(store.clone())),
            store,
            artifacts,
            extractor,
            recognizer,
            config,
        }
    }

    /// Replaces the default store poller.
    pub fn with_source(mut self, source: Box<dyn WorkSource>) -> Self {
        self.source = source;
        self
    }

    /// Runs one cycle: find, claim and process at most one document.
    ///
    /// Only failures of the polling itself are returned as errors; a document that
    /// fails ends in `error` and is reported as [`CycleOutcome::Failed`].
    pub fn run_once(&self) -> Result<CycleOutcome, JobError> {
        let document = match self.source.next_pending() {
            Ok(Some(document)) => document,
            Ok(None) => return Ok(CycleOutcome::Idle),
            Err(source) => return Err(JobError::Cycle { source }),
        };
        self.claim_and_process(&document)
    }

    /// Claims and processes a specific document, which must be `uploaded`.
    pub fn process_document(&self, document_id: DocumentId) -> Result<CycleOutcome, JobError> {
        let document = self
            .store
            .get_document(document_id)
            .map_err(|source| JobError::Cycle { source })?;
        self.claim_and_process(&document)
    }

    /// Loops over [`run_once`](Self::run_once) until `shutdown` is set.
    ///
    /// The flag is checked between cycles and while sleeping; a document already being
    /// processed is always driven to a terminal status first.
    pub fn run(&self, shutdown: &AtomicBool) -> WorkerStats {
        let mut stats = WorkerStats::default();
        tracing::info!(target: "worker", "Worker started");

        while !shutdown.load(Ordering::SeqCst) {
            match self.run_once() {
                Ok(CycleOutcome::Idle) => self.pause(self.config.idle_interval, shutdown),
                Ok(CycleOutcome::Completed { .. }) => stats.completed += 1,
                Ok(CycleOutcome::Failed { .. }) => stats.failed += 1,
                Ok(CycleOutcome::Skipped { .. }) => stats.skipped += 1,
                Err(err) => {
                    stats.cycle_errors += 1;
                    tracing::error!(
                        target: "worker",
                        stage = %err.stage(),
                        error = %err,
                        cause = %source_chain(&err),
                        backoff_ms = self.config.error_backoff.as_millis() as u64,
                        "Worker cycle failed; backing off"
                    );
                    self.pause(self.config.error_backoff, shutdown);
                }
            }
        }

        tracing::info!(
            target: "worker",
            completed = stats.completed,
            failed = stats.failed,
            skipped = stats.skipped,
            cycle_errors = stats.cycle_errors,
            "Worker stopped"
        );
        stats
    }

    fn pause(&self, duration: Duration, shutdown: &AtomicBool) {
        let deadline = Instant::now() + duration;
        while !shutdown.load(Ordering::SeqCst) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(SHUTDOWN_POLL));
        }
    }

    fn claim_and_process(&self, document: &Document) -> Result<CycleOutcome, JobError> {
        let claimed = self
            .store
            .transition_status(
                document.id,
                DocumentStatus::Uploaded,
                DocumentStatus::Processing,
            )
            .map_err(|source| JobError::Cycle { source })?;
        if !claimed {
            let err = JobError::ClaimLost {
                document_id: document.id,
            };
            tracing::info!(target: "worker", document_id = %document.id, "{err}");
            return Ok(CycleOutcome::Skipped {
                document_id: document.id,
            });
        }
        tracing::info!(
            target: "worker",
            document_id = %document.id,
            filename = %document.filename,
            "Claimed document"
        );

        let mut attempt = Attempt::default();
        match self.process_claimed(document, &mut attempt) {
            Ok(lines) => {
                tracing::info!(
                    target: "worker",
                    document_id = %document.id,
                    lines,
                    "Document completed"
                );
                Ok(CycleOutcome::Completed {
                    document_id: document.id,
                    lines,
                })
            }
            Err(err) => {
                tracing::error!(
                    target: "worker",
                    document_id = %document.id,
                    stage = %err.stage(),
                    error = %err,
                    cause = %source_chain(&err),
                    "Document failed"
                );
                if let Err(store_err) = self.store.fail_document(document.id, attempt.result_id) {
                    // The document stays in `processing`; nothing else can be done here.
                    tracing::error!(
                        target: "worker",
                        document_id = %document.id,
                        stage = %PipelineStage::Persistence,
                        error = %store_err,
                        "Could not move document to error"
                    );
                }
                self.discard_crops(document.id, &attempt.crops);
                Ok(CycleOutcome::Failed {
                    document_id: document.id,
                })
            }
        }
    }

    fn discard_crops(&self, document_id: DocumentId, crops: &[String]) {
        for image_path in crops {
            if let Err(err) = self.artifacts.remove_line(image_path) {
                tracing::warn!(
                    target: "worker",
                    document_id = %document_id,
                    image_path = %image_path,
                    error = %err,
                    "Could not delete crop of failed attempt"
                );
            }
        }
    }

    /// Processes a claimed document, recording what it writes in `attempt`.
    fn process_claimed(&self, document: &Document, attempt: &mut Attempt) -> Result<usize, JobError> {
        let id = document.id;
        let persistence = |e: BoxError| JobError::critical(id, PipelineStage::Persistence, e);

        let bytes = self.artifacts.read_source(&document.source_path).map_err(|e| {
            JobError::from_pipeline(id, PipelineError::load(&document.source_path, e.to_string()))
        })?;
        let lines = self
            .extractor
            .extract(&document.source_path, &bytes, document.kind)
            .map_err(|e| JobError::from_pipeline(id, e))?;
        tracing::info!(target: "worker", document_id = %id, lines = lines.len(), "Segmented document");

        let result = self
            .store
            .create_result(id)
            .map_err(|e| persistence(e.into()))?;
        attempt.result_id = Some(result.id);

        let mut texts = Vec::with_capacity(lines.len());
        let mut confidences = Vec::with_capacity(lines.len());
        for line in &lines {
            let recognition = match self.recognizer.recognize(&line.image) {
                Ok(recognition) => recognition,
                Err(err) => {
                    tracing::warn!(
                        target: "worker",
                        document_id = %id,
                        line_index = line.index,
                        stage = %PipelineStage::Recognition,
                        error = %err,
                        "Line recognition failed; skipping line"
                    );
                    continue;
                }
            };
            let Some(text) = recognition.usable_text() else {
                tracing::debug!(
                    target: "worker",
                    document_id = %id,
                    line_index = line.index,
                    "Recognizer returned blank text; skipping line"
                );
                continue;
            };

            let image_path = self
                .artifacts
                .store_line(id, line.index, &line.image)
                .map_err(|e| persistence(e.into()))?;
            attempt.crops.push(image_path.clone());
            self.store
                .add_segment(
                    result.id,
                    NewLineSegment {
                        image_path,
                        text: text.to_string(),
                        confidence: recognition.confidence,
                    },
                )
                .map_err(|e| persistence(e.into()))?;
            texts.push(text.to_string());
            confidences.push(recognition.confidence);
        }

        let full_text = join_lines(texts.iter().map(String::as_str));
        self.store
            .complete_document(id, result.id, &full_text, mean_confidence(&confidences))
            .map_err(|e| persistence(e.into()))?;
        Ok(texts.len())
    }
}

/// Writes of one processing attempt, undone when it fails.
#[derive(Debug, Default)]
struct Attempt {
    result_id: Option<ResultId>,
    crops: Vec<String>,
}

/// Renders the chain of underlying causes of `err`, or an empty string.
fn source_chain(err: &dyn std::error::Error) -> String {
    let mut causes = Vec::new();
    let mut current = err.source();
    while let Some(cause) = current {
        causes.push(cause.to_string());
        current = cause.source();
    }
    causes.join(": ")
}
