//! Pipeline coordinator: runs one accepted issue through
//! embed → search → decide → comment → persist.
//!
//! Failure policy per step:
//! - embed: fatal, nothing after it runs
//! - search: degrades to an empty candidate list
//! - comment: logged, never rolled back
//! - persist: always attempted once the comment step is over; failure ends
//!   the run in `Error(Persist)`
//!
//! Every remote call is bounded by the call timeout and by the process
//! shutdown token.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dupradar_core::embeddings::{EmbeddingBackend, TaskType};
use dupradar_core::{DupRadarConfig, FingerprintRow, IssueCreated, SimilarityCandidate, TriageSettings};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::subsystems::comment::CommentPoster;
use crate::subsystems::fingerprint::FingerprintStore;
use crate::subsystems::search::SimilaritySearch;
use crate::telemetry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Auth,
    Parse,
    Embed,
    Search,
    Comment,
    Persist,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Auth => "auth",
            Stage::Parse => "parse",
            Stage::Embed => "embed",
            Stage::Search => "search",
            Stage::Comment => "comment",
            Stage::Persist => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run states. `Received`, `Verified` and `Parsed` are reached at intake;
/// a run reported by the coordinator always ends in `Done` or `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Received,
    Verified,
    Parsed,
    Embedded,
    Searched,
    Decided,
    Commented,
    Persisted,
    Done,
    Error(Stage),
}

impl RunState {
    pub fn label(self) -> &'static str {
        match self {
            RunState::Received => "received",
            RunState::Verified => "verified",
            RunState::Parsed => "parsed",
            RunState::Embedded => "embedded",
            RunState::Searched => "searched",
            RunState::Decided => "decided",
            RunState::Commented => "commented",
            RunState::Persisted => "persisted",
            RunState::Done => "done",
            RunState::Error(_) => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Error(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepFailure {
    pub stage: Stage,
    pub message: String,
}

/// Outcome of a single run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub state: RunState,
    pub candidates: Vec<SimilarityCandidate>,
    pub comment_posted: bool,
    pub failures: Vec<StepFailure>,
}

impl PipelineReport {
    fn new() -> Self {
        Self {
            state: RunState::Parsed,
            candidates: Vec::new(),
            comment_posted: false,
            failures: Vec::new(),
        }
    }

    fn advance(&mut self, next: RunState) {
        tracing::debug!(from = self.state.label(), to = next.label(), "Run state transition");
        self.state = next;
    }

    fn record_failure(&mut self, stage: Stage, error: &CallError) {
        self.failures.push(StepFailure {
            stage,
            message: error.to_string(),
        });
    }

    pub fn failed_at(&self, stage: Stage) -> bool {
        self.failures.iter().any(|f| f.stage == stage)
    }
}

/// An accepted issue waiting for a run.
#[derive(Debug, Clone)]
pub struct PipelineJob {
    pub issue: IssueCreated,
    pub delivery_id: Option<Uuid>,
}

#[derive(Error, Debug)]
enum CallError {
    #[error("{0}")]
    Failed(String),
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("cancelled by shutdown")]
    Cancelled,
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub triage: TriageSettings,
    pub task_type: TaskType,
    pub call_timeout: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &DupRadarConfig) -> Self {
        Self {
            triage: TriageSettings::from(&config.triage),
            task_type: config.embedding.task_type,
            call_timeout: Duration::from_secs(config.pipeline.call_timeout_secs),
        }
    }
}

pub struct Pipeline {
    embedder: Arc<dyn EmbeddingBackend>,
    searcher: Arc<dyn SimilaritySearch>,
    poster: Arc<dyn CommentPoster>,
    store: Arc<dyn FingerprintStore>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingBackend>,
        searcher: Arc<dyn SimilaritySearch>,
        poster: Arc<dyn CommentPoster>,
        store: Arc<dyn FingerprintStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            embedder,
            searcher,
            poster,
            store,
            settings,
        }
    }

    /// Run one job to a terminal state.
    pub async fn run(&self, job: PipelineJob, shutdown: &CancellationToken) -> PipelineReport {
        let delivery = job
            .delivery_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        let span = tracing::info_span!(
            "triage_run",
            delivery = %delivery,
            repo = %job.issue.repository,
            issue = job.issue.number,
        );

        async move {
            let start = Instant::now();
            let report = self.execute(&job.issue, shutdown).await;
            finish(&report, start.elapsed());
            report
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, issue: &IssueCreated, shutdown: &CancellationToken) -> PipelineReport {
        let mut report = PipelineReport::new();

        let text = issue.embedding_text();
        let embedding = match self
            .call(shutdown, self.embedder.embed(&text, self.settings.task_type))
            .await
        {
            Ok(vector) => vector,
            Err(e) => {
                tracing::error!(error = %e, backend = self.embedder.name(), "Embedding unavailable; run abandoned");
                report.record_failure(Stage::Embed, &e);
                report.advance(RunState::Error(Stage::Embed));
                return report;
            }
        };
        if embedding.truncated {
            tracing::warn!(
                token_count = ?embedding.token_count,
                "Issue text was truncated before embedding"
            );
        }
        report.advance(RunState::Embedded);

        let repository = issue.repository.full_name();
        match self
            .call(
                shutdown,
                self.searcher
                    .nearest(&embedding, &repository, self.settings.triage.top_k),
            )
            .await
        {
            Ok(candidates) => report.candidates = candidates,
            Err(e) => {
                tracing::warn!(error = %e, "Similarity search unavailable; continuing without candidates");
                report.record_failure(Stage::Search, &e);
            }
        }
        report.advance(RunState::Searched);

        let decision = self.settings.triage.decide(&report.candidates);
        report.advance(RunState::Decided);

        match decision.comment_text() {
            Some(body) => match self
                .call(shutdown, self.poster.post(&issue.repository, issue.number, body))
                .await
            {
                Ok(()) => {
                    report.comment_posted = true;
                    report.advance(RunState::Commented);
                    metrics::counter!(telemetry::COMMENTS_POSTED).increment(1);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to post triage comment");
                    report.record_failure(Stage::Comment, &e);
                }
            },
            None => {
                tracing::debug!(
                    candidates = report.candidates.len(),
                    threshold = self.settings.triage.similarity_threshold,
                    "No candidate within threshold; not commenting"
                );
            }
        }

        let row = FingerprintRow::from_issue(issue, embedding);
        match self.call(shutdown, self.store.insert(&row)).await {
            Ok(()) => {
                report.advance(RunState::Persisted);
                report.advance(RunState::Done);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to persist fingerprint");
                report.record_failure(Stage::Persist, &e);
                report.advance(RunState::Error(Stage::Persist));
            }
        }

        report
    }

    async fn call<T, E, F>(&self, shutdown: &CancellationToken, fut: F) -> Result<T, CallError>
    where
        F: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let timeout = self.settings.call_timeout;
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => Err(CallError::Cancelled),
            outcome = tokio::time::timeout(timeout, fut) => match outcome {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(CallError::Failed(e.to_string())),
                Err(_) => Err(CallError::TimedOut(timeout)),
            },
        }
    }
}

fn finish(report: &PipelineReport, elapsed: Duration) {
    metrics::counter!(telemetry::RUNS_COMPLETED, "state" => report.state.label()).increment(1);
    metrics::histogram!(telemetry::RUN_DURATION).record(elapsed.as_secs_f64());
    for failure in &report.failures {
        metrics::counter!(telemetry::STEP_FAILURES, "stage" => failure.stage.as_str()).increment(1);
    }

    match report.state {
        RunState::Error(stage) => tracing::warn!(
            stage = %stage,
            elapsed_ms = elapsed.as_millis() as u64,
            "Triage run failed"
        ),
        _ => tracing::info!(
            candidates = report.candidates.len(),
            commented = report.comment_posted,
            elapsed_ms = elapsed.as_millis() as u64,
            "Triage run complete"
        ),
    }
}

// ============================================================================
// TESTS
// ============================================================================
