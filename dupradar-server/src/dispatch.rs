//! Dispatcher: bounded job queue in front of the pipeline.
//!
//! The webhook handler enqueues with `try_send` and never waits; a full queue
//! is reported back so the caller can answer 503. A single dispatcher task
//! drains the queue and spawns one task per job once a semaphore permit is
//! available, so at most `max_in_flight` runs execute at a time.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::pipeline::{Pipeline, PipelineJob};
use crate::telemetry;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DispatchError {
    #[error("pipeline queue is full")]
    QueueFull,
    #[error("pipeline is shutting down")]
    Closed,
}

/// Producer side of the queue, held by the HTTP layer.
#[derive(Clone, Debug)]
pub struct DispatchHandle {
    tx: mpsc::Sender<PipelineJob>,
    capacity: usize,
}

impl DispatchHandle {
    pub fn submit(&self, job: PipelineJob) -> Result<(), DispatchError> {
        let result = self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DispatchError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DispatchError::Closed,
        });
        self.report_depth();
        result
    }

    /// Jobs currently waiting in the queue.
    pub fn depth(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    fn report_depth(&self) {
        metrics::gauge!(telemetry::QUEUE_DEPTH).set(self.depth() as f64);
    }
}

/// Consumer side of the queue, owned by the dispatcher task.
#[derive(Debug)]
pub struct JobQueue {
    rx: mpsc::Receiver<PipelineJob>,
}

impl JobQueue {
    /// Next queued job, if any is waiting.
    pub fn try_next(&mut self) -> Option<PipelineJob> {
        self.rx.try_recv().ok()
    }
}

pub fn job_queue(capacity: usize) -> (DispatchHandle, JobQueue) {
    let capacity = capacity.max(1);
    let (tx, rx) = mpsc::channel(capacity);
    (DispatchHandle { tx, capacity }, JobQueue { rx })
}

/// Drain `queue` until shutdown, running at most `max_in_flight` jobs
/// concurrently. Returns once every started run has finished.
pub async fn run_dispatcher(
    mut queue: JobQueue,
    pipeline: Arc<Pipeline>,
    max_in_flight: usize,
    shutdown: CancellationToken,
) {
    let max_in_flight = max_in_flight.max(1);
    let semaphore = Arc::new(Semaphore::new(max_in_flight));
    let report_in_flight = |semaphore: &Semaphore| {
        metrics::gauge!(telemetry::IN_FLIGHT)
            .set((max_in_flight - semaphore.available_permits()) as f64);
    };

    tracing::info!(max_in_flight, "Pipeline dispatcher started");

    loop {
        let permit = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(p) => p,
                Err(_) => break,
            },
        };

        let job = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            job = queue.rx.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };
        metrics::gauge!(telemetry::QUEUE_DEPTH).set(queue.rx.len() as f64);
        report_in_flight(&semaphore);

        let pipeline = pipeline.clone();
        let token = shutdown.clone();
        let semaphore_ref = semaphore.clone();
        tokio::spawn(async move {
            pipeline.run(job, &token).await;
            drop(permit);
            metrics::gauge!(telemetry::IN_FLIGHT)
                .set((max_in_flight - semaphore_ref.available_permits()) as f64);
        });
    }

    queue.rx.close();
    let mut abandoned = 0usize;
    while let Some(job) = queue.try_next() {
        abandoned += 1;
        tracing::warn!(
            repo = %job.issue.repository,
            issue = job.issue.number,
            delivery = ?job.delivery_id,
            "Dropping queued job at shutdown"
        );
    }
    if abandoned > 0 {
        tracing::warn!(abandoned, "Queued jobs dropped at shutdown");
    }
    metrics::gauge!(telemetry::QUEUE_DEPTH).set(0.0);

    // Every permit back means every spawned run has returned.
    if let Ok(all) = semaphore.acquire_many(max_in_flight as u32).await {
        drop(all);
    }
    report_in_flight(&semaphore);
    tracing::info!("Pipeline dispatcher stopped");
}

// ============================================================================
// TESTS
// ============================================================================
