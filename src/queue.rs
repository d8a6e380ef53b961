use crate::errors::RelayError;
use crate::models::TaskEnvelope;
use crate::router::{RelayOutcome, SubmissionRouter};
use moka::future::Cache;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// In-process relay task queue.
///
/// The relay only needs a narrow queue contract: enqueue a serialized
/// payload, skip scheduling when an identical payload is already pending,
/// run the handler asynchronously, and retry with backoff when the handler
/// reports a retryable failure. This module realizes that contract with a
/// tokio channel and a fingerprint index; a deployment with external queue
/// infrastructure replaces exactly this file.

/// Retries stop growing at this delay.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(15 * 60);

/// Safety TTL for pending fingerprints so a stuck worker cannot block
/// resubmission forever.
const PENDING_TTL: Duration = Duration::from_secs(600);

/// One scheduled unit of work.
#[derive(Debug)]
pub struct QueuedTask {
    pub id: Uuid,
    /// SHA-256 of the serialized envelope; the dedup key.
    pub fingerprint: String,
    /// Serialized [`TaskEnvelope`], decoded by the handler.
    pub payload: String,
    /// Completed delivery attempts so far.
    pub attempt: u32,
}

/// Result of an enqueue call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Scheduled(Uuid),
    /// An identical payload is already waiting; nothing was scheduled.
    Duplicate,
}

/// Backoff settings for retryable failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Exponential backoff: base × 2^(attempt-1), capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exp)
            .min(MAX_RETRY_DELAY)
    }
}

/// Producer half of the queue, shared by the intake hook and the worker.
#[derive(Clone)]
pub struct RelayQueue {
    tx: mpsc::Sender<QueuedTask>,
    pending: Cache<String, Uuid>,
}

impl RelayQueue {
    /// Creates the queue and the receiver to hand to [`spawn_worker`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<QueuedTask>) {
        let (tx, rx) = mpsc::channel(capacity);
        let pending = Cache::builder()
            .time_to_live(PENDING_TTL)
            .max_capacity(10_000)
            .build();
        (Self { tx, pending }, rx)
    }

    /// Schedules a task for the given envelope unless an identical payload
    /// is already pending.
    ///
    /// The pending index is keyed by a fingerprint of the serialized
    /// envelope, so a rapid double-submit of the same form data schedules
    /// exactly one task. The insert is atomic per key; two concurrent
    /// submits cannot both win.
    pub async fn enqueue(&self, envelope: &TaskEnvelope) -> Result<EnqueueOutcome, RelayError> {
        let payload = serde_json::to_string(envelope).map_err(|e| {
            RelayError::Internal(format!("could not serialize task envelope: {}", e))
        })?;
        let id = Uuid::new_v4();
        let fingerprint = fingerprint(&payload);

        let entry = self.pending.entry(fingerprint.clone()).or_insert(id).await;
        if !entry.is_fresh() {
            tracing::info!("Identical task already pending, skipping duplicate scheduling");
            return Ok(EnqueueOutcome::Duplicate);
        }

        let task = QueuedTask {
            id,
            fingerprint: fingerprint.clone(),
            payload,
            attempt: 0,
        };
        if self.tx.send(task).await.is_err() {
            self.pending.invalidate(&fingerprint).await;
            return Err(RelayError::Internal(
                "task queue is not running".to_string(),
            ));
        }

        tracing::info!("Scheduled relay task {}", id);
        Ok(EnqueueOutcome::Scheduled(id))
    }

    /// Re-schedules a failed task after `delay`.
    ///
    /// The fingerprint goes back into the pending index immediately, so
    /// identical submissions stay deduplicated while the retry waits.
    async fn retry_after(&self, delay: Duration, task: QueuedTask) {
        self.pending
            .insert(task.fingerprint.clone(), task.id)
            .await;
        tokio::time::sleep(delay).await;
        if self.tx.send(task).await.is_err() {
            tracing::error!("Task queue closed, dropping retry");
        }
    }
}

/// Starts the queue worker.
///
/// Each received task runs in its own spawned task, so one slow delivery
/// never blocks the rest; within a task all calls remain sequential.
pub fn spawn_worker(
    mut rx: mpsc::Receiver<QueuedTask>,
    queue: RelayQueue,
    router: Arc<SubmissionRouter>,
    policy: RetryPolicy,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("Relay queue worker started");
        while let Some(task) = rx.recv().await {
            // The task is no longer pending; an identical submission from
            // here on schedules a fresh task.
            queue.pending.invalidate(&task.fingerprint).await;

            let router = router.clone();
            let queue = queue.clone();
            tokio::spawn(async move {
                run_task(task, queue, router, policy).await;
            });
        }
        tracing::info!("Relay queue worker stopped");
    })
}

async fn run_task(
    task: QueuedTask,
    queue: RelayQueue,
    router: Arc<SubmissionRouter>,
    policy: RetryPolicy,
) {
    tracing::info!(
        "Processing relay task {} (attempt {})",
        task.id,
        task.attempt + 1
    );

    match router.process(&task.payload).await {
        RelayOutcome::Success => {
            tracing::info!("Relay task {} succeeded", task.id);
        }
        RelayOutcome::TerminalFailure(reason) => {
            tracing::error!("Relay task {} ended terminally: {}", task.id, reason);
        }
        RelayOutcome::RetryableFailure(err) => {
            let next_attempt = task.attempt + 1;
            if next_attempt >= policy.max_attempts {
                tracing::error!(
                    "Relay task {} abandoned after {} attempts: {}",
                    task.id,
                    next_attempt,
                    err
                );
                return;
            }
            let delay = policy.delay_for(next_attempt);
            tracing::warn!(
                "Relay task {} failed (attempt {}), retrying in {:?}: {}",
                task.id,
                next_attempt,
                delay,
                err
            );
            queue
                .retry_after(
                    delay,
                    QueuedTask {
                        attempt: next_attempt,
                        ..task
                    },
                )
                .await;
        }
    }
}

fn fingerprint(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}
