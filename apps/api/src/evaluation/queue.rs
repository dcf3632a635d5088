//! Background execution: a bounded FIFO queue feeding a fixed worker pool.
//! Enqueueing never blocks; a full queue is surfaced to the caller as
//! `QueueFull` backpressure. Each run occupies one worker for its full
//! duration; stages inside a run are strictly sequential.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::evaluation::matcher::MatcherConfig;
use crate::evaluation::pipeline::{
    self, CancelFlag, PipelineInput, ResumeDocument, StageDeps,
};
use crate::evaluation::recommend::Recommender;
use crate::evaluation::scorer::ScoringConfig;
use crate::embedding::Embedder;
use crate::taxonomy::TaxonomyHandle;

#[derive(Debug, Clone)]
pub struct EvalJob {
    pub evaluation_id: Uuid,
    pub resume_id: Uuid,
    pub job_id: Uuid,
}

/// Cancel flags for queued and running evaluations. A cancelled queued run
/// never starts; a cancelled running run stops at the next stage boundary.
#[derive(Clone, Default)]
pub struct CancelRegistry {
    flags: Arc<Mutex<HashMap<Uuid, CancelFlag>>>,
}

impl CancelRegistry {
    fn register(&self, id: Uuid) -> CancelFlag {
        let flag = CancelFlag::default();
        self.flags
            .lock()
            .expect("cancel registry lock poisoned")
            .insert(id, flag.clone());
        flag
    }

    fn remove(&self, id: Uuid) {
        self.flags
            .lock()
            .expect("cancel registry lock poisoned")
            .remove(&id);
    }

    fn get(&self, id: Uuid) -> Option<CancelFlag> {
        self.flags
            .lock()
            .expect("cancel registry lock poisoned")
            .get(&id)
            .cloned()
    }

    /// Sets the cancel flag for a tracked run. Returns false when the run is
    /// unknown (already finished or never submitted).
    pub fn cancel(&self, id: Uuid) -> bool {
        match self.get(id) {
            Some(flag) => {
                flag.cancel();
                true
            }
            None => false,
        }
    }
}

/// Everything a worker needs to build per-run `StageDeps`.
pub struct WorkerContext {
    pub db: PgPool,
    pub taxonomy: TaxonomyHandle,
    pub embedder: Arc<dyn Embedder>,
    pub recommender: Arc<dyn Recommender>,
    pub matcher: MatcherConfig,
    pub scoring: ScoringConfig,
    pub stage_timeout: Duration,
}

/// Handle for submitting and cancelling background evaluations.
#[derive(Clone)]
pub struct EvalQueue {
    tx: mpsc::Sender<EvalJob>,
    cancels: CancelRegistry,
}

impl EvalQueue {
    /// Enqueues a run. Fails fast with `QueueFull` instead of blocking when
    /// the queue is at capacity.
    pub fn submit(&self, job: EvalJob) -> Result<(), AppError> {
        let id = job.evaluation_id;
        self.cancels.register(id);
        match self.tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.cancels.remove(id);
                Err(AppError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.cancels.remove(id);
                Err(AppError::Internal(anyhow::anyhow!(
                    "evaluation worker pool is shut down"
                )))
            }
        }
    }

    pub fn cancel(&self, id: Uuid) -> bool {
        self.cancels.cancel(id)
    }
}

/// Spawns the worker pool and returns the submission handle. Workers share
/// the receiver behind an async mutex; the channel bound is the queue
/// capacity.
pub fn spawn_workers(
    context: WorkerContext,
    worker_count: usize,
    queue_capacity: usize,
) -> EvalQueue {
    let (tx, rx) = mpsc::channel::<EvalJob>(queue_capacity.max(1));
    let rx = Arc::new(tokio::sync::Mutex::new(rx));
    let cancels = CancelRegistry::default();
    let context = Arc::new(context);

    for worker_id in 0..worker_count.max(1) {
        let rx = rx.clone();
        let cancels = cancels.clone();
        let context = context.clone();
        tokio::spawn(async move {
            info!("Evaluation worker {worker_id} started");
            loop {
                let job = { rx.lock().await.recv().await };
                let Some(job) = job else {
                    info!("Evaluation worker {worker_id} stopping, queue closed");
                    break;
                };
                let id = job.evaluation_id;
                let flag = cancels.get(id).unwrap_or_default();
                process_job(job, flag, &context).await;
                cancels.remove(id);
            }
        });
    }

    EvalQueue { tx, cancels }
}

async fn process_job(job: EvalJob, cancel: CancelFlag, context: &WorkerContext) {
    let id = job.evaluation_id;

    if cancel.is_cancelled() {
        info!("Evaluation {id} cancelled before start");
        if let Err(e) = pipeline::mark_status(&context.db, id, "cancelled").await {
            error!("Failed to mark evaluation {id} cancelled: {e}");
        }
        return;
    }

    if let Err(e) = pipeline::mark_status(&context.db, id, "running").await {
        error!("Failed to mark evaluation {id} running: {e}");
    }

    let input = match load_input(&context.db, &job).await {
        Ok(input) => input,
        Err(message) => {
            warn!("Evaluation {id} aborted: {message}");
            if let Err(e) = pipeline::mark_failed(&context.db, id, &message).await {
                error!("Failed to mark evaluation {id} failed: {e}");
            }
            return;
        }
    };

    let deps = StageDeps {
        taxonomy: context.taxonomy.snapshot(),
        embedder: context.embedder.clone(),
        recommender: context.recommender.clone(),
        matcher: context.matcher.clone(),
        scoring: context.scoring.clone(),
        stage_timeout: context.stage_timeout,
        cancel,
    };

    let ctx = pipeline::run(input, &deps, &context.db).await;
    info!(
        "Evaluation {id} finished: status={} degraded={:?}",
        ctx.state.status_str(),
        ctx.degraded_dimensions()
    );
}

async fn load_input(db: &PgPool, job: &EvalJob) -> Result<PipelineInput, String> {
    let resume: Option<(String, Vec<u8>, Option<String>)> = sqlx::query_as(
        "SELECT file_name, content, extracted_text FROM resumes WHERE id = $1",
    )
    .bind(job.resume_id)
    .fetch_optional(db)
    .await
    .map_err(|e| format!("failed to load resume: {e}"))?;

    let (file_name, content, cached_text) =
        resume.ok_or_else(|| format!("resume {} not found", job.resume_id))?;

    let job_text: Option<(String,)> =
        sqlx::query_as("SELECT description_text FROM jobs WHERE id = $1")
            .bind(job.job_id)
            .fetch_optional(db)
            .await
            .map_err(|e| format!("failed to load job: {e}"))?;

    let (job_text,) = job_text.ok_or_else(|| format!("job {} not found", job.job_id))?;

    Ok(PipelineInput {
        evaluation_id: job.evaluation_id,
        resume_id: job.resume_id,
        job_id: job.job_id,
        resume: ResumeDocument {
            file_name,
            content,
            cached_text,
        },
        job_text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_with_capacity(capacity: usize) -> (EvalQueue, mpsc::Receiver<EvalJob>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            EvalQueue {
                tx,
                cancels: CancelRegistry::default(),
            },
            rx,
        )
    }

    fn job() -> EvalJob {
        EvalJob {
            evaluation_id: Uuid::new_v4(),
            resume_id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn test_submit_fails_fast_when_full() {
        let (queue, _rx) = queue_with_capacity(1);
        queue.submit(job()).unwrap();
        let err = queue.submit(job()).unwrap_err();
        assert!(matches!(err, AppError::QueueFull));
    }

    #[tokio::test]
    async fn test_queue_full_unregisters_cancel_flag() {
        let (queue, _rx) = queue_with_capacity(1);
        queue.submit(job()).unwrap();
        let rejected = job();
        let rejected_id = rejected.evaluation_id;
        assert!(queue.submit(rejected).is_err());
        assert!(!queue.cancel(rejected_id));
    }

    #[tokio::test]
    async fn test_cancel_known_and_unknown_runs() {
        let (queue, _rx) = queue_with_capacity(4);
        let submitted = job();
        let id = submitted.evaluation_id;
        queue.submit(submitted).unwrap();
        assert!(queue.cancel(id));
        assert!(!queue.cancel(Uuid::new_v4()));
    }

    #[tokio::test]
    async fn test_cancel_sets_flag_seen_by_worker() {
        let registry = CancelRegistry::default();
        let id = Uuid::new_v4();
        let flag = registry.register(id);
        assert!(!flag.is_cancelled());
        assert!(registry.cancel(id));
        assert!(flag.is_cancelled());
    }

    #[tokio::test]
    async fn test_submissions_preserve_fifo_order() {
        let (queue, mut rx) = queue_with_capacity(8);
        let first = job();
        let second = job();
        let first_id = first.evaluation_id;
        let second_id = second.evaluation_id;
        queue.submit(first).unwrap();
        queue.submit(second).unwrap();
        assert_eq!(rx.recv().await.unwrap().evaluation_id, first_id);
        assert_eq!(rx.recv().await.unwrap().evaluation_id, second_id);
    }
}
