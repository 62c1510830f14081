//! Chunked upload coordinator.
//!
//! Opens a chunk session, drives a bounded pool of workers over the part
//! queue, then merges the parts. A part that fails is requeued after a
//! backoff; once it runs out of attempts the whole session is released.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use hashdrop_protocol::{
    ChunkEtag, CompleteChunkedRequest, CompleteChunkedResponse, InitChunkedRequest,
};
use hashdrop_transfer::{
    ChunkPlan, ChunkResult, ChunkResults, ChunkSpec, ContentDigest, MAX_CHUNK_CONCURRENCY, Phase,
    ProgressPoint, UploadSession, hash_range, read_chunk,
};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backend::{Backend, NetworkStatus, ObjectStore, PutBody};
use crate::config::EngineConfig;
use crate::error::{BackendError, StoreError, UploadError};
use crate::retry::{RetryError, RetryPolicy};
use crate::task::{ProgressReporter, TaskEvents};
use crate::types::{PendingFinalize, UploadEvent, UploadTask};

/// Number of workers for a session.
///
/// Starts from the strategy's worker count, never exceeds
/// [`MAX_CHUNK_CONCURRENCY`], honours a positive backend hint and never
/// spawns more workers than there are chunks.
pub fn effective_concurrency(strategy_workers: usize, hint: Option<u32>, chunks: usize) -> usize {
    let mut workers = strategy_workers.min(MAX_CHUNK_CONCURRENCY);
    if let Some(hint) = hint
        && hint > 0
    {
        workers = workers.min(hint as usize);
    }
    workers.min(chunks).max(1)
}

/// How a chunk session ended.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ChunkedOutcome {
    /// Init found the content already stored.
    Instant {
        file_id: Option<i64>,
        url: Option<String>,
    },
    /// Parts were uploaded and merged.
    Merged {
        file_id: Option<i64>,
        file_url: String,
    },
}

/// One file's chunk session.
pub(crate) struct ChunkedUpload<'a> {
    pub(crate) backend: &'a Arc<dyn Backend>,
    pub(crate) store: &'a Arc<dyn ObjectStore>,
    pub(crate) network: &'a Arc<dyn NetworkStatus>,
    pub(crate) config: &'a EngineConfig,
    pub(crate) cancel: &'a CancellationToken,
    pub(crate) events: &'a TaskEvents,
    pub(crate) progress: &'a ProgressReporter,
}

impl ChunkedUpload<'_> {
    /// Init, transfer every part, finalize.
    ///
    /// Any failure after init releases the session, except a finalize
    /// failure: the parts are stored, so the session is left open for
    /// [`finalize`] to be retried.
    pub(crate) async fn run(
        &self,
        task: &mut UploadTask,
        digest: &ContentDigest,
        chunk_size: u64,
        concurrency: usize,
    ) -> Result<ChunkedOutcome, UploadError> {
        if self.cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        self.events.enter(task, Phase::Initializing);
        let req = InitChunkedRequest {
            name: task.name.clone(),
            size: task.size,
            hash: digest.to_string(),
            folder_id: task.folder_id,
            chunk_size,
            total_chunks: ChunkPlan::chunk_count(task.size, chunk_size),
        };
        let resp = self
            .config
            .request_retry
            .run(self.network.as_ref(), "init chunked upload", || {
                self.backend.init_chunked(&req)
            })
            .await
            .map_err(|e| UploadError::from_retry(e, UploadError::InitFailed))?;

        if resp.file_exists {
            info!(task = %task.id, "content already stored, chunk session skipped");
            return Ok(ChunkedOutcome::Instant {
                file_id: resp.file_id,
                url: resp.file_url,
            });
        }
        if resp.upload_id.is_empty() {
            return Err(UploadError::InitFailed("backend issued no upload id".into()));
        }

        let upload_id = resp.upload_id;
        let urls = resp
            .chunk_urls
            .into_iter()
            .map(|c| (c.part_number, c.presigned_url));
        let plan = match ChunkPlan::build(task.size, chunk_size, urls) {
            Ok(plan) => plan,
            Err(e) => {
                let err = UploadError::InitFailed(e.to_string());
                self.release(task.id, &upload_id, &err).await;
                return Err(err);
            }
        };

        if !plan.unused_parts().is_empty() {
            warn!(
                task = %task.id,
                upload_id = %upload_id,
                planned = plan.len(),
                unused = ?plan.unused_parts(),
                "backend issued URLs for unplanned parts, ignoring them"
            );
        }

        let session = UploadSession {
            upload_id,
            plan,
            expires_in: resp.expires_in,
        };
        let workers =
            effective_concurrency(concurrency, resp.recommended_concurrency, session.plan.len());
        info!(
            task = %task.id,
            upload_id = %session.upload_id,
            chunks = session.plan.len(),
            chunk_size,
            workers,
            expires_in = ?session.expires_in,
            "chunk session opened"
        );

        self.progress.report(ProgressPoint::Initialized);
        self.events.enter(task, Phase::Uploading);

        let results = match self.transfer(task, &session, workers).await {
            Ok(results) => results,
            Err(err) => {
                self.release(task.id, &session.upload_id, &err).await;
                return Err(err);
            }
        };

        self.events.enter(task, Phase::Finalizing);
        self.progress.report(ProgressPoint::Finalizing);

        let pending = PendingFinalize {
            upload_id: session.upload_id.clone(),
            results,
            name: task.name.clone(),
            size: task.size,
            digest: digest.clone(),
            folder_id: task.folder_id,
        };
        match finalize(
            self.backend.as_ref(),
            self.network.as_ref(),
            &self.config.request_retry,
            &pending,
        )
        .await
        {
            Ok(merged) => Ok(ChunkedOutcome::Merged {
                file_id: merged.file_id,
                file_url: merged.file_url,
            }),
            Err(UploadError::AuthExpired) => {
                self.release(task.id, &session.upload_id, &UploadError::AuthExpired)
                    .await;
                Err(UploadError::AuthExpired)
            }
            Err(e) => Err(e),
        }
    }

    /// Runs the worker pool until every part is stored or one fails.
    async fn transfer(
        &self,
        task: &UploadTask,
        session: &UploadSession,
        workers: usize,
    ) -> Result<Vec<ChunkResult>, UploadError> {
        let total = session.plan.len() as u32;
        let queue: VecDeque<ChunkJob> = session
            .plan
            .chunks()
            .iter()
            .cloned()
            .map(|spec| ChunkJob { spec, retries: 0 })
            .collect();

        let stop = self.cancel.child_token();
        let (report_tx, mut report_rx) = mpsc::channel(workers * 2);
        let ctx = WorkerContext {
            task_id: task.id,
            store: Arc::clone(self.store),
            network: Arc::clone(self.network),
            retry: self.config.chunk_retry.clone(),
            path: task.path.clone(),
            content_type: task.put_content_type().to_string(),
            queue: Arc::new(Mutex::new(queue)),
            stop: stop.clone(),
            reports: report_tx,
        };

        let mut pool = JoinSet::new();
        for _ in 0..workers {
            pool.spawn(run_worker(ctx.clone()));
        }
        drop(ctx);

        let mut results = ChunkResults::new();
        let mut failure: Option<UploadError> = None;

        while let Some(report) = report_rx.recv().await {
            match report {
                WorkerReport::Done(result) => {
                    debug!(task = %task.id, part = result.part_number, retries = result.retries, "chunk stored");
                    if let Err(e) = results.insert(result) {
                        warn!(task = %task.id, error = %e, "ignoring repeated chunk result");
                        continue;
                    }
                    self.progress.report(ProgressPoint::Transfer {
                        done: results.len() as u64,
                        total: total as u64,
                    });
                }
                WorkerReport::Failed(err) => {
                    if failure.is_none() {
                        failure = Some(err);
                        stop.cancel();
                    }
                }
            }
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                error!(task = %task.id, error = %e, "chunk worker panicked");
                failure.get_or_insert(UploadError::UploadFailed(format!("chunk worker: {e}")));
            }
        }

        if let Some(err) = failure {
            return Err(err);
        }
        if stop.is_cancelled() {
            return Err(UploadError::Cancelled);
        }
        results
            .into_sorted(total)
            .map_err(|e| UploadError::UploadFailed(e.to_string()))
    }

    /// Releases a session on the backend. Failure to release is logged only.
    async fn release(&self, task_id: Uuid, upload_id: &str, reason: &UploadError) {
        match self.backend.abort_chunked(upload_id).await {
            Ok(()) => info!(task = %task_id, upload_id, reason = %reason, "chunk session released"),
            Err(e) => warn!(task = %task_id, upload_id, error = %e, "failed to release chunk session"),
        }
        self.events.emit(UploadEvent::Aborted {
            task_id,
            upload_id: upload_id.to_string(),
            reason: reason.to_string(),
        });
    }
}

/// Merges the stored parts of a session, in ascending part order.
///
/// On failure the session stays open and the error carries everything
/// needed to call this again.
pub async fn finalize(
    backend: &dyn Backend,
    network: &dyn NetworkStatus,
    policy: &RetryPolicy,
    pending: &PendingFinalize,
) -> Result<CompleteChunkedResponse, UploadError> {
    let mut sorted = pending.results.clone();
    sorted.sort_by_key(|r| r.part_number);
    let req = CompleteChunkedRequest {
        chunk_etags: sorted
            .into_iter()
            .map(|r| ChunkEtag {
                part_number: r.part_number,
                etag: r.etag,
            })
            .collect(),
    };

    let outcome = policy
        .run(network, "complete chunked upload", || {
            backend.complete_chunked(&pending.upload_id, &req)
        })
        .await;

    match outcome {
        Ok(resp) => {
            info!(upload_id = %pending.upload_id, parts = req.chunk_etags.len(), "chunks merged");
            Ok(resp)
        }
        Err(err) => {
            let reason = match err {
                RetryError::Offline => "network unavailable".to_string(),
                RetryError::Permanent(e) | RetryError::Exhausted(e) => {
                    if matches!(e, BackendError::AuthExpired) {
                        return Err(UploadError::AuthExpired);
                    }
                    e.to_string()
                }
            };
            Err(UploadError::FinalizeFailed {
                reason,
                pending: Box::new(pending.clone()),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Worker pool
// ---------------------------------------------------------------------------

struct ChunkJob {
    spec: ChunkSpec,
    /// Failed attempts so far.
    retries: u32,
}

enum WorkerReport {
    Done(ChunkResult),
    Failed(UploadError),
}

#[derive(Clone)]
struct WorkerContext {
    task_id: Uuid,
    store: Arc<dyn ObjectStore>,
    network: Arc<dyn NetworkStatus>,
    retry: RetryPolicy,
    path: PathBuf,
    content_type: String,
    queue: Arc<Mutex<VecDeque<ChunkJob>>>,
    stop: CancellationToken,
    reports: mpsc::Sender<WorkerReport>,
}

async fn run_worker(ctx: WorkerContext) {
    loop {
        if ctx.stop.is_cancelled() {
            return;
        }
        let Some(mut job) = ctx.queue.lock().await.pop_front() else {
            return;
        };

        // A PUT already in flight runs to completion; stop only gates new work.
        let err = match put_chunk(&ctx, &job.spec).await {
            Ok(etag) => {
                let result = ChunkResult {
                    part_number: job.spec.part_number,
                    etag,
                    retries: job.retries,
                };
                if ctx.reports.send(WorkerReport::Done(result)).await.is_err() {
                    return;
                }
                continue;
            }
            Err(e) => e,
        };

        job.retries += 1;
        let part = job.spec.part_number;
        if job.retries >= ctx.retry.max_attempts.max(1) {
            warn!(task = %ctx.task_id, part, attempt = job.retries, error = %err, "chunk out of attempts");
            let failed = UploadError::ChunkFailed {
                part,
                reason: format!("{err} (after {} attempts)", job.retries),
            };
            let _ = ctx.reports.send(WorkerReport::Failed(failed)).await;
            return;
        }
        if !ctx.network.is_online() {
            let _ = ctx
                .reports
                .send(WorkerReport::Failed(UploadError::NetworkUnavailable))
                .await;
            return;
        }

        let delay = ctx.retry.delay_for_attempt(job.retries);
        warn!(
            task = %ctx.task_id,
            part,
            attempt = job.retries,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "chunk failed, requeueing"
        );
        tokio::select! {
            _ = ctx.stop.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
        if !ctx.network.is_online() {
            let _ = ctx
                .reports
                .send(WorkerReport::Failed(UploadError::NetworkUnavailable))
                .await;
            return;
        }
        ctx.queue.lock().await.push_back(job);
    }
}

/// Reads one part and PUTs it. Returns the store's ETag, or the part's
/// SHA-256 when the store sends none.
async fn put_chunk(ctx: &WorkerContext, spec: &ChunkSpec) -> Result<String, StoreError> {
    let data = read_chunk(ctx.path.clone(), spec.range)
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(e.to_string())))?;

    let etag = ctx
        .store
        .put(&spec.url, &ctx.content_type, PutBody::Bytes(data), None)
        .await?;
    match etag {
        Some(etag) => Ok(etag),
        // No token from the store: the part's own digest stands in for it.
        None => hash_range(ctx.path.clone(), spec.range)
            .await
            .map(|digest| digest.to_string())
            .map_err(|e| StoreError::Io(std::io::Error::other(e.to_string()))),
    }
}
