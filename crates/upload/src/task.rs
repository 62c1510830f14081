//! Per-file pipeline: validate, hash, pre-check, transfer, confirm.

use std::sync::{Arc, Mutex};

use hashdrop_protocol::{ConfirmUploadRequest, PreUploadCheckRequest, UpdateFileRequest};
use hashdrop_transfer::{
    ContentDigest, FileCandidate, HashProgress, Phase, PhaseLayout, ProgressAggregator,
    ProgressPoint, Strategy, hash_file, select_strategy, validate_file,
};
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};
use uuid::Uuid;

use crate::backend::{Backend, ByteProgress, NetworkStatus, ObjectStore};
use crate::chunked::{ChunkedOutcome, ChunkedUpload};
use crate::config::EngineConfig;
use crate::confirm::{confirm_upload, object_url, update_record};
use crate::error::UploadError;
use crate::precheck::{PrecheckOutcome, pre_check};
use crate::single::upload_single;
use crate::types::{UploadEvent, UploadReport, UploadRequest, UploadTask, UploadedFile};

/// Event sender scoped to one task.
#[derive(Clone)]
pub(crate) struct TaskEvents {
    task_id: Uuid,
    tx: mpsc::Sender<UploadEvent>,
}

impl TaskEvents {
    pub(crate) fn new(task_id: Uuid, tx: mpsc::Sender<UploadEvent>) -> Self {
        Self { task_id, tx }
    }

    pub(crate) fn task_id(&self) -> Uuid {
        self.task_id
    }

    /// Never blocks: events are dropped when the consumer lags or is gone.
    pub(crate) fn emit(&self, event: UploadEvent) {
        if let Err(e) = self.tx.try_send(event) {
            trace!(task = %self.task_id, error = %e, "event dropped");
        }
    }

    /// Moves `task` into `phase` and announces it.
    pub(crate) fn enter(&self, task: &mut UploadTask, phase: Phase) {
        task.phase = phase;
        debug!(task = %task.id, %phase, "phase changed");
        self.emit(UploadEvent::Phase {
            task_id: task.id,
            name: task.name.clone(),
            phase,
        });
    }
}

/// Feeds progress observations through the aggregator and emits advances.
///
/// Cloned into hashing and transfer callbacks, which may run on other threads.
#[derive(Clone)]
pub(crate) struct ProgressReporter {
    events: TaskEvents,
    aggregator: Arc<Mutex<ProgressAggregator>>,
}

impl ProgressReporter {
    pub(crate) fn new(events: TaskEvents, layout: PhaseLayout) -> Self {
        Self {
            events,
            aggregator: Arc::new(Mutex::new(ProgressAggregator::new(layout))),
        }
    }

    pub(crate) fn report(&self, point: ProgressPoint) {
        let advanced = self
            .aggregator
            .lock()
            .ok()
            .and_then(|mut agg| agg.advance(point));
        self.publish(advanced);
    }

    /// Byte-level transfer progress, emitted in whole-percent steps.
    pub(crate) fn report_bytes(&self, done: u64, total: u64) {
        let point = ProgressPoint::Transfer { done, total };
        let advanced = self.aggregator.lock().ok().and_then(|mut agg| {
            let next = agg.percent_for(point);
            if done < total && next.floor() <= agg.current().floor() {
                return None;
            }
            agg.advance(point)
        });
        self.publish(advanced);
    }

    pub(crate) fn current(&self) -> f64 {
        self.aggregator
            .lock()
            .map(|agg| agg.current())
            .unwrap_or(0.0)
    }

    fn publish(&self, advanced: Option<f64>) {
        if let Some(percent) = advanced {
            self.events.emit(UploadEvent::Progress {
                task_id: self.events.task_id(),
                percent,
            });
        }
    }
}

/// Runs one file through the pipeline.
pub(crate) struct TaskRunner<'a> {
    pub(crate) config: &'a EngineConfig,
    pub(crate) backend: &'a Arc<dyn Backend>,
    pub(crate) store: &'a Arc<dyn ObjectStore>,
    pub(crate) network: &'a Arc<dyn NetworkStatus>,
    pub(crate) cancel: &'a CancellationToken,
    pub(crate) events_tx: &'a mpsc::Sender<UploadEvent>,
    pub(crate) file_slots: &'a Semaphore,
}

impl TaskRunner<'_> {
    /// Runs the pipeline and reports its terminal state. With `replace`, the
    /// existing record `replace` is pointed at the new content at the end.
    pub(crate) async fn run(&self, request: UploadRequest, replace: Option<i64>) -> UploadReport {
        // The semaphore is never closed; a closed one would only lift the limit.
        let _slot = self.file_slots.acquire().await.ok();

        let mut task = UploadTask::new(&request);
        let events = TaskEvents::new(task.id, self.events_tx.clone());
        let mut progress = None;

        let outcome = self
            .drive(&mut task, &events, &mut progress, replace)
            .await;

        if let Some(reporter) = &progress {
            task.progress = reporter.current();
        }

        match &outcome {
            Ok(file) => {
                events.enter(&mut task, Phase::Completed);
                events.emit(UploadEvent::Completed {
                    task_id: task.id,
                    file: file.clone(),
                });
                info!(
                    task = %task.id,
                    name = %task.name,
                    size = task.size,
                    instant = file.instant,
                    "upload completed"
                );
            }
            Err(e) => {
                let phase = match e {
                    UploadError::Cancelled | UploadError::ChunkFailed { .. } => Phase::Aborted,
                    _ => Phase::Failed,
                };
                events.enter(&mut task, phase);
                if matches!(e, UploadError::AuthExpired) {
                    events.emit(UploadEvent::AuthExpired { task_id: task.id });
                }
                events.emit(UploadEvent::Failed {
                    task_id: task.id,
                    error: e.to_string(),
                });
                error!(task = %task.id, name = %task.name, error = %e, "upload failed");
            }
        }

        task.finish(outcome)
    }

    async fn drive(
        &self,
        task: &mut UploadTask,
        events: &TaskEvents,
        progress: &mut Option<ProgressReporter>,
        replace: Option<i64>,
    ) -> Result<UploadedFile, UploadError> {
        self.check_cancelled()?;

        // 1. Validate
        let meta = tokio::fs::metadata(&task.path)
            .await
            .map_err(|e| UploadError::HashingFailed(format!("{}: {e}", task.path.display())))?;
        if !meta.is_file() {
            return Err(UploadError::HashingFailed(format!(
                "{} is not a regular file",
                task.path.display()
            )));
        }
        task.size = meta.len();

        let candidate = FileCandidate {
            name: &task.name,
            size: task.size,
            content_type: task.content_type.as_deref(),
        };
        validate_file(&candidate, self.config.max_file_size).map_err(UploadError::Validation)?;

        let strategy = select_strategy(task.size);
        task.strategy = Some(strategy);
        let reporter = progress
            .insert(ProgressReporter::new(
                events.clone(),
                PhaseLayout::for_strategy(&strategy),
            ))
            .clone();

        // 2. Hash
        events.enter(task, Phase::Hashing);
        reporter.report(ProgressPoint::Hashing(0.0));
        let on_hash: HashProgress = {
            let r = reporter.clone();
            Arc::new(move |p: f64| r.report(ProgressPoint::Hashing(p)))
        };
        let digest = hash_file(
            task.path.clone(),
            self.config.hash_progress_threshold,
            Some(on_hash),
        )
        .await
        .map_err(|e| UploadError::HashingFailed(e.to_string()))?;
        debug!(task = %task.id, %digest, "content hashed");
        task.digest = Some(digest.clone());
        self.check_cancelled()?;

        // 3. Pre-check
        events.enter(task, Phase::Prechecking);
        let req = PreUploadCheckRequest {
            name: task.name.clone(),
            size: task.size,
            hash: digest.to_string(),
            folder_id: task.folder_id,
        };
        let outcome = pre_check(
            self.backend.as_ref(),
            self.network.as_ref(),
            &self.config.request_retry,
            &req,
        )
        .await?;
        reporter.report(ProgressPoint::Prechecked);

        // 4. Transfer and confirm
        let file = match (outcome, strategy) {
            (PrecheckOutcome::Exists { file_id, url }, _) => {
                info!(task = %task.id, name = %task.name, "content already stored, instant upload");
                UploadedFile {
                    file_id,
                    url,
                    digest: digest.clone(),
                    instant: true,
                }
            }
            (PrecheckOutcome::Upload { presigned_url }, Strategy::SingleShot) => {
                self.single_shot(task, events, &reporter, &digest, presigned_url)
                    .await?
            }
            (
                PrecheckOutcome::Upload { .. },
                Strategy::Chunked {
                    chunk_size,
                    concurrency,
                    ..
                },
            ) => {
                self.chunked(task, events, &reporter, &digest, chunk_size, concurrency)
                    .await?
            }
        };

        // 5. Replace an existing record
        if let Some(file_id) = replace {
            let req = UpdateFileRequest {
                name: task.name.clone(),
                size: task.size,
                hash: digest.to_string(),
            };
            update_record(
                self.backend.as_ref(),
                self.network.as_ref(),
                &self.config.request_retry,
                file_id,
                &req,
            )
            .await?;
            debug!(task = %task.id, file_id, "file record replaced");
        }

        reporter.report(ProgressPoint::Done);
        Ok(file)
    }

    async fn single_shot(
        &self,
        task: &mut UploadTask,
        events: &TaskEvents,
        reporter: &ProgressReporter,
        digest: &ContentDigest,
        presigned_url: Option<String>,
    ) -> Result<UploadedFile, UploadError> {
        let url = presigned_url.ok_or_else(|| {
            UploadError::PrecheckFailed("backend issued no upload URL".into())
        })?;
        self.check_cancelled()?;

        events.enter(task, Phase::Uploading);
        reporter.report(ProgressPoint::Initialized);
        let on_bytes: ByteProgress = {
            let r = reporter.clone();
            Arc::new(move |done: u64, total: u64| r.report_bytes(done, total))
        };
        let etag = upload_single(
            self.store.as_ref(),
            &url,
            task.put_content_type(),
            &task.path,
            task.size,
            Some(on_bytes),
        )
        .await?;
        debug!(task = %task.id, etag = ?etag, "object stored");
        reporter.report(ProgressPoint::Transfer {
            done: task.size,
            total: task.size,
        });

        let object = object_url(&url).to_string();
        self.confirm(task, events, reporter, digest, &object).await?;

        Ok(UploadedFile {
            file_id: None,
            url: Some(object),
            digest: digest.clone(),
            instant: false,
        })
    }

    async fn chunked(
        &self,
        task: &mut UploadTask,
        events: &TaskEvents,
        reporter: &ProgressReporter,
        digest: &ContentDigest,
        chunk_size: u64,
        concurrency: usize,
    ) -> Result<UploadedFile, UploadError> {
        self.check_cancelled()?;

        let coordinator = ChunkedUpload {
            backend: self.backend,
            store: self.store,
            network: self.network,
            config: self.config,
            cancel: self.cancel,
            events,
            progress: reporter,
        };

        match coordinator.run(task, digest, chunk_size, concurrency).await? {
            ChunkedOutcome::Instant { file_id, url } => Ok(UploadedFile {
                file_id,
                url,
                digest: digest.clone(),
                instant: true,
            }),
            ChunkedOutcome::Merged { file_id, file_url } => {
                self.confirm(task, events, reporter, digest, &file_url)
                    .await?;
                Ok(UploadedFile {
                    file_id,
                    url: Some(file_url),
                    digest: digest.clone(),
                    instant: false,
                })
            }
        }
    }

    async fn confirm(
        &self,
        task: &mut UploadTask,
        events: &TaskEvents,
        reporter: &ProgressReporter,
        digest: &ContentDigest,
        url: &str,
    ) -> Result<(), UploadError> {
        events.enter(task, Phase::Confirming);
        reporter.report(ProgressPoint::Confirming);
        let req = ConfirmUploadRequest {
            name: task.name.clone(),
            size: task.size,
            hash: digest.to_string(),
            url: url.to_string(),
            folder_id: task.folder_id,
            device_id: self.config.device_id.clone(),
        };
        confirm_upload(
            self.backend.as_ref(),
            self.network.as_ref(),
            &self.config.request_retry,
            &req,
        )
        .await
    }

    fn check_cancelled(&self) -> Result<(), UploadError> {
        if self.cancel.is_cancelled() {
            Err(UploadError::Cancelled)
        } else {
            Ok(())
        }
    }
}
