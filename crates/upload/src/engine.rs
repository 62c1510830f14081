//! Upload engine: the caller-facing entry point.
//!
//! Runs one pipeline per file, bounds how many files move at once, and
//! publishes progress and status on a single event channel.

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream;
use hashdrop_protocol::ConfirmUploadRequest;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::backend::{Backend, NetworkStatus, ObjectStore};
use crate::chunked::finalize;
use crate::config::EngineConfig;
use crate::confirm::confirm_upload;
use crate::error::UploadError;
use crate::task::TaskRunner;
use crate::types::{PendingFinalize, UploadEvent, UploadReport, UploadRequest, UploadedFile};

/// Orchestrates uploads against one backend and object store.
pub struct UploadEngine {
    config: EngineConfig,
    backend: Arc<dyn Backend>,
    store: Arc<dyn ObjectStore>,
    network: Arc<dyn NetworkStatus>,
    events_tx: mpsc::Sender<UploadEvent>,
    events_rx: Option<mpsc::Receiver<UploadEvent>>,
    cancel: CancellationToken,
    /// One permit per file in flight, shared by every entry point.
    file_slots: Semaphore,
}

impl UploadEngine {
    /// Creates an engine.
    pub fn new(
        config: EngineConfig,
        backend: Arc<dyn Backend>,
        store: Arc<dyn ObjectStore>,
        network: Arc<dyn NetworkStatus>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        let file_slots = Semaphore::new(config.max_concurrent_files.max(1));
        Self {
            config,
            backend,
            store,
            network,
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
            file_slots,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.events_rx.take()
    }

    /// Token that cancels every running and future task of this engine.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Uploads one file.
    pub async fn upload(&self, request: UploadRequest) -> UploadReport {
        self.runner().run(request, None).await
    }

    /// Uploads several files.
    ///
    /// At most `max_concurrent_files` files move at once across the whole
    /// engine, including concurrent batches and single uploads. Tasks are independent: one failing does not stop the others. Reports
    /// come back in request order.
    pub async fn upload_batch(&self, requests: Vec<UploadRequest>) -> Vec<UploadReport> {
        let limit = self.config.max_concurrent_files.max(1);
        stream::iter(requests)
            .map(|request| self.upload(request))
            .buffered(limit)
            .collect()
            .await
    }

    /// Uploads new content for the existing record `file_id`.
    pub async fn replace(&self, file_id: i64, request: UploadRequest) -> UploadReport {
        self.runner().run(request, Some(file_id)).await
    }

    /// Retries the merge of a session whose finalize failed, then confirms it.
    pub async fn retry_finalize(
        &self,
        pending: &PendingFinalize,
    ) -> Result<UploadedFile, UploadError> {
        let merged = finalize(
            self.backend.as_ref(),
            self.network.as_ref(),
            &self.config.request_retry,
            pending,
        )
        .await?;

        let req = ConfirmUploadRequest {
            name: pending.name.clone(),
            size: pending.size,
            hash: pending.digest.to_string(),
            url: merged.file_url.clone(),
            folder_id: pending.folder_id,
            device_id: self.config.device_id.clone(),
        };
        confirm_upload(
            self.backend.as_ref(),
            self.network.as_ref(),
            &self.config.request_retry,
            &req,
        )
        .await?;

        info!(upload_id = %pending.upload_id, name = %pending.name, "finalize retried");
        Ok(UploadedFile {
            file_id: merged.file_id,
            url: Some(merged.file_url),
            digest: pending.digest.clone(),
            instant: false,
        })
    }

    /// Releases a chunk session, e.g. one left open by a failed finalize.
    pub async fn abort_session(&self, upload_id: &str) -> Result<(), UploadError> {
        self.config
            .request_retry
            .run(self.network.as_ref(), "abort chunked upload", || {
                self.backend.abort_chunked(upload_id)
            })
            .await
            .map_err(|e| UploadError::from_retry(e, UploadError::UploadFailed))?;
        info!(upload_id, "chunk session aborted");
        Ok(())
    }

    fn runner(&self) -> TaskRunner<'_> {
        TaskRunner {
            config: &self.config,
            backend: &self.backend,
            store: &self.store,
            network: &self.network,
            cancel: &self.cancel,
            events_tx: &self.events_tx,
            file_slots: &self.file_slots,
        }
    }
}
