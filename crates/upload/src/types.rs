//! Data types for the upload flow.

use std::path::PathBuf;

use hashdrop_transfer::{ChunkResult, ContentDigest, Phase, Strategy, detect_content_type};
use uuid::Uuid;

use crate::error::UploadError;

/// A file submitted by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub path: PathBuf,
    /// Name stored with the file record.
    pub name: String,
    /// Declared MIME type, checked against the allow-list when present.
    pub content_type: Option<String>,
    /// Destination folder; passed explicitly with every request.
    pub folder_id: i64,
}

impl UploadRequest {
    /// Builds a request named after the file, with a content type guessed
    /// from its extension.
    pub fn from_path(path: impl Into<PathBuf>, folder_id: i64) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content_type = detect_content_type(&name).map(String::from);
        Self {
            path,
            name,
            content_type,
            folder_id,
        }
    }
}

/// In-flight state of one file, owned by its pipeline run.
#[derive(Debug, Clone)]
pub struct UploadTask {
    pub id: Uuid,
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub folder_id: i64,
    pub content_type: Option<String>,
    pub digest: Option<ContentDigest>,
    pub strategy: Option<Strategy>,
    pub phase: Phase,
    pub progress: f64,
}

impl UploadTask {
    pub fn new(request: &UploadRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: request.path.clone(),
            name: request.name.clone(),
            size: 0,
            folder_id: request.folder_id,
            content_type: request.content_type.clone(),
            digest: None,
            strategy: None,
            phase: Phase::Pending,
            progress: 0.0,
        }
    }

    /// MIME type sent with object-store PUTs.
    pub fn put_content_type(&self) -> &str {
        match self.content_type.as_deref() {
            Some(ct) if !ct.is_empty() => ct,
            _ => "application/octet-stream",
        }
    }

    pub(crate) fn finish(self, outcome: Result<UploadedFile, UploadError>) -> UploadReport {
        UploadReport {
            task_id: self.id,
            name: self.name,
            size: self.size,
            digest: self.digest,
            strategy: self.strategy,
            phase: self.phase,
            progress: self.progress,
            outcome,
        }
    }
}

/// A file that reached the store and has a record.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    /// Backend file id, when the endpoint that completed the task returns one.
    pub file_id: Option<i64>,
    /// Object URL (query string stripped).
    pub url: Option<String>,
    pub digest: ContentDigest,
    /// `true` when no bytes were transferred.
    pub instant: bool,
}

/// Terminal result of one file.
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub task_id: Uuid,
    pub name: String,
    pub size: u64,
    pub digest: Option<ContentDigest>,
    pub strategy: Option<Strategy>,
    pub phase: Phase,
    pub progress: f64,
    pub outcome: Result<UploadedFile, UploadError>,
}

impl UploadReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// A merge that failed after every chunk was stored.
///
/// Hand it to [`UploadEngine::retry_finalize`](crate::UploadEngine::retry_finalize),
/// or release the session with
/// [`UploadEngine::abort_session`](crate::UploadEngine::abort_session).
#[derive(Debug, Clone, PartialEq)]
pub struct PendingFinalize {
    pub upload_id: String,
    /// Chunk results, ascending by part number.
    pub results: Vec<ChunkResult>,
    pub name: String,
    pub size: u64,
    pub digest: ContentDigest,
    pub folder_id: i64,
}

/// Event emitted while tasks run.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// The task entered a new phase.
    Phase {
        task_id: Uuid,
        name: String,
        phase: Phase,
    },
    /// Overall progress in `[0, 100]`, never decreasing per task.
    Progress { task_id: Uuid, percent: f64 },
    /// The file is stored and recorded.
    Completed { task_id: Uuid, file: UploadedFile },
    /// The task ended without a stored file.
    Failed { task_id: Uuid, error: String },
    /// A chunk session was released on the backend.
    Aborted {
        task_id: Uuid,
        upload_id: String,
        reason: String,
    },
    /// The backend rejected the credential; the caller should invalidate it.
    AuthExpired { task_id: Uuid },
}
