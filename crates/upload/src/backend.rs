//! Transport seams consumed by the engine.
//!
//! The application implements these on top of its HTTP client. Keeping them
//! as traits decouples the upload logic from transport and lets tests drive
//! it with mocks.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use hashdrop_protocol::{
    CompleteChunkedRequest, CompleteChunkedResponse, ConfirmUploadRequest, InitChunkedRequest,
    InitChunkedResponse, PreUploadCheckRequest, PreUploadCheckResponse, UpdateFileRequest,
};

use crate::error::{BackendError, StoreError};

/// Boxed future returned by the seam traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Byte-level transfer progress: `(bytes sent, total bytes)`.
pub type ByteProgress = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// The REST backend that owns sessions and file records.
pub trait Backend: Send + Sync {
    /// `POST /file/pre-upload-check`
    fn pre_check<'a>(
        &'a self,
        req: &'a PreUploadCheckRequest,
    ) -> BoxFuture<'a, Result<PreUploadCheckResponse, BackendError>>;

    /// `POST /file/chunked-upload`
    fn init_chunked<'a>(
        &'a self,
        req: &'a InitChunkedRequest,
    ) -> BoxFuture<'a, Result<InitChunkedResponse, BackendError>>;

    /// `POST /file/chunked-upload/{uploadId}/complete`
    fn complete_chunked<'a>(
        &'a self,
        upload_id: &'a str,
        req: &'a CompleteChunkedRequest,
    ) -> BoxFuture<'a, Result<CompleteChunkedResponse, BackendError>>;

    /// `DELETE /file/chunked-upload/{uploadId}`
    fn abort_chunked<'a>(&'a self, upload_id: &'a str) -> BoxFuture<'a, Result<(), BackendError>>;

    /// `POST /file/confirm-upload`
    fn confirm<'a>(
        &'a self,
        req: &'a ConfirmUploadRequest,
    ) -> BoxFuture<'a, Result<(), BackendError>>;

    /// `PUT /file/{fileId}`
    fn update_file<'a>(
        &'a self,
        file_id: i64,
        req: &'a UpdateFileRequest,
    ) -> BoxFuture<'a, Result<(), BackendError>>;
}

/// Body of an object-store PUT.
#[derive(Debug)]
pub enum PutBody {
    /// A whole file, streamed from disk.
    File { path: PathBuf, len: u64 },
    /// An in-memory chunk.
    Bytes(Vec<u8>),
}

impl PutBody {
    pub fn len(&self) -> u64 {
        match self {
            PutBody::File { len, .. } => *len,
            PutBody::Bytes(data) => data.len() as u64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Direct writes to presigned URLs, bypassing the backend.
pub trait ObjectStore: Send + Sync {
    /// PUTs `body` to `url`. Returns the `ETag` response header when present.
    fn put<'a>(
        &'a self,
        url: &'a str,
        content_type: &'a str,
        body: PutBody,
        on_progress: Option<ByteProgress>,
    ) -> BoxFuture<'a, Result<Option<String>, StoreError>>;
}

/// Ambient network-availability probe.
pub trait NetworkStatus: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Probe for platforms without a connectivity signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

impl NetworkStatus for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

/// Connectivity flag flipped by the application.
#[derive(Debug)]
pub struct NetworkFlag {
    online: AtomicBool,
}

impl Default for NetworkFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NetworkFlag {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }
}

impl NetworkStatus for NetworkFlag {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }
}
