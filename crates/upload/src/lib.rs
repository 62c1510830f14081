//! Upload orchestration engine for hashdrop.
//!
//! This crate implements the **business logic** of getting a local file into
//! the content-addressed store. It has no transport dependencies: the
//! application provides a [`Backend`] (REST API), an [`ObjectStore`]
//! (presigned-URL PUTs) and a [`NetworkStatus`] probe.
//!
//! # Pipeline
//!
//! 1. **Validate**: size ceiling, content type, name rules
//! 2. **Hash**: streaming SHA-256 of the whole file
//! 3. **Pre-check**: ask the backend whether the digest is already stored
//! 4. **Transfer**: single PUT, or a chunk session driven by a worker pool
//! 5. **Finalize**: merge chunk ETags (chunked only)
//! 6. **Confirm**: persist the file record; nothing is complete before this

pub mod backend;
pub mod chunked;
pub mod config;
pub mod confirm;
pub mod engine;
pub mod error;
pub mod precheck;
pub mod retry;
pub mod single;
mod task;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export primary types for convenience.
pub use backend::{
    AlwaysOnline, Backend, BoxFuture, ByteProgress, NetworkFlag, NetworkStatus, ObjectStore,
    PutBody,
};
pub use chunked::effective_concurrency;
pub use config::EngineConfig;
pub use confirm::object_url;
pub use engine::UploadEngine;
pub use error::{BackendError, StoreError, UploadError};
pub use precheck::PrecheckOutcome;
pub use retry::{RetryError, RetryPolicy, Transient};
pub use types::{
    PendingFinalize, UploadEvent, UploadReport, UploadRequest, UploadTask, UploadedFile,
};

// Transfer types that appear in reports and events.
pub use hashdrop_transfer::{ContentDigest, Phase, Strategy};
