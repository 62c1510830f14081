//! Upload error types.

use hashdrop_protocol::EnvelopeError;
use hashdrop_transfer::ValidationError;

use crate::retry::RetryError;
use crate::types::PendingFinalize;

/// Failure of a backend API call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("authentication expired")]
    AuthExpired,

    #[error("network error: {0}")]
    Network(String),

    #[error("backend rejected request ({code}): {msg}")]
    Rejected { code: i32, msg: String },

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl From<EnvelopeError> for BackendError {
    fn from(err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::AuthExpired => BackendError::AuthExpired,
            EnvelopeError::Rejected { code, msg } => BackendError::Rejected { code, msg },
        }
    }
}

/// Failure of a PUT to the object store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object store responded with HTTP {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Terminal outcome of a failed upload task.
///
/// Every variant renders a human-readable reason.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UploadError {
    #[error("{}", join_reasons(.0))]
    Validation(Vec<ValidationError>),

    #[error("hashing failed: {0}")]
    HashingFailed(String),

    #[error("pre-upload check failed: {0}")]
    PrecheckFailed(String),

    #[error("chunked upload init failed: {0}")]
    InitFailed(String),

    #[error("chunk {part} failed: {reason}")]
    ChunkFailed { part: u32, reason: String },

    #[error("upload failed: {0}")]
    UploadFailed(String),

    /// The merge call failed; the session is still open on the backend.
    #[error("finalize failed for upload {}: {reason}", .pending.upload_id)]
    FinalizeFailed {
        reason: String,
        pending: Box<PendingFinalize>,
    },

    /// Bytes are stored but the file record was not written.
    #[error("confirm failed: {0}")]
    ConfirmFailed(String),

    #[error("authentication expired")]
    AuthExpired,

    #[error("network unavailable")]
    NetworkUnavailable,

    #[error("cancelled")]
    Cancelled,
}

impl UploadError {
    /// Whether re-running the task could succeed without outside action.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            UploadError::AuthExpired
                | UploadError::NetworkUnavailable
                | UploadError::Validation(_)
                | UploadError::Cancelled
        )
    }

    /// Maps an exhausted or short-circuited backend call onto the step's
    /// error kind. Authentication failures keep their own kind.
    pub(crate) fn from_retry(
        err: RetryError<BackendError>,
        step: impl FnOnce(String) -> UploadError,
    ) -> Self {
        match err {
            RetryError::Offline => UploadError::NetworkUnavailable,
            RetryError::Permanent(e) | RetryError::Exhausted(e) => Self::from_backend(e, step),
        }
    }

    pub(crate) fn from_backend(
        err: BackendError,
        step: impl FnOnce(String) -> UploadError,
    ) -> Self {
        match err {
            BackendError::AuthExpired => UploadError::AuthExpired,
            other => step(other.to_string()),
        }
    }
}

fn join_reasons(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
