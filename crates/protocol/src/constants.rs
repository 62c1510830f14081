use serde::{Deserialize, Serialize};

/// Backend path for the dedup pre-check.
pub const PATH_PRE_UPLOAD_CHECK: &str = "/file/pre-upload-check";

/// Backend path for creating a chunk-upload session.
pub const PATH_CHUNKED_UPLOAD: &str = "/file/chunked-upload";

/// Backend path for persisting file metadata.
pub const PATH_CONFIRM_UPLOAD: &str = "/file/confirm-upload";

/// Backend path prefix for updating an existing file record.
pub const PATH_FILE: &str = "/file";

/// Result code carried in the response envelope.
///
/// Only two codes have protocol meaning; everything else is a domain failure
/// whose message is shown to the user as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum ResultCode {
    /// `20000`
    Success,
    /// `40001`: the ambient credential is no longer accepted.
    AuthExpired,
    /// Any other code.
    Other(i32),
}

impl ResultCode {
    pub const SUCCESS: i32 = 20000;
    pub const AUTH_EXPIRED: i32 = 40001;
}

impl From<i32> for ResultCode {
    fn from(code: i32) -> Self {
        match code {
            Self::SUCCESS => ResultCode::Success,
            Self::AUTH_EXPIRED => ResultCode::AuthExpired,
            other => ResultCode::Other(other),
        }
    }
}

impl From<ResultCode> for i32 {
    fn from(code: ResultCode) -> Self {
        match code {
            ResultCode::Success => ResultCode::SUCCESS,
            ResultCode::AuthExpired => ResultCode::AUTH_EXPIRED,
            ResultCode::Other(c) => c,
        }
    }
}
