use serde::{Deserialize, Serialize};

use crate::constants::ResultCode;

/// Failure carried inside an otherwise well-formed envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("authentication expired")]
    AuthExpired,

    #[error("backend rejected request ({code}): {msg}")]
    Rejected { code: i32, msg: String },
}

/// Envelope for all backend responses: `{code, msg, data}`.
///
/// Some backend builds spell the message field `message`; both are accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub code: ResultCode,
    #[serde(default, alias = "message")]
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Creates a success envelope around `data`.
    pub fn success(data: T) -> Self {
        Self {
            code: ResultCode::Success,
            msg: "ok".into(),
            data: Some(data),
        }
    }

    /// Creates a failure envelope.
    pub fn failure(code: i32, msg: impl Into<String>) -> Self {
        Self {
            code: ResultCode::from(code),
            msg: msg.into(),
            data: None,
        }
    }

    /// Returns `true` if the code is `20000`.
    pub fn is_success(&self) -> bool {
        self.code == ResultCode::Success
    }

    /// Unwraps the payload, mapping non-success codes to [`EnvelopeError`].
    ///
    /// A success envelope without `data` yields `Ok(None)`.
    pub fn into_result(self) -> Result<Option<T>, EnvelopeError> {
        match self.code {
            ResultCode::Success => Ok(self.data),
            ResultCode::AuthExpired => Err(EnvelopeError::AuthExpired),
            ResultCode::Other(code) => Err(EnvelopeError::Rejected {
                code,
                msg: self.msg,
            }),
        }
    }
}
