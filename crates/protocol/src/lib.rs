//! Wire types for the hashdrop backend API.
//!
//! Every backend response is wrapped in an [`Envelope`]; the payloads for
//! each endpoint live in [`messages`].

pub mod constants;
pub mod envelope;
pub mod messages;

// Re-export primary types for convenience.
pub use constants::ResultCode;
pub use envelope::{Envelope, EnvelopeError};
pub use messages::{
    Ack, ChunkEtag, ChunkUrl, CompleteChunkedRequest, CompleteChunkedResponse,
    ConfirmUploadRequest, InitChunkedRequest, InitChunkedResponse, PreUploadCheckRequest,
    PreUploadCheckResponse, UpdateFileRequest,
};
