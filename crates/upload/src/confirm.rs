//! Metadata persistence: the durability boundary of every upload.

use hashdrop_protocol::{ConfirmUploadRequest, UpdateFileRequest};

use crate::backend::{Backend, NetworkStatus};
use crate::error::UploadError;
use crate::retry::RetryPolicy;

/// Strips the query string (signature) from a presigned URL.
pub fn object_url(presigned: &str) -> &str {
    presigned
        .split_once('?')
        .map_or(presigned, |(base, _)| base)
}

/// Writes the file record for bytes that are already stored.
///
/// On failure the bytes stay in the store without a record; nothing here
/// tries to reconcile that.
pub async fn confirm_upload(
    backend: &dyn Backend,
    network: &dyn NetworkStatus,
    policy: &RetryPolicy,
    req: &ConfirmUploadRequest,
) -> Result<(), UploadError> {
    policy
        .run(network, "confirm upload", || backend.confirm(req))
        .await
        .map_err(|e| UploadError::from_retry(e, UploadError::ConfirmFailed))
}

/// Points an existing file record at new content.
pub async fn update_record(
    backend: &dyn Backend,
    network: &dyn NetworkStatus,
    policy: &RetryPolicy,
    file_id: i64,
    req: &UpdateFileRequest,
) -> Result<(), UploadError> {
    policy
        .run(network, "update file record", || backend.update_file(file_id, req))
        .await
        .map_err(|e| {
            UploadError::from_retry(e, |msg| {
                UploadError::ConfirmFailed(format!("updating file {file_id}: {msg}"))
            })
        })
}
