//! Dedup pre-check: is this digest already stored?

use hashdrop_protocol::PreUploadCheckRequest;
use tracing::debug;

use crate::backend::{Backend, NetworkStatus};
use crate::error::UploadError;
use crate::retry::RetryPolicy;

/// What the backend answered.
#[derive(Debug, Clone, PartialEq)]
pub enum PrecheckOutcome {
    /// Identical content exists; no bytes need to move.
    Exists {
        file_id: Option<i64>,
        url: Option<String>,
    },
    /// Content is new. Small files get a presigned URL right away.
    Upload { presigned_url: Option<String> },
}

/// Calls the pre-check endpoint under the request retry policy.
pub async fn pre_check(
    backend: &dyn Backend,
    network: &dyn NetworkStatus,
    policy: &RetryPolicy,
    req: &PreUploadCheckRequest,
) -> Result<PrecheckOutcome, UploadError> {
    let resp = policy
        .run(network, "pre-upload check", || backend.pre_check(req))
        .await
        .map_err(|e| UploadError::from_retry(e, UploadError::PrecheckFailed))?;

    debug!(
        name = %req.name,
        exists = resp.file_exists,
        has_url = resp.presigned_url.is_some(),
        "pre-check answered"
    );

    if resp.file_exists {
        Ok(PrecheckOutcome::Exists {
            file_id: resp.file_id,
            url: resp.file_path,
        })
    } else {
        Ok(PrecheckOutcome::Upload {
            presigned_url: resp.presigned_url,
        })
    }
}
