//! Single-shot transfer: one PUT of the whole file.

use std::path::Path;

use crate::backend::{ByteProgress, ObjectStore, PutBody};
use crate::error::UploadError;

/// Streams the file at `path` to `url`.
///
/// The PUT is not retried here. Repeating it is only safe when the store
/// overwrites idempotently, which the engine does not verify.
pub async fn upload_single(
    store: &dyn ObjectStore,
    url: &str,
    content_type: &str,
    path: &Path,
    size: u64,
    on_progress: Option<ByteProgress>,
) -> Result<Option<String>, UploadError> {
    let body = PutBody::File {
        path: path.to_path_buf(),
        len: size,
    };
    store
        .put(url, content_type, body, on_progress)
        .await
        .map_err(|e| UploadError::UploadFailed(e.to_string()))
}
