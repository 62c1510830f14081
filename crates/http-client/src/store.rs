//! Presigned-URL object store.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::StreamExt;
use hashdrop_upload::{BoxFuture, ByteProgress, ObjectStore, PutBody, StoreError};
use reqwest::Body;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::ClientError;

/// PUTs bytes directly to presigned URLs.
///
/// The URLs carry their own signature, so no credential is attached.
pub struct PresignedStore {
    http: reqwest::Client,
}

impl PresignedStore {
    pub fn new() -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self { http })
    }

    async fn put_body(
        &self,
        url: &str,
        content_type: &str,
        body: PutBody,
        on_progress: Option<ByteProgress>,
    ) -> Result<Option<String>, StoreError> {
        let len = body.len();
        let (body, streamed) = match body {
            PutBody::Bytes(data) => (Body::from(data), false),
            PutBody::File { path, .. } => {
                let file = tokio::fs::File::open(&path).await?;
                (file_body(file, len, on_progress.clone()), true)
            }
        };

        let mut req = self.http.put(url).header(CONTENT_TYPE, content_type);
        if streamed {
            // Stores reject chunked transfer encoding on presigned PUTs.
            req = req.header(CONTENT_LENGTH, len);
        }
        let resp = req
            .body(body)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(StoreError::Status(status.as_u16()));
        }
        if !streamed && let Some(cb) = &on_progress {
            cb(len, len);
        }

        let etag = resp
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        debug!(status = status.as_u16(), bytes = len, etag = ?etag, "object stored");
        Ok(etag)
    }
}

/// Streams `file` as a request body, reporting bytes handed to the transport.
fn file_body(file: tokio::fs::File, len: u64, on_progress: Option<ByteProgress>) -> Body {
    let sent = Arc::new(AtomicU64::new(0));
    let stream = ReaderStream::new(file).map(move |chunk| {
        if let (Ok(bytes), Some(cb)) = (&chunk, &on_progress) {
            let done = sent.fetch_add(bytes.len() as u64, Ordering::Relaxed) + bytes.len() as u64;
            cb(done.min(len), len);
        }
        chunk
    });
    Body::wrap_stream(stream)
}

impl ObjectStore for PresignedStore {
    fn put<'a>(
        &'a self,
        url: &'a str,
        content_type: &'a str,
        body: PutBody,
        on_progress: Option<ByteProgress>,
    ) -> BoxFuture<'a, Result<Option<String>, StoreError>> {
        Box::pin(self.put_body(url, content_type, body, on_progress))
    }
}
