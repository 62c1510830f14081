//! Mock seams shared by the engine tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use hashdrop_protocol::{
    ChunkEtag, ChunkUrl, CompleteChunkedRequest, CompleteChunkedResponse, ConfirmUploadRequest,
    InitChunkedRequest, InitChunkedResponse, PreUploadCheckRequest, PreUploadCheckResponse,
    UpdateFileRequest,
};

use crate::backend::{Backend, BoxFuture, ByteProgress, ObjectStore, PutBody};
use crate::error::{BackendError, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Op {
    PreCheck,
    Init,
    Complete,
    Abort,
    Confirm,
    Update,
}

/// Scriptable backend that records every call.
#[derive(Default)]
pub(crate) struct MockBackend {
    calls: Mutex<Vec<Op>>,
    failures: Mutex<HashMap<Op, VecDeque<BackendError>>>,
    existing: Option<(i64, String)>,
    init_existing: Option<(i64, String)>,
    recommended_concurrency: Option<u32>,
    missing_part: Option<u32>,
    extra_part_urls: u32,
    no_presigned_url: bool,
    init_requests: Mutex<Vec<InitChunkedRequest>>,
    completed: Mutex<Vec<(String, Vec<ChunkEtag>)>>,
    confirmed: Mutex<Vec<ConfirmUploadRequest>>,
    updated: Mutex<Vec<(i64, UpdateFileRequest)>>,
    aborted: Mutex<Vec<String>>,
}

impl MockBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Pre-check reports the content as already stored.
    pub(crate) fn with_existing(mut self, file_id: i64, url: &str) -> Self {
        self.existing = Some((file_id, url.into()));
        self
    }

    /// Chunk-session init reports the content as already stored.
    pub(crate) fn with_init_existing(mut self, file_id: i64, url: &str) -> Self {
        self.init_existing = Some((file_id, url.into()));
        self
    }

    pub(crate) fn with_recommended_concurrency(mut self, n: u32) -> Self {
        self.recommended_concurrency = Some(n);
        self
    }

    /// Init issues `n` URLs beyond the requested part count.
    pub(crate) fn with_extra_part_urls(mut self, n: u32) -> Self {
        self.extra_part_urls = n;
        self
    }

    /// Init omits the URL for `part`.
    pub(crate) fn without_part_url(mut self, part: u32) -> Self {
        self.missing_part = Some(part);
        self
    }

    /// Pre-check answers "absent" but issues no URL.
    pub(crate) fn without_presigned_url(mut self) -> Self {
        self.no_presigned_url = true;
        self
    }

    /// The next `times` calls of `op` fail with `err`.
    pub(crate) fn fail(self, op: Op, times: usize, err: BackendError) -> Self {
        {
            let mut failures = self.failures.lock().unwrap();
            let queue = failures.entry(op).or_default();
            for _ in 0..times {
                queue.push_back(err.clone());
            }
        }
        self
    }

    pub(crate) fn count(&self, op: Op) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == op).count()
    }

    pub(crate) fn init_requests(&self) -> Vec<InitChunkedRequest> {
        self.init_requests.lock().unwrap().clone()
    }

    pub(crate) fn completed(&self) -> Vec<(String, Vec<ChunkEtag>)> {
        self.completed.lock().unwrap().clone()
    }

    pub(crate) fn confirmed(&self) -> Vec<ConfirmUploadRequest> {
        self.confirmed.lock().unwrap().clone()
    }

    pub(crate) fn updated(&self) -> Vec<(i64, UpdateFileRequest)> {
        self.updated.lock().unwrap().clone()
    }

    pub(crate) fn aborted(&self) -> Vec<String> {
        self.aborted.lock().unwrap().clone()
    }

    fn enter(&self, op: Op) -> Result<(), BackendError> {
        self.calls.lock().unwrap().push(op);
        match self.failures.lock().unwrap().get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub(crate) const UPLOAD_ID: &str = "up-1";

pub(crate) fn part_url(part: u32) -> String {
    format!("http://store/{UPLOAD_ID}/part/{part}?sig=abc")
}

impl Backend for MockBackend {
    fn pre_check<'a>(
        &'a self,
        req: &'a PreUploadCheckRequest,
    ) -> BoxFuture<'a, Result<PreUploadCheckResponse, BackendError>> {
        Box::pin(async move {
            self.enter(Op::PreCheck)?;
            Ok(match &self.existing {
                Some((id, url)) => PreUploadCheckResponse {
                    file_exists: true,
                    file_id: Some(*id),
                    file_path: Some(url.clone()),
                    presigned_url: None,
                },
                None => PreUploadCheckResponse {
                    file_exists: false,
                    file_id: None,
                    file_path: None,
                    presigned_url: (!self.no_presigned_url)
                        .then(|| format!("http://store/single/{}?sig=abc", req.name)),
                },
            })
        })
    }

    fn init_chunked<'a>(
        &'a self,
        req: &'a InitChunkedRequest,
    ) -> BoxFuture<'a, Result<InitChunkedResponse, BackendError>> {
        Box::pin(async move {
            self.enter(Op::Init)?;
            self.init_requests.lock().unwrap().push(req.clone());
            if let Some((id, url)) = &self.init_existing {
                return Ok(InitChunkedResponse {
                    file_exists: true,
                    file_id: Some(*id),
                    file_url: Some(url.clone()),
                    ..Default::default()
                });
            }
            let chunk_urls = (1..=req.total_chunks + self.extra_part_urls)
                .filter(|p| Some(*p) != self.missing_part)
                .map(|p| ChunkUrl {
                    part_number: p,
                    presigned_url: part_url(p),
                })
                .collect();
            Ok(InitChunkedResponse {
                upload_id: UPLOAD_ID.into(),
                chunk_urls,
                expires_in: Some(3600),
                recommended_concurrency: self.recommended_concurrency,
                ..Default::default()
            })
        })
    }

    fn complete_chunked<'a>(
        &'a self,
        upload_id: &'a str,
        req: &'a CompleteChunkedRequest,
    ) -> BoxFuture<'a, Result<CompleteChunkedResponse, BackendError>> {
        Box::pin(async move {
            self.enter(Op::Complete)?;
            self.completed
                .lock()
                .unwrap()
                .push((upload_id.to_string(), req.chunk_etags.clone()));
            Ok(CompleteChunkedResponse {
                file_id: Some(99),
                file_url: format!("https://cdn/merged/{upload_id}"),
            })
        })
    }

    fn abort_chunked<'a>(&'a self, upload_id: &'a str) -> BoxFuture<'a, Result<(), BackendError>> {
        Box::pin(async move {
            self.aborted.lock().unwrap().push(upload_id.to_string());
            self.enter(Op::Abort)
        })
    }

    fn confirm<'a>(
        &'a self,
        req: &'a ConfirmUploadRequest,
    ) -> BoxFuture<'a, Result<(), BackendError>> {
        Box::pin(async move {
            self.enter(Op::Confirm)?;
            self.confirmed.lock().unwrap().push(req.clone());
            Ok(())
        })
    }

    fn update_file<'a>(
        &'a self,
        file_id: i64,
        req: &'a UpdateFileRequest,
    ) -> BoxFuture<'a, Result<(), BackendError>> {
        Box::pin(async move {
            self.enter(Op::Update)?;
            self.updated.lock().unwrap().push((file_id, req.clone()));
            Ok(())
        })
    }
}

/// Object store that keeps PUT bodies in memory.
///
/// Rules match on a substring of the URL (e.g. `"part/3?"`).
#[derive(Default)]
pub(crate) struct MockStore {
    no_etags: bool,
    failures: Mutex<Vec<(String, usize)>>,
    delays: Vec<(String, Duration)>,
    attempts: Mutex<Vec<String>>,
    stored: Mutex<Vec<(String, u64, Option<Vec<u8>>)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Responses carry no `ETag` header.
    pub(crate) fn without_etags(mut self) -> Self {
        self.no_etags = true;
        self
    }

    /// The first `times` PUTs to URLs containing `pattern` fail.
    pub(crate) fn fail(self, pattern: &str, times: usize) -> Self {
        self.failures.lock().unwrap().push((pattern.into(), times));
        self
    }

    /// PUTs to URLs containing `pattern` take `delay`.
    pub(crate) fn delay(mut self, pattern: &str, delay: Duration) -> Self {
        self.delays.push((pattern.into(), delay));
        self
    }

    pub(crate) fn attempts(&self, pattern: &str) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.contains(pattern))
            .count()
    }

    pub(crate) fn total_attempts(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    /// URLs of successful PUTs, in completion order.
    pub(crate) fn stored_urls(&self) -> Vec<String> {
        self.stored
            .lock()
            .unwrap()
            .iter()
            .map(|(u, _, _)| u.clone())
            .collect()
    }

    /// In-memory body of the successful PUT to `url`.
    pub(crate) fn stored_bytes(&self, url: &str) -> Option<Vec<u8>> {
        self.stored
            .lock()
            .unwrap()
            .iter()
            .find(|(u, _, _)| u == url)
            .and_then(|(_, _, data)| data.clone())
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn should_fail(&self, url: &str) -> bool {
        let mut failures = self.failures.lock().unwrap();
        for (pattern, remaining) in failures.iter_mut() {
            if url.contains(pattern.as_str()) && *remaining > 0 {
                *remaining -= 1;
                return true;
            }
        }
        false
    }
}

/// ETag the mock store returns for `url`: `etag-` plus its last path segment.
pub(crate) fn etag_for(url: &str) -> String {
    let path = url.split('?').next().unwrap_or(url);
    format!("etag-{}", path.rsplit('/').next().unwrap_or(path))
}

impl ObjectStore for MockStore {
    fn put<'a>(
        &'a self,
        url: &'a str,
        _content_type: &'a str,
        body: PutBody,
        on_progress: Option<ByteProgress>,
    ) -> BoxFuture<'a, Result<Option<String>, StoreError>> {
        Box::pin(async move {
            self.attempts.lock().unwrap().push(url.to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let delay = self
                .delays
                .iter()
                .find(|(p, _)| url.contains(p.as_str()))
                .map(|(_, d)| *d)
                .unwrap_or(Duration::from_millis(1));
            tokio::time::sleep(delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.should_fail(url) {
                return Err(StoreError::Status(503));
            }

            let len = body.len();
            if let Some(cb) = &on_progress {
                cb(len / 2, len);
                cb(len, len);
            }
            let data = match body {
                PutBody::Bytes(data) => Some(data),
                PutBody::File { .. } => None,
            };
            self.stored.lock().unwrap().push((url.to_string(), len, data));

            Ok((!self.no_etags).then(|| etag_for(url)))
        })
    }
}
