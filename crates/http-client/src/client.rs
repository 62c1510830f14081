//! Backend API client.
//!
//! Async HTTP client using `reqwest` with Bearer token authentication.
//! Every response is an [`Envelope`]; error statuses whose body is still a
//! valid envelope are decoded the same way.

use std::sync::Arc;
use std::time::Duration;

use hashdrop_protocol::constants::{
    PATH_CHUNKED_UPLOAD, PATH_CONFIRM_UPLOAD, PATH_FILE, PATH_PRE_UPLOAD_CHECK,
};
use hashdrop_protocol::{
    Ack, CompleteChunkedRequest, CompleteChunkedResponse, ConfirmUploadRequest, Envelope,
    InitChunkedRequest, InitChunkedResponse, PreUploadCheckRequest, PreUploadCheckResponse,
    UpdateFileRequest,
};
use hashdrop_upload::{Backend, BackendError, BoxFuture};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::ClientError;
use crate::auth::AuthContext;

/// Characters left unescaped in a path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest error body echoed into a [`BackendError`].
const MAX_ERROR_BODY: usize = 200;

/// hashdrop backend API client.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth: Arc<AuthContext>,
}

impl ApiClient {
    /// Creates a client for the API rooted at `base_url`.
    pub fn new(base_url: &str, auth: Arc<AuthContext>) -> Result<Self, ClientError> {
        let base_url = base_url.trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::InvalidBaseUrl(base_url.to_string()));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("hashdrop/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.to_string(),
            auth,
        })
    }

    pub fn auth(&self) -> &Arc<AuthContext> {
        &self.auth
    }

    /// Sends one authenticated request and unwraps the envelope.
    async fn call<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Option<T>, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let token = self.auth.token().ok_or(BackendError::AuthExpired)?;
        let url = format!("{}{}", self.base_url, path);

        let mut req = self.http.request(method.clone(), &url).bearer_auth(token);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;
        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;
        debug!(%method, path, status = status.as_u16(), "backend responded");

        decode(status, &bytes)
    }

    /// Like [`call`](Self::call) but requires a payload.
    async fn call_data<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.call(method, path, Some(body))
            .await?
            .ok_or_else(|| BackendError::Decode(format!("{path}: response has no data")))
    }
}

/// Interprets a response body.
///
/// A parseable envelope wins over the HTTP status, so a 401 carrying code
/// `40001` surfaces as [`BackendError::AuthExpired`].
fn decode<T: DeserializeOwned>(status: StatusCode, bytes: &[u8]) -> Result<Option<T>, BackendError> {
    match serde_json::from_slice::<Envelope<T>>(bytes) {
        Ok(envelope) => Ok(envelope.into_result()?),
        Err(_) if status == StatusCode::UNAUTHORIZED => Err(BackendError::AuthExpired),
        Err(_) if !status.is_success() => Err(BackendError::Rejected {
            code: i32::from(status.as_u16()),
            msg: snippet(bytes),
        }),
        Err(e) => Err(BackendError::Decode(e.to_string())),
    }
}

fn snippet(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    match text.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

fn segment(value: &str) -> String {
    utf8_percent_encode(value, SEGMENT).to_string()
}

impl Backend for ApiClient {
    fn pre_check<'a>(
        &'a self,
        req: &'a PreUploadCheckRequest,
    ) -> BoxFuture<'a, Result<PreUploadCheckResponse, BackendError>> {
        Box::pin(self.call_data(Method::POST, PATH_PRE_UPLOAD_CHECK, req))
    }

    fn init_chunked<'a>(
        &'a self,
        req: &'a InitChunkedRequest,
    ) -> BoxFuture<'a, Result<InitChunkedResponse, BackendError>> {
        Box::pin(self.call_data(Method::POST, PATH_CHUNKED_UPLOAD, req))
    }

    fn complete_chunked<'a>(
        &'a self,
        upload_id: &'a str,
        req: &'a CompleteChunkedRequest,
    ) -> BoxFuture<'a, Result<CompleteChunkedResponse, BackendError>> {
        Box::pin(async move {
            let path = format!("{PATH_CHUNKED_UPLOAD}/{}/complete", segment(upload_id));
            self.call_data(Method::POST, &path, req).await
        })
    }

    fn abort_chunked<'a>(&'a self, upload_id: &'a str) -> BoxFuture<'a, Result<(), BackendError>> {
        Box::pin(async move {
            let path = format!("{PATH_CHUNKED_UPLOAD}/{}", segment(upload_id));
            self.call::<(), Ack>(Method::DELETE, &path, None).await?;
            Ok(())
        })
    }

    fn confirm<'a>(
        &'a self,
        req: &'a ConfirmUploadRequest,
    ) -> BoxFuture<'a, Result<(), BackendError>> {
        Box::pin(async move {
            self.call::<_, Ack>(Method::POST, PATH_CONFIRM_UPLOAD, Some(req))
                .await?;
            Ok(())
        })
    }

    fn update_file<'a>(
        &'a self,
        file_id: i64,
        req: &'a UpdateFileRequest,
    ) -> BoxFuture<'a, Result<(), BackendError>> {
        Box::pin(async move {
            let path = format!("{PATH_FILE}/{file_id}");
            self.call::<_, Ack>(Method::PUT, &path, Some(req)).await?;
            Ok(())
        })
    }
}
