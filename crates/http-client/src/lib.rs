//! HTTP transport for hashdrop.
//!
//! [`ApiClient`] talks to the REST backend with a bearer token held by an
//! [`AuthContext`]; [`PresignedStore`] PUTs bytes straight to presigned
//! object-store URLs. Both plug into the engine through the
//! `hashdrop_upload` seam traits.

pub mod auth;
pub mod client;
pub mod store;

#[cfg(test)]
mod test_server;

pub use auth::AuthContext;
pub use client::ApiClient;
pub use store::PresignedStore;

/// Errors building an HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
}
