//! Ambient bearer credential.

use std::sync::RwLock;

/// Holds the access token shared by every backend call.
///
/// The engine never reads the token; the client attaches it and the
/// application clears it when the backend reports expiry.
#[derive(Debug, Default)]
pub struct AuthContext {
    token: RwLock<Option<String>>,
}

impl AuthContext {
    /// Creates a context. Empty tokens count as absent.
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(token.filter(|t| !t.is_empty())),
        }
    }

    /// Current token, if any.
    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_token(&self, token: String) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = Some(token);
    }

    /// Drops the token; later calls fail with `AuthExpired` without I/O.
    pub fn invalidate(&self) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.read().map(|t| t.is_some()).unwrap_or(false)
    }
}
