//! Session token obtained at login.

use secrecy::{ExposeSecret, SecretString};

use crate::error::ClientError;
use crate::sanitize;

/// An authenticated session. The token is never empty.
#[derive(Clone)]
pub struct Session {
    token: SecretString,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Result<Self, ClientError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(ClientError::Auth("empty session token".to_string()));
        }
        Ok(Self {
            token: SecretString::from(token),
        })
    }

    pub fn token(&self) -> &str {
        self.token.expose_secret()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &sanitize::redact_token(self.token()))
            .finish()
    }
}
