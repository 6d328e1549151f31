//! Static bearer tokens.
//!
//! Each token maps to the subject of the identity it authenticates.
//!
//! ```text
//! LIVESUB_TOKENS="session-abc123:alice;service-token:indexer"
//! ```

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::debug;

use livesub_core::Identity;

use super::{strip_bearer, Authenticator};
use crate::error::{Error, Result};

/// Environment variable read by [`TokenAuthenticator::from_default_env`].
pub const TOKENS_ENV: &str = "LIVESUB_TOKENS";

#[derive(Clone)]
struct TokenEntry {
    subject: String,
    expires_at: Option<Instant>,
}

impl TokenEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.map(|exp| Instant::now() > exp).unwrap_or(false)
    }
}

/// Validates bearer tokens against an in-memory table.
pub struct TokenAuthenticator {
    tokens: RwLock<HashMap<String, TokenEntry>>,
}

impl TokenAuthenticator {
    pub fn new() -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Register a token for `subject` with no expiry.
    pub fn register_token(&self, token: impl Into<String>, subject: impl Into<String>) {
        self.tokens.write().insert(
            token.into(),
            TokenEntry {
                subject: subject.into(),
                expires_at: None,
            },
        );
    }

    /// Register a token that stops working after `ttl`.
    pub fn register_token_with_ttl(
        &self,
        token: impl Into<String>,
        subject: impl Into<String>,
        ttl: Duration,
    ) {
        self.tokens.write().insert(
            token.into(),
            TokenEntry {
                subject: subject.into(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
    }

    pub fn revoke_token(&self, token: &str) -> bool {
        self.tokens.write().remove(token).is_some()
    }

    /// Parse `token:subject` pairs separated by `;`. Malformed pairs are skipped.
    pub fn parse(list: &str) -> Self {
        let auth = Self::new();

        for pair in list.split(';') {
            let Some((token, subject)) = pair.trim().split_once(':') else {
                continue;
            };
            let (token, subject) = (token.trim(), subject.trim());
            if !token.is_empty() && !subject.is_empty() {
                auth.register_token(token, subject);
            }
        }

        auth
    }

    /// Load tokens from an environment variable. Unset means no tokens.
    pub fn from_env(env_var: &str) -> Self {
        let auth = std::env::var(env_var)
            .map(|list| Self::parse(&list))
            .unwrap_or_default();
        debug!(tokens = auth.token_count(), env_var, "loaded bearer tokens");
        auth
    }

    pub fn from_default_env() -> Self {
        Self::from_env(TOKENS_ENV)
    }

    pub fn is_valid(&self, token: &str) -> bool {
        self.tokens
            .read()
            .get(token)
            .map(|entry| !entry.is_expired())
            .unwrap_or(false)
    }

    pub fn token_count(&self) -> usize {
        self.tokens.read().len()
    }
}

impl Default for TokenAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

impl Authenticator for TokenAuthenticator {
    fn authenticate(&self, credential: Option<&str>) -> Result<Identity> {
        let Some(credential) = credential else {
            return Ok(Identity::Anonymous);
        };

        let tokens = self.tokens.read();
        match tokens.get(strip_bearer(credential)) {
            Some(entry) if entry.is_expired() => {
                Err(Error::Unauthorized("token expired".to_string()))
            }
            Some(entry) => Ok(Identity::user(entry.subject.clone())),
            None => Err(Error::Unauthorized("invalid token".to_string())),
        }
    }
}
