//! Connection authentication.
//!
//! An [`Authenticator`] turns the credential a client presents when opening
//! its WebSocket into the [`Identity`] that permission checks see.
//!
//! # Supported Authentication Methods
//!
//! - **None**: every connection is anonymous
//! - **Token**: static bearer tokens via the `LIVESUB_TOKENS` env var
//! - **JWT**: HS256 JSON Web Tokens verified with `LIVESUB_JWT_SECRET`
//!
//! # Environment Variable Formats
//!
//! ```text
//! LIVESUB_TOKENS="token1:alice;token2:bob"
//! LIVESUB_JWT_SECRET="your-secret-key"
//! ```

mod jwt;
mod token;

use std::sync::Arc;

use livesub_core::Identity;

use crate::config::AuthMode;
use crate::error::Result;

pub use jwt::{JwtAuthenticator, JwtClaims, JwtConfig};
pub use token::TokenAuthenticator;

/// Resolves a connection credential to an identity.
pub trait Authenticator: Send + Sync {
    /// `credential` is `None` when the client presented nothing; that is
    /// always an anonymous connection. A credential that is present but not
    /// accepted is an [`Error::Unauthorized`](crate::error::Error::Unauthorized).
    fn authenticate(&self, credential: Option<&str>) -> Result<Identity>;
}

/// Ignores credentials.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAuthenticator;

impl Authenticator for NoAuthenticator {
    fn authenticate(&self, _credential: Option<&str>) -> Result<Identity> {
        Ok(Identity::Anonymous)
    }
}

/// Build the authenticator for `mode` from the environment.
pub fn from_mode(mode: AuthMode) -> Result<Arc<dyn Authenticator>> {
    let authenticator: Arc<dyn Authenticator> = match mode {
        AuthMode::None => Arc::new(NoAuthenticator),
        AuthMode::Token => Arc::new(TokenAuthenticator::from_default_env()),
        AuthMode::Jwt => Arc::new(JwtAuthenticator::from_env()?),
    };
    Ok(authenticator)
}

/// Strip a `Bearer ` prefix if present.
pub(crate) fn strip_bearer(credential: &str) -> &str {
    credential
        .strip_prefix("Bearer ")
        .or_else(|| credential.strip_prefix("bearer "))
        .unwrap_or(credential)
        .trim()
}
