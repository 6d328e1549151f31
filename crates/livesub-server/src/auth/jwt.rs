//! JWT based authentication.
//!
//! Tokens are HS256-signed with the secret in `LIVESUB_JWT_SECRET`. The
//! `sub` claim becomes the identity's subject and the optional `attributes`
//! object is copied onto it, so permission checks can match on tenant,
//! role and similar claims.
//!
//! # Example JWT Payload
//!
//! ```json
//! {
//!   "sub": "user-123",
//!   "exp": 1735689600,
//!   "iss": "livesub-auth",
//!   "attributes": { "tenant": "acme" }
//! }
//! ```

use std::collections::HashMap;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use livesub_core::Identity;

use super::{strip_bearer, Authenticator};
use crate::error::{Error, Result};

/// Environment variable holding the HMAC secret.
pub const JWT_SECRET_ENV: &str = "LIVESUB_JWT_SECRET";

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user identifier).
    pub sub: String,

    /// Expiration time (Unix timestamp).
    pub exp: u64,

    #[serde(default)]
    pub iat: Option<u64>,

    #[serde(default)]
    pub iss: Option<String>,

    #[serde(default)]
    pub aud: Option<String>,

    /// Attributes carried into the identity.
    #[serde(default)]
    pub attributes: Option<HashMap<String, Value>>,
}

impl JwtClaims {
    fn into_identity(self) -> Identity {
        let mut identity = Identity::user(self.sub);
        for (name, value) in self.attributes.unwrap_or_default() {
            identity = identity.with_attribute(name, value);
        }
        identity
    }
}

/// JWT validation settings.
#[derive(Clone)]
pub struct JwtConfig {
    pub validate_exp: bool,
    pub required_issuer: Option<String>,
    pub required_audience: Option<String>,
    /// Leeway in seconds for the expiration check.
    pub leeway_secs: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            validate_exp: true,
            required_issuer: None,
            required_audience: None,
            leeway_secs: 60,
        }
    }
}

/// Verifies HS256 JWTs.
pub struct JwtAuthenticator {
    decoding_key: DecodingKey,
    config: JwtConfig,
}

impl JwtAuthenticator {
    pub fn with_secret(secret: &[u8]) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            config: JwtConfig::default(),
        }
    }

    pub fn with_secret_str(secret: &str) -> Self {
        Self::with_secret(secret.as_bytes())
    }

    /// Load the secret from `LIVESUB_JWT_SECRET`.
    pub fn from_env() -> Result<Self> {
        match std::env::var(JWT_SECRET_ENV) {
            Ok(secret) if !secret.is_empty() => Ok(Self::with_secret_str(&secret)),
            _ => Err(Error::Config(format!(
                "no JWT secret configured (set {})",
                JWT_SECRET_ENV
            ))),
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.config.required_issuer = Some(issuer.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.config.required_audience = Some(audience.into());
        self
    }

    pub fn with_leeway(mut self, secs: u64) -> Self {
        self.config.leeway_secs = secs;
        self
    }

    pub fn without_exp_validation(mut self) -> Self {
        self.config.validate_exp = false;
        self
    }

    /// Verify a token and return its claims.
    pub fn verify_token(&self, token: &str) -> Result<JwtClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.config.leeway_secs;
        validation.validate_exp = self.config.validate_exp;

        if let Some(ref iss) = self.config.required_issuer {
            validation.set_issuer(&[iss]);
        }

        if let Some(ref aud) = self.config.required_audience {
            validation.set_audience(&[aud]);
        }

        let token_data = decode::<JwtClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| Error::Unauthorized(format!("JWT verification failed: {}", e)))?;

        Ok(token_data.claims)
    }
}

impl Authenticator for JwtAuthenticator {
    fn authenticate(&self, credential: Option<&str>) -> Result<Identity> {
        let Some(credential) = credential else {
            return Ok(Identity::Anonymous);
        };

        let claims = self.verify_token(strip_bearer(credential))?;
        debug!(subject = %claims.sub, "authenticated JWT");
        Ok(claims.into_identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn create_test_token(secret: &str, claims: &JwtClaims) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn test_claims() -> JwtClaims {
        JwtClaims {
            sub: "test-user".to_string(),
            exp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_secs()
                + 3600,
            iat: None,
            iss: None,
            aud: None,
            attributes: Some(HashMap::from([("tenant".to_string(), json!("acme"))])),
        }
    }

    #[test]
    fn test_authenticate_builds_identity() {
        let secret = "test-secret-key-for-testing";
        let auth = JwtAuthenticator::with_secret_str(secret);
        let token = create_test_token(secret, &test_claims());

        let identity = auth.authenticate(Some(&token)).unwrap();
        assert_eq!(identity.subject(), Some("test-user"));
        assert_eq!(identity.attribute("tenant"), Some(&json!("acme")));
    }

    #[test]
    fn test_bearer_prefix() {
        let secret = "test-secret-key-for-testing";
        let auth = JwtAuthenticator::with_secret_str(secret);
        let token = create_test_token(secret, &test_claims());

        assert!(auth.authenticate(Some(&format!("Bearer {}", token))).is_ok());
    }

    #[test]
    fn test_missing_credential_is_anonymous() {
        let auth = JwtAuthenticator::with_secret_str("secret");
        assert_eq!(auth.authenticate(None).unwrap(), Identity::Anonymous);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let auth = JwtAuthenticator::with_secret_str("correct-secret");
        let token = create_test_token("wrong-secret", &test_claims());

        assert!(matches!(
            auth.authenticate(Some(&token)),
            Err(Error::Unauthorized(_))
        ));
    }

    #[test]
    fn test_expired_token() {
        let secret = "test-secret";
        let auth = JwtAuthenticator::with_secret_str(secret);

        let mut claims = test_claims();
        claims.exp = 1;
        let token = create_test_token(secret, &claims);

        assert!(auth.authenticate(Some(&token)).is_err());
    }

    #[test]
    fn test_issuer_validation() {
        let secret = "test-secret";
        let auth = JwtAuthenticator::with_secret_str(secret).with_issuer("trusted-issuer");

        let mut claims = test_claims();
        claims.iss = Some("trusted-issuer".to_string());
        assert!(auth
            .authenticate(Some(&create_test_token(secret, &claims)))
            .is_ok());

        claims.iss = Some("untrusted-issuer".to_string());
        assert!(auth
            .authenticate(Some(&create_test_token(secret, &claims)))
            .is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        let auth = JwtAuthenticator::with_secret_str("secret");
        assert!(auth.authenticate(Some("not-a-jwt")).is_err());
    }
}
