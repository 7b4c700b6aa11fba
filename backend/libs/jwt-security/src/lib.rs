//! JWT identity resolution for realtime connections
//!
//! **Features**:
//! - `TokenIdentity`: decode an opaque bearer token into a user id
//! - `JwtIdentity`: HS256 implementation backed by `jsonwebtoken`
//! - Secret strength validation (minimum 32 bytes, entropy and pattern checks)
//!
//! Decoding never errors to the caller. A token that cannot be verified simply
//! yields no identity, and the connection is treated as anonymous.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub mod secret_validation;

pub use secret_validation::{validate_secret_strength, SecretProfile, SecretStrength};

const DEFAULT_VALIDATION_LEEWAY: u64 = 30; // 30 seconds clock skew tolerance

/// Opaque user identifier carried by a verified token
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&UserId> for UserId {
    fn from(id: &UserId) -> Self {
        id.clone()
    }
}

/// Resolves a bearer token to the user it was issued for
///
/// Implementations must be pure: no side effects, no panics. Anything that
/// fails verification returns `None`.
pub trait TokenIdentity: Send + Sync {
    fn decode(&self, token: &str) -> Option<UserId>;
}

impl<T: TokenIdentity + ?Sized> TokenIdentity for Arc<T> {
    fn decode(&self, token: &str) -> Option<UserId> {
        (**self).decode(token)
    }
}

/// Errors raised while building or signing with a `JwtIdentity`
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("JWT secret is empty")]
    EmptySecret,

    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Either a string or a numeric id; issuers disagree on which they emit.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ClaimId {
    Text(String),
    Number(i64),
}

impl ClaimId {
    fn into_user_id(self) -> Option<UserId> {
        match self {
            ClaimId::Text(s) if s.trim().is_empty() => None,
            ClaimId::Text(s) => Some(UserId(s)),
            ClaimId::Number(n) => Some(UserId(n.to_string())),
        }
    }
}

/// Claims read from an incoming token
#[derive(Debug, Deserialize)]
struct IdentityClaims {
    #[serde(default)]
    sub: Option<ClaimId>,
    /// Legacy tokens carry the user id as `id`
    #[serde(default)]
    id: Option<ClaimId>,
}

/// Claims written by `JwtIdentity::issue`
#[derive(Debug, Serialize)]
struct IssuedClaims<'a> {
    sub: &'a str,
    iat: i64,
    exp: i64,
}

/// HS256 token identity
pub struct JwtIdentity {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtIdentity {
    pub fn from_secret(secret: &str) -> Result<Self, IdentityError> {
        if secret.is_empty() {
            return Err(IdentityError::EmptySecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = DEFAULT_VALIDATION_LEEWAY;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// Sign a token for `user_id` valid for `ttl`
    ///
    /// Token issuance belongs to the auth service; this exists for local
    /// tooling and tests that need a token the gateway will accept.
    pub fn issue(&self, user_id: &UserId, ttl: Duration) -> Result<String, IdentityError> {
        let now = Utc::now();
        let claims = IssuedClaims {
            sub: user_id.as_str(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }
}

impl TokenIdentity for JwtIdentity {
    fn decode(&self, token: &str) -> Option<UserId> {
        let data = match decode::<IdentityClaims>(token, &self.decoding, &self.validation) {
            Ok(data) => data,
            Err(e) => {
                debug!(error = %e, "Token rejected, connection stays anonymous");
                return None;
            }
        };

        let claims = data.claims;
        claims
            .sub
            .and_then(ClaimId::into_user_id)
            .or_else(|| claims.id.and_then(ClaimId::into_user_id))
    }
}

impl fmt::Debug for JwtIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtIdentity")
            .field("algorithm", &Algorithm::HS256)
            .finish_non_exhaustive()
    }
}
