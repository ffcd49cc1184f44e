//! Back-office authentication.
//!
//! Staff exchange the admin password for a signed, expiring session token:
//!
//! ```text
//! base64url(claims JSON) "." hex(HMAC-SHA256(encoded claims, session secret))
//! ```
//!
//! Tokens are stateless, so they survive restarts and work across instances.
//! Protected handlers take an [`AdminSession`] parameter, which validates the
//! `Authorization: Bearer <token>` header.

use crate::error::AppError;
use crate::server::state::AppState;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Session errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Wrong admin password
    #[error("invalid credentials")]
    InvalidCredentials,
    /// No bearer token on the request
    #[error("missing bearer token")]
    Missing,
    /// Token is not shaped like a session token
    #[error("malformed session token")]
    Malformed,
    /// Token signature does not match
    #[error("invalid session token")]
    BadSignature,
    /// Token is past its expiry
    #[error("session expired")]
    Expired,
}

/// Claims carried by a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminClaims {
    /// Session identifier, for log correlation
    pub sid: Uuid,
    /// Issue time (Unix seconds)
    pub iat: i64,
    /// Expiry (Unix seconds)
    pub exp: i64,
}

/// A freshly issued token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionToken {
    /// Bearer token
    pub token: String,
    /// Expiry
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies admin session tokens
pub struct SessionSigner {
    key: Vec<u8>,
    admin_password: String,
    ttl: Duration,
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionSigner {
    /// Creates a signer keyed by `secret`
    #[must_use]
    pub fn new(secret: &[u8], admin_password: impl Into<String>, ttl: Duration) -> Self {
        Self {
            key: secret.to_vec(),
            admin_password: admin_password.into(),
            ttl,
        }
    }

    /// Exchanges the admin password for a session token.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidCredentials`] for a wrong password.
    pub fn login(&self, password: &str, now: DateTime<Utc>) -> Result<SessionToken, SessionError> {
        if !constant_time_eq(password.as_bytes(), self.admin_password.as_bytes()) {
            return Err(SessionError::InvalidCredentials);
        }
        Ok(self.issue(now))
    }

    /// Issues a token valid from `now` for the configured lifetime
    #[must_use]
    pub fn issue(&self, now: DateTime<Utc>) -> SessionToken {
        let expires_at = now + self.ttl;
        let claims = AdminClaims {
            sid: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        // Serializing plain integers and a UUID cannot fail
        let json = serde_json::to_vec(&claims).unwrap_or_default();
        let encoded = URL_SAFE_NO_PAD.encode(json);
        let signature = self.sign(&encoded);
        SessionToken {
            token: format!("{encoded}.{signature}"),
            expires_at,
        }
    }

    /// Verifies a token and returns its claims.
    ///
    /// # Errors
    ///
    /// [`SessionError::Malformed`], [`SessionError::BadSignature`] or
    /// [`SessionError::Expired`].
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<AdminClaims, SessionError> {
        let (encoded, signature) = token.split_once('.').ok_or(SessionError::Malformed)?;
        if !constant_time_eq(self.sign(encoded).as_bytes(), signature.as_bytes()) {
            return Err(SessionError::BadSignature);
        }
        let json = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| SessionError::Malformed)?;
        let claims: AdminClaims =
            serde_json::from_slice(&json).map_err(|_| SessionError::Malformed)?;
        if now.timestamp() >= claims.exp {
            return Err(SessionError::Expired);
        }
        Ok(claims)
    }

    fn sign(&self, encoded: &str) -> String {
        let mut mac = match HmacSha256::new_from_slice(&self.key) {
            Ok(mac) => mac,
            // HMAC accepts keys of any length
            Err(_) => return String::new(),
        };
        mac.update(encoded.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

// ============================================================================
// Extractors
// ============================================================================

/// Bearer token from the `Authorization` header
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(SessionError::Missing)?;
        Ok(Self(token.to_string()))
    }
}

/// A validated back-office session.
///
/// Use as a handler parameter to require authentication.
#[derive(Debug, Clone)]
pub struct AdminSession(pub AdminClaims);

#[async_trait]
impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let bearer = BearerToken::from_request_parts(parts, state).await?;
        let claims = state
            .sessions
            .verify(&bearer.0, state.clock.now())
            .inspect_err(|e| tracing::debug!(error = %e, "Admin session rejected"))?;
        Ok(Self(claims))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 18, 9, 0, 0).unwrap()
    }

    fn signer() -> SessionSigner {
        SessionSigner::new(b"session-secret", "door-staff", Duration::hours(1))
    }

    #[test]
    fn test_login_and_verify() {
        let signer = signer();
        let session = signer.login("door-staff", now()).unwrap();
        assert_eq!(session.expires_at, now() + Duration::hours(1));

        let claims = signer.verify(&session.token, now()).unwrap();
        assert_eq!(claims.iat, now().timestamp());
    }

    #[test]
    fn test_wrong_password() {
        assert_eq!(
            signer().login("guess", now()).unwrap_err(),
            SessionError::InvalidCredentials
        );
    }

    #[test]
    fn test_expired() {
        let signer = signer();
        let session = signer.issue(now());
        let later = now() + Duration::hours(1);
        assert_eq!(
            signer.verify(&session.token, later).unwrap_err(),
            SessionError::Expired
        );
    }

    #[test]
    fn test_other_key_rejected() {
        let session = signer().issue(now());
        let other = SessionSigner::new(b"other-secret", "door-staff", Duration::hours(1));
        assert_eq!(
            other.verify(&session.token, now()).unwrap_err(),
            SessionError::BadSignature
        );
    }

    #[test]
    fn test_tampered_claims_rejected() {
        let signer = signer();
        let session = signer.issue(now());
        let (_, signature) = session.token.split_once('.').unwrap();
        let forged = URL_SAFE_NO_PAD.encode(br#"{"sid":"00000000-0000-0000-0000-000000000000","iat":0,"exp":9999999999}"#);
        assert_eq!(
            signer
                .verify(&format!("{forged}.{signature}"), now())
                .unwrap_err(),
            SessionError::BadSignature
        );
        assert_eq!(
            signer.verify("no-dot", now()).unwrap_err(),
            SessionError::Malformed
        );
    }
}
