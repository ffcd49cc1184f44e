//! Ticket code generation and integrity checks.
//!
//! A ticket code has four `-`-separated segments:
//!
//! ```text
//! IAF-MA1B2C3D-9F04C2E1-7A3B
//! │   │        │        └─ CHECKSUM: first 4 hex chars of HMAC-SHA256(secret, "PREFIX-TIMESTAMP-RANDOM")
//! │   │        └─ RANDOM: 32 bits from the OS CSPRNG, 8 hex digits
//! │   └─ TIMESTAMP: issuance time in milliseconds, base 36
//! └─ PREFIX: event namespace tag
//! ```
//!
//! Codes are short enough to read out over the phone, sort roughly by issuance
//! time, and can be checked for tampering without a storage lookup. A random
//! single-character edit passes the checksum with probability 1/65536.
//!
//! Uniqueness is probabilistic here. The store enforces a unique constraint on
//! the code column and the order service regenerates on collision.

use crate::environment::Clock;
use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Segment delimiter
pub const DELIMITER: char = '-';

/// Hex characters of the HMAC kept as checksum
pub const CHECKSUM_LEN: usize = 4;

/// Code validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodeError {
    /// Not four non-empty segments
    #[error("malformed ticket code: {reason}")]
    Malformed {
        /// What was wrong
        reason: String,
    },

    /// Prefix belongs to another namespace
    #[error("ticket code prefix {found:?} does not match {expected:?}")]
    WrongPrefix {
        /// Configured prefix
        expected: String,
        /// Prefix presented
        found: String,
    },

    /// Checksum does not match the body
    #[error("ticket code checksum mismatch")]
    Tampered,

    /// Prefix or secret rejected at construction
    #[error("invalid code configuration: {0}")]
    InvalidConfig(String),
}

/// Recomputes and checks code checksums.
///
/// Holds the shared secret; construct once per process and share.
#[derive(Clone)]
pub struct CodeVerifier {
    prefix: String,
    mac: HmacSha256,
}

impl fmt::Debug for CodeVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeVerifier")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl CodeVerifier {
    /// Creates a verifier for `prefix` keyed by `secret`.
    ///
    /// # Errors
    ///
    /// Returns [`CodeError::InvalidConfig`] if the prefix is empty or not
    /// alphanumeric, or if the secret is empty.
    pub fn new(prefix: &str, secret: &[u8]) -> Result<Self, CodeError> {
        let prefix = prefix.trim().to_ascii_uppercase();
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CodeError::InvalidConfig(format!(
                "prefix must be non-empty ASCII alphanumeric, got {prefix:?}"
            )));
        }
        if secret.is_empty() {
            return Err(CodeError::InvalidConfig("secret must not be empty".to_string()));
        }
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| CodeError::InvalidConfig(e.to_string()))?;

        Ok(Self { prefix, mac })
    }

    /// Configured prefix
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Checksum over a code body (`PREFIX-TIMESTAMP-RANDOM`)
    #[must_use]
    pub fn checksum(&self, body: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(body.as_bytes());
        let digest = hex::encode_upper(mac.finalize().into_bytes());
        digest[..CHECKSUM_LEN].to_string()
    }

    /// Assembles a code from its timestamp and random segments
    #[must_use]
    pub fn seal(&self, timestamp: &str, random: &str) -> String {
        let body = format!("{}{DELIMITER}{timestamp}{DELIMITER}{random}", self.prefix);
        let checksum = self.checksum(&body);
        format!("{body}{DELIMITER}{checksum}")
    }

    /// Verifies a code and returns its normalized form.
    ///
    /// Input is trimmed and uppercased first, so hand-typed codes are accepted
    /// regardless of case.
    ///
    /// # Errors
    ///
    /// - [`CodeError::Malformed`] unless there are exactly four non-empty segments
    /// - [`CodeError::WrongPrefix`] if the prefix differs from the configured one
    /// - [`CodeError::Tampered`] if the checksum does not match
    pub fn verify(&self, code: &str) -> Result<String, CodeError> {
        let normalized = normalize(code);
        let segments: Vec<&str> = normalized.split(DELIMITER).collect();

        let [prefix, timestamp, random, checksum] = segments.as_slice() else {
            return Err(CodeError::Malformed {
                reason: format!("expected 4 segments, found {}", segments.len()),
            });
        };
        if segments.iter().any(|s| s.is_empty()) {
            return Err(CodeError::Malformed {
                reason: "empty segment".to_string(),
            });
        }
        if *prefix != self.prefix {
            return Err(CodeError::WrongPrefix {
                expected: self.prefix.clone(),
                found: (*prefix).to_string(),
            });
        }

        let body = format!("{prefix}{DELIMITER}{timestamp}{DELIMITER}{random}");
        let expected = self.checksum(&body);
        if !constant_time_eq(expected.as_bytes(), checksum.as_bytes()) {
            return Err(CodeError::Tampered);
        }

        Ok(normalized)
    }
}

/// Mints new ticket codes
#[derive(Clone)]
pub struct CodeGenerator {
    verifier: CodeVerifier,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for CodeGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeGenerator")
            .field("verifier", &self.verifier)
            .finish_non_exhaustive()
    }
}

impl CodeGenerator {
    /// Creates a generator sharing `verifier`'s prefix and secret
    #[must_use]
    pub fn new(verifier: CodeVerifier, clock: Arc<dyn Clock>) -> Self {
        Self { verifier, clock }
    }

    /// Verifier for codes produced by this generator
    #[must_use]
    pub const fn verifier(&self) -> &CodeVerifier {
        &self.verifier
    }

    /// Generates a fresh code. Pure; does not touch storage.
    #[must_use]
    pub fn generate(&self) -> String {
        let millis = u64::try_from(self.clock.now().timestamp_millis()).unwrap_or(0);
        let mut random = [0u8; 4];
        OsRng.fill_bytes(&mut random);

        self.verifier
            .seal(&to_base36(millis), &hex::encode_upper(random))
    }
}

/// Trims and uppercases a presented code
#[must_use]
pub fn normalize(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Uppercase base-36 rendering of `n`
#[must_use]
pub fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::with_capacity(13);
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
