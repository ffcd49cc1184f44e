//! QR payload encoding and verification.
//!
//! A payload is compact JSON with a fixed key set:
//!
//! ```json
//! {"code":"IAF-MA1B2C3D-9F04C2E1-7A3B","order":"IAF-2026-0001","type":"Bronze","name":"Ada","event":"IAF2026","date":"2026-04-18","qty":1,"v":1}
//! ```
//!
//! Decoding checks structure, then event scope, then code integrity, and
//! never touches storage. Whether the code was actually issued is decided by
//! [`crate::gate`].

use crate::codes::{CodeError, CodeVerifier};
use crate::types::{OrderNumber, TierKind};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use qrcode::render::svg;
use qrcode::{EcLevel, QrCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current payload schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Minimum rendered QR edge in pixels
pub const QR_DIMENSION: u32 = 300;

const fn one() -> u32 {
    1
}

/// Identity of one ticket as carried in its QR code
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketPayload {
    /// Ticket code
    pub code: String,
    /// Owning order number
    pub order: String,
    /// Tier display name
    #[serde(rename = "type", default)]
    pub tier: String,
    /// Buyer display name
    #[serde(default)]
    pub name: String,
    /// Event tag
    pub event: String,
    /// Event date
    #[serde(default)]
    pub date: String,
    /// People admitted by this code
    #[serde(default = "one")]
    pub qty: u32,
    /// Schema version
    #[serde(default = "one")]
    pub v: u32,
}

/// Payload decoding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    /// Not JSON, missing required fields, or an unknown schema version
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Payload belongs to another event
    #[error("payload is for event {found:?}, expected {expected:?}")]
    WrongEvent {
        /// Configured event tag
        expected: String,
        /// Tag presented
        found: String,
    },

    /// Code prefix belongs to another namespace
    #[error("code prefix {found:?} does not match {expected:?}")]
    WrongPrefix {
        /// Configured prefix
        expected: String,
        /// Prefix presented
        found: String,
    },

    /// Code fails its integrity check
    #[error("ticket code failed integrity check")]
    TamperedCode,

    /// QR rendering failed
    #[error("failed to render QR code: {0}")]
    Render(String),
}

impl From<CodeError> for PayloadError {
    fn from(err: CodeError) -> Self {
        match err {
            CodeError::WrongPrefix { expected, found } => Self::WrongPrefix { expected, found },
            CodeError::Malformed { .. } | CodeError::Tampered | CodeError::InvalidConfig(_) => {
                Self::TamperedCode
            },
        }
    }
}

/// Encodes and verifies ticket payloads for one event
#[derive(Clone, Debug)]
pub struct PayloadCodec {
    event_tag: String,
    event_date: String,
    verifier: CodeVerifier,
}

impl PayloadCodec {
    /// Creates a codec scoped to `event_tag`
    #[must_use]
    pub fn new(
        event_tag: impl Into<String>,
        event_date: impl Into<String>,
        verifier: CodeVerifier,
    ) -> Self {
        Self {
            event_tag: event_tag.into(),
            event_date: event_date.into(),
            verifier,
        }
    }

    /// Event tag embedded in every payload
    #[must_use]
    pub fn event_tag(&self) -> &str {
        &self.event_tag
    }

    /// Code verifier used for step 3
    #[must_use]
    pub const fn verifier(&self) -> &CodeVerifier {
        &self.verifier
    }

    /// Builds the payload for one individual ticket
    #[must_use]
    pub fn payload(
        &self,
        code: &str,
        order: &OrderNumber,
        tier: TierKind,
        name: &str,
    ) -> TicketPayload {
        TicketPayload {
            code: code.to_string(),
            order: order.as_str().to_string(),
            tier: tier.display_name().to_string(),
            name: name.to_string(),
            event: self.event_tag.clone(),
            date: self.event_date.clone(),
            qty: 1,
            v: SCHEMA_VERSION,
        }
    }

    /// Serializes a payload to its compact text form
    #[must_use]
    pub fn encode(&self, payload: &TicketPayload) -> String {
        // Plain struct of strings and integers; serialization cannot fail.
        serde_json::to_string(payload).unwrap_or_default()
    }

    /// Decodes and verifies scanned text.
    ///
    /// On success the returned payload carries the normalized code.
    ///
    /// # Errors
    ///
    /// Checks run in order and stop at the first failure:
    /// [`PayloadError::MalformedPayload`], [`PayloadError::WrongEvent`],
    /// then [`PayloadError::WrongPrefix`] or [`PayloadError::TamperedCode`].
    pub fn decode(&self, raw: &str) -> Result<TicketPayload, PayloadError> {
        let mut payload: TicketPayload = serde_json::from_str(raw.trim())
            .map_err(|e| PayloadError::MalformedPayload(e.to_string()))?;

        if payload.code.trim().is_empty() || payload.order.trim().is_empty() {
            return Err(PayloadError::MalformedPayload(
                "code and order must not be empty".to_string(),
            ));
        }
        if payload.v != SCHEMA_VERSION {
            return Err(PayloadError::MalformedPayload(format!(
                "unsupported schema version {}",
                payload.v
            )));
        }

        if payload.event != self.event_tag {
            return Err(PayloadError::WrongEvent {
                expected: self.event_tag.clone(),
                found: payload.event,
            });
        }

        payload.code = self.verifier.verify(&payload.code)?;
        payload.order = payload.order.trim().to_string();
        Ok(payload)
    }
}

/// Renders `text` as a black-on-white SVG QR code.
///
/// Error correction level H, at least [`QR_DIMENSION`] pixels square, with
/// a quiet-zone margin.
///
/// # Errors
///
/// Returns [`PayloadError::Render`] if the text exceeds QR capacity.
pub fn render_svg(text: &str) -> Result<String, PayloadError> {
    let code = QrCode::with_error_correction_level(text.as_bytes(), EcLevel::H)
        .map_err(|e| PayloadError::Render(e.to_string()))?;

    Ok(code
        .render::<svg::Color<'_>>()
        .min_dimensions(QR_DIMENSION, QR_DIMENSION)
        .quiet_zone(true)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build())
}

/// Renders `text` as a `data:image/svg+xml;base64,...` URL
///
/// # Errors
///
/// Returns [`PayloadError::Render`] if the text exceeds QR capacity.
pub fn render_data_url(text: &str) -> Result<String, PayloadError> {
    let svg = render_svg(text)?;
    Ok(format!("data:image/svg+xml;base64,{}", STANDARD.encode(svg)))
}
