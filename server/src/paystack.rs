//! Paystack webhook verification.
//!
//! Paystack signs each webhook body with HMAC-SHA512 keyed by the merchant
//! secret key and sends the hex digest in `x-paystack-signature`. Only
//! `charge.success` events confirm payments.

use constant_time_eq::constant_time_eq;
use gatepass_core::orders::PaymentConfirmation;
use gatepass_core::types::{Money, OrderNumber};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha512;

/// Signature header name
pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

/// Event that confirms a payment
pub const CHARGE_SUCCESS: &str = "charge.success";

type HmacSha512 = Hmac<Sha512>;

/// Verifies webhook signatures
pub struct WebhookVerifier {
    secret: Vec<u8>,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier").finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    /// Creates a verifier for `secret`
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self {
            secret: secret.to_vec(),
        }
    }

    /// Hex signature of `body`
    #[must_use]
    pub fn sign(&self, body: &[u8]) -> String {
        let Ok(mut mac) = HmacSha512::new_from_slice(&self.secret) else {
            return String::new();
        };
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Whether `signature` is the signature of `body`; compared in constant time
    #[must_use]
    pub fn verify(&self, body: &[u8], signature: &str) -> bool {
        let expected = self.sign(body);
        !expected.is_empty()
            && constant_time_eq(
                expected.as_bytes(),
                signature.trim().to_ascii_lowercase().as_bytes(),
            )
    }
}

/// Webhook envelope
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Event name, e.g. `charge.success`
    pub event: String,
    /// Event payload; only charge events carry the fields below
    #[serde(default)]
    pub data: ChargeData,
}

/// The fields of a charge used here; Paystack sends many more
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChargeData {
    /// Paystack transaction id
    #[serde(default)]
    pub id: Option<u64>,
    /// Merchant reference, the order number
    #[serde(default)]
    pub reference: Option<String>,
    /// Amount in kobo
    #[serde(default)]
    pub amount: Option<u64>,
    /// Charge status
    #[serde(default)]
    pub status: Option<String>,
}

impl WebhookEvent {
    /// Whether this event confirms a payment
    #[must_use]
    pub fn is_charge_success(&self) -> bool {
        self.event == CHARGE_SUCCESS
    }

    /// The payment confirmation, for `charge.success` events carrying a
    /// reference and an amount
    #[must_use]
    pub fn confirmation(&self) -> Option<PaymentConfirmation> {
        if !self.is_charge_success() {
            return None;
        }
        let reference = self.data.reference.as_deref()?.trim();
        let amount = self.data.amount?;
        let provider_reference = self
            .data
            .id
            .map_or_else(|| reference.to_string(), |id| id.to_string());
        Some(PaymentConfirmation {
            reference: OrderNumber::from_raw(reference),
            provider_reference,
            amount: Money::from_kobo(amount),
        })
    }
}
