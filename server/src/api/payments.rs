//! Payment gateway callbacks.
//!
//! - POST /api/payments/webhook - Paystack events, signature-checked
//!
//! Business outcomes that a retry cannot change (unknown reference, short
//! payment, sold-out tier, closed order) are acknowledged with 200 so the
//! gateway stops retrying; they are logged for reconciliation. Store
//! failures answer 503 so the gateway retries.

use crate::error::AppError;
use crate::metrics::record_webhook;
use crate::notify::spawn_delivery;
use crate::paystack::{SIGNATURE_HEADER, WebhookEvent};
use crate::server::state::AppState;
use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use gatepass_core::orders::{Completion, OrderError};
use serde::Serialize;

/// Webhook acknowledgement
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    /// `completed`, `duplicate`, `ignored` or `rejected`
    pub status: &'static str,
    /// Order number, when the event referenced one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    /// Why the event was not applied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl WebhookAck {
    const fn ignored() -> Self {
        Self {
            status: "ignored",
            order: None,
            reason: None,
        }
    }
}

/// Receives a Paystack webhook
pub async fn paystack_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !state.webhooks.verify(&body, signature) {
        record_webhook("unauthorized");
        tracing::warn!("Webhook signature rejected");
        return Err(AppError::unauthorized("Invalid webhook signature"));
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::bad_request(format!("Unreadable webhook body: {e}")))?;
    let Some(confirmation) = event.confirmation() else {
        if event.is_charge_success() {
            record_webhook("malformed");
            return Err(AppError::bad_request(
                "charge.success event without reference or amount",
            ));
        }
        record_webhook("ignored");
        tracing::debug!(event = %event.event, "Webhook event ignored");
        return Ok(Json(WebhookAck::ignored()));
    };
    let number = confirmation.reference.as_str().to_string();

    match state.orders.confirm_payment(confirmation).await {
        Ok(Completion::Issued { order, tickets }) => {
            record_webhook("completed");
            spawn_delivery(state.notifier.clone(), order, tickets);
            Ok(Json(WebhookAck {
                status: "completed",
                order: Some(number),
                reason: None,
            }))
        },
        Ok(Completion::AlreadyCompleted { .. }) => {
            record_webhook("duplicate");
            Ok(Json(WebhookAck {
                status: "duplicate",
                order: Some(number),
                reason: None,
            }))
        },
        Err(
            e @ (OrderError::NotFound(_)
            | OrderError::AmountMismatch { .. }
            | OrderError::InvalidTransition { .. }
            | OrderError::Inventory { .. }),
        ) => {
            record_webhook("rejected");
            tracing::warn!(order = %number, error = %e, "Payment not applied");
            Ok(Json(WebhookAck {
                status: "rejected",
                order: Some(number),
                reason: Some(e.to_string()),
            }))
        },
        Err(e) => Err(e.into()),
    }
}
