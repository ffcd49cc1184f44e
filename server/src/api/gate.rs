//! Gate scanning.
//!
//! - POST /api/gate/scan - adjudicate one scan (admin session)
//!
//! Every adjudicated scan answers 200 with its outcome tag, including
//! rejections. Only an unreachable store is an error response.

use crate::auth::AdminSession;
use crate::error::AppError;
use crate::server::state::AppState;
use axum::{Json, extract::State};
use gatepass_core::gate::{ScanReport, ScanRequest};
use serde::Deserialize;

/// Scan request from a gate device
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanBody {
    /// Scanned QR text or typed code
    pub input: String,
    /// Gate name
    pub gate: String,
}

/// Adjudicates a scan
pub async fn scan(
    State(state): State<AppState>,
    AdminSession(session): AdminSession,
    Json(body): Json<ScanBody>,
) -> Result<Json<ScanReport>, AppError> {
    let report = state
        .gate
        .scan(ScanRequest {
            input: body.input,
            gate: body.gate,
        })
        .await?;
    tracing::debug!(session = %session.sid, outcome = %report.outcome, "Scan answered");
    Ok(Json(report))
}
