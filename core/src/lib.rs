//! # Gatepass Core
//!
//! Ticket issuance and gate admission for a single live event.
//!
//! This crate owns the parts of the system where correctness matters:
//!
//! - **Code generation**: unique, HMAC-checksummed ticket codes ([`codes`])
//! - **QR payloads**: versioned, event-scoped payloads verified without a
//!   storage round trip ([`payload`])
//! - **Inventory ledger**: atomic check-and-increment of sold units per tier,
//!   with a separate cap for cash sales at the gate ([`inventory`])
//! - **Order lifecycle**: payment confirmation is the only path to minted
//!   tickets ([`orders`])
//! - **Gate scanning**: a ticket moves from `pending` to `scanned` exactly once
//!   ([`gate`])
//!
//! # Architecture
//!
//! ```text
//!  payment verified ──► OrderService ──► OrderStore::complete_order ─┐
//!                           │                (claim + ledger commit  │
//!                           │                 + insert tickets)      │
//!                           ▼                                        ▼
//!                     CodeGenerator ──► PayloadCodec ──► QR image   tickets
//!
//!  gate scan ──► PayloadCodec::decode ──► GateStore::scan_target
//!                                             │
//!                                   adjudicate (pure)
//!                                             │
//!                               GateStore::admit (conditional update)
//! ```
//!
//! Storage is an injected collaborator ([`store`]). Every shared counter and
//! every scan status is mutated only through the store's atomic operations,
//! never read-modify-write in this crate.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codes;
pub mod environment;
pub mod gate;
pub mod inventory;
pub mod orders;
pub mod payload;
pub mod pricing;
pub mod reports;
pub mod store;
pub mod types;

pub use codes::{CodeError, CodeGenerator, CodeVerifier};
pub use environment::{Clock, SystemClock};
pub use gate::{GateError, GateScanner, ScanOutcome, ScanReport, ScanRequest};
pub use inventory::{InventoryLedger, LedgerError};
pub use orders::{OrderError, OrderService, PaymentConfirmation};
pub use payload::{PayloadCodec, PayloadError, TicketPayload};
pub use store::{GateStore, InventoryStore, OrderStore, ReportStore, StoreError};
pub use types::*;
