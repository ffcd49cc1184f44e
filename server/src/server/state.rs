//! Application state for the HTTP server.
//!
//! Holds the core services, all wired to one store, plus the secrets used by
//! the web layer. Cloned per request; every field is cheap to clone.

use crate::auth::SessionSigner;
use crate::config::{Config, ConfigError};
use crate::notify::TracingNotifier;
use crate::paystack::WebhookVerifier;
use gatepass_core::codes::{CodeGenerator, CodeVerifier};
use gatepass_core::environment::Clock;
use gatepass_core::gate::GateScanner;
use gatepass_core::inventory::InventoryLedger;
use gatepass_core::orders::{Notifier, OrderService, OrderSettings};
use gatepass_core::payload::PayloadCodec;
use gatepass_core::store::{GateStore, InventoryStore, OrderStore, ReportStore};
use std::sync::Arc;

/// Application state shared across all HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Tier capacity
    pub ledger: InventoryLedger,
    /// Order lifecycle
    pub orders: OrderService,
    /// Gate admission
    pub gate: GateScanner,
    /// Back-office aggregates
    pub reports: Arc<dyn ReportStore>,
    /// Ticket delivery after completion
    pub notifier: Arc<dyn Notifier>,
    /// Admin session tokens
    pub sessions: Arc<SessionSigner>,
    /// Payment webhook signatures
    pub webhooks: Arc<WebhookVerifier>,
    /// Time source shared with the services
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Wires every service to `store`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Unusable`] if the code prefix or secret is rejected.
    pub fn build<S>(config: &Config, store: Arc<S>, clock: Arc<dyn Clock>) -> Result<Self, ConfigError>
    where
        S: InventoryStore + OrderStore + GateStore + ReportStore + 'static,
    {
        let verifier = CodeVerifier::new(
            &config.event.code_prefix,
            config.secrets.ticket_code_secret.as_bytes(),
        )
        .map_err(|e| ConfigError::Unusable(e.to_string()))?;
        let payloads = PayloadCodec::new(&config.event.tag, &config.event.date, verifier.clone());
        let settings = OrderSettings {
            number_prefix: config.event.order_prefix.clone(),
            expiry: config.order_expiry(),
        };

        Ok(Self {
            ledger: InventoryLedger::new(store.clone(), clock.clone()),
            orders: OrderService::new(
                store.clone(),
                store.clone(),
                CodeGenerator::new(verifier, clock.clone()),
                payloads.clone(),
                clock.clone(),
                settings,
            ),
            gate: GateScanner::new(store.clone(), payloads, clock.clone()),
            reports: store,
            notifier: Arc::new(TracingNotifier),
            sessions: Arc::new(SessionSigner::new(
                config.secrets.session_secret.as_bytes(),
                config.secrets.admin_password.clone(),
                config.session_ttl(),
            )),
            webhooks: Arc::new(WebhookVerifier::new(
                config.secrets.paystack_secret_key.as_bytes(),
            )),
            clock,
        })
    }

    /// Replaces the ticket notifier
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }
}
