//! Ticket delivery.

use async_trait::async_trait;
use gatepass_core::orders::{Notifier, NotifyError};
use gatepass_core::types::{Order, TicketCode};
use std::sync::Arc;

/// Logs issued tickets instead of emailing them.
///
/// Stands in until a mail provider is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn tickets_issued(
        &self,
        order: &Order,
        tickets: &[TicketCode],
    ) -> Result<(), NotifyError> {
        let Some(email) = order.buyer.email.as_deref() else {
            return Err(NotifyError(format!("order {} has no email", order.number)));
        };
        tracing::info!(
            order = %order.number,
            email,
            tickets = tickets.len(),
            "Tickets ready for delivery"
        );
        Ok(())
    }
}

/// Delivers tickets on a background task; failures are logged only
pub fn spawn_delivery(notifier: Arc<dyn Notifier>, order: Order, tickets: Vec<TicketCode>) {
    tokio::spawn(async move {
        if let Err(e) = notifier.tickets_issued(&order, &tickets).await {
            tracing::warn!(order = %order.number, error = %e, "Ticket delivery failed");
        }
    });
}
