use thiserror::Error;

use crate::events::SettlementEvent;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventBusError {
    #[error("The {0} event channel is full")]
    ChannelFull(String),
    #[error("The {0} event channel has closed")]
    ChannelClosed(String),
}

/// A best-effort sink for domain events.
///
/// `publish` must not wait. Delivery failures are reported, but callers treat them as non-fatal: by the time an event
/// is published, the state change it describes has already been persisted.
pub trait EventBus {
    fn publish(&self, event: SettlementEvent) -> Result<(), EventBusError>;
}
