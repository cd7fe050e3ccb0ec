use std::{future::Future, pin::Pin};

use log::*;
use settlement_engine::{
    events::{EventHandlers, EventHooks, SettlementEvent},
    helpers::{HashedAddressProvider, StaticExchangeRates},
};

use crate::{config::WorkerConfig, errors::WorkerError};

/// Event hooks that write every settlement event to the log. Status changes are logged at `info`, the creation
/// payload (which includes the deposit address) at `debug`.
pub fn create_logging_event_handlers(buffer_size: usize) -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks
        .on_invoice_created(|ev| {
            info!("📬️ {ev}");
            debug!("📬️ {}", ev.payload);
            no_op()
        })
        .on_status_changed(|ev| {
            info!("📬️ {ev}: {} -> {} ({})", ev.payload["from"], ev.payload["to"], ev.payload["trigger"]);
            no_op()
        })
        .on_invoice_cancelled(|ev| {
            info!("📬️ {ev}. Reason: {}", ev.payload["reason"]);
            no_op()
        })
        .on_invoice_expired(|ev: SettlementEvent| {
            info!("📬️ {ev}. Reason: {}", ev.payload["reason"]);
            no_op()
        });
    EventHandlers::new(buffer_size, hooks)
}

/// Loads the configured rate table. An empty table is allowed, but every invoice request will then be refused.
pub fn create_exchange_rates(config: &WorkerConfig) -> Result<StaticExchangeRates, WorkerError> {
    let rates = StaticExchangeRates::from_table(&config.exchange_rates, config.rate_ttl)?;
    let pairs = rates.pairs().map(|((from, to), rate)| format!("{from}/{to}={rate}")).collect::<Vec<_>>();
    if pairs.is_empty() {
        warn!("🪛️ The exchange rate table is empty.");
    } else {
        info!("🪛️ Exchange rates: {}", pairs.join(", "));
    }
    Ok(rates)
}

pub fn create_address_provider(config: &WorkerConfig) -> HashedAddressProvider {
    HashedAddressProvider::new(config.address_secret.clone(), config.address_ttl)
}

fn no_op() -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async {})
}
