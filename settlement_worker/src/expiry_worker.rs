use std::sync::Arc;

use chrono::Duration;
use log::*;
use settlement_engine::db_types::InvoiceId;
use tokio::task::JoinHandle;

use crate::WorkerApi;

const MIN_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_millis(10);

/// Starts the expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// The first sweep runs immediately. A failed sweep is logged and retried on the next tick.
pub fn start_expiry_worker(api: Arc<WorkerApi>, interval: Duration) -> JoinHandle<()> {
    let period = interval.to_std().map(|d| d.max(MIN_SWEEP_INTERVAL)).unwrap_or(MIN_SWEEP_INTERVAL);
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        info!("🕰️ Invoice expiry worker started. Sweeping every {}s", period.as_secs_f64());
        loop {
            timer.tick().await;
            trace!("🕰️ Running invoice expiry sweep");
            match api.sweep_expired().await {
                Ok(result) => {
                    if !result.expired.is_empty() {
                        info!("🕰️ {} invoices expired: {}", result.expired.len(), invoice_list(&result.expired));
                    }
                    if !result.skipped.is_empty() {
                        debug!(
                            "🕰️ {} overdue invoices are still awaiting payment: {}",
                            result.skipped.len(),
                            invoice_list(&result.skipped)
                        );
                    }
                    for (id, e) in &result.failed {
                        warn!("🕰️ Invoice {id} could not be expired. {e}");
                    }
                },
                Err(e) => {
                    error!("🕰️ Error running invoice expiry sweep: {e}");
                },
            }
        }
    })
}

fn invoice_list(ids: &[InvoiceId]) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<String>>().join(", ")
}
