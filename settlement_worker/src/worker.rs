use std::sync::Arc;

use log::*;
use settlement_engine::{events::EventProducers, SettlementFlowApi, SqliteDatabase};
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::{
    config::WorkerConfig,
    errors::WorkerError,
    expiry_worker::start_expiry_worker,
    helpers::{create_address_provider, create_exchange_rates, create_logging_event_handlers},
    WorkerApi,
};

/// Runs the worker until Ctrl-C is received.
pub async fn run_worker(config: WorkerConfig) -> Result<(), WorkerError> {
    let db = open_database(&config.database_url, config.max_connections).await?;
    let producers = if config.log_events {
        let handlers = create_logging_event_handlers(config.event_buffer_size);
        let producers = handlers.producers();
        handlers.start_handlers().await;
        producers
    } else {
        info!("🪛️ Event logging is disabled");
        EventProducers::default()
    };
    let api = Arc::new(create_worker_api(&config, db, producers)?);
    let sweeper = start_expiry_worker(Arc::clone(&api), config.sweep_interval);
    info!("🚀️ Settlement worker is running. Press Ctrl-C to stop.");
    tokio::signal::ctrl_c().await?;
    info!("🚀️ Shutting down");
    sweeper.abort();
    api.db().pool().close().await;
    Ok(())
}

/// Connects to the invoice store, creating it if necessary, and brings its schema up to date.
pub async fn open_database(url: &str, max_connections: u32) -> Result<SqliteDatabase, WorkerError> {
    if !Sqlite::database_exists(url).await? {
        info!("🗃️ Creating a new invoice store at {url}");
        Sqlite::create_database(url).await?;
    }
    let db = SqliteDatabase::new_with_url(url, max_connections)
        .await
        .map_err(|e| WorkerError::InitializeError(format!("Could not connect to {url}. {e}")))?;
    db.migrate().await?;
    Ok(db)
}

pub fn create_worker_api(
    config: &WorkerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<WorkerApi, WorkerError> {
    let rates = create_exchange_rates(config)?;
    let addresses = create_address_provider(config);
    let api = SettlementFlowApi::new(db, rates, addresses, producers).with_defaults(config.invoice_defaults.clone());
    Ok(api)
}
