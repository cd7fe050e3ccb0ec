//! # Settlement worker
//! This crate hosts the long-running process that drives the settlement engine. It is responsible for:
//! * Loading the configuration from the environment.
//! * Opening (and migrating) the SQLite invoice store.
//! * Wiring the engine to its exchange rate and deposit address providers.
//! * Logging the settlement events that the engine publishes.
//! * Periodically sweeping overdue invoices into the `Expired` state.
//!
//! The worker has no network surface. Invoices are created and paid by other processes sharing the same store, or
//! by code that embeds [`WorkerApi`] directly.
//!
//! ## Configuration
//! The worker is configured via `STL_*` environment variables. See [config](config/index.html) for more information.
use settlement_engine::{
    events::EventProducers,
    helpers::{HashedAddressProvider, StaticExchangeRates},
    SettlementFlowApi,
    SqliteDatabase,
};

pub mod cli;
pub mod config;
pub mod errors;
pub mod expiry_worker;
pub mod helpers;
pub mod worker;

/// The settlement engine as the worker runs it.
pub type WorkerApi = SettlementFlowApi<SqliteDatabase, StaticExchangeRates, HashedAddressProvider, EventProducers>;
