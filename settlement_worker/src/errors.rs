use settlement_engine::ExchangeRateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Could not initialize the worker. {0}")]
    InitializeError(String),
    #[error("Could not load the exchange rate table. {0}")]
    ExchangeRateError(#[from] ExchangeRateError),
    #[error("An I/O error happened in the worker. {0}")]
    IOError(#[from] std::io::Error),
}

impl From<sqlx::Error> for WorkerError {
    fn from(e: sqlx::Error) -> Self {
        Self::InitializeError(format!("Database error: {e}"))
    }
}

impl From<sqlx::migrate::MigrateError> for WorkerError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        Self::InitializeError(format!("Database migration failed: {e}"))
    }
}
