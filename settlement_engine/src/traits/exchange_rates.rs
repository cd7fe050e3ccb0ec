use rust_decimal::Decimal;
use settlement_common::Currency;
use thiserror::Error;

use crate::settlement_api::exchange_objects::ExchangeRate;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExchangeRateError {
    #[error("The requested exchange rate does not exist: {from}/{to}")]
    RateDoesNotExist { from: Currency, to: Currency },
    #[error("Exchange rates must be positive. Got {rate} for {from}/{to}")]
    InvalidRate { from: Currency, to: Currency, rate: Decimal },
    #[error("Exchange rate provider error: {0}")]
    ProviderError(String),
}

#[allow(async_fn_in_trait)]
pub trait ExchangeRateProvider {
    /// Fetch the current rate for converting `from` into `to`. If the provider does not quote the pair, the error
    /// [`ExchangeRateError::RateDoesNotExist`] is returned.
    async fn fetch_rate(&self, from: Currency, to: Currency) -> Result<ExchangeRate, ExchangeRateError>;
}
