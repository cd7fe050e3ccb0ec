use std::{collections::HashMap, str::FromStr};

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use settlement_common::Currency;

use crate::{
    settlement_api::exchange_objects::ExchangeRate,
    traits::{ExchangeRateError, ExchangeRateProvider},
};

/// Parses a rate table of the form `USD/BTC=0.000016,EUR/ETH=0.00031`.
pub fn parse_rate_table(table: &str) -> Result<Vec<(Currency, Currency, Decimal)>, ExchangeRateError> {
    table
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let bad = |why: &str| ExchangeRateError::ProviderError(format!("Invalid rate entry '{entry}': {why}"));
            let (pair, rate) = entry.split_once('=').ok_or_else(|| bad("expected PAIR=RATE"))?;
            let (from, to) = pair.split_once('/').ok_or_else(|| bad("expected FROM/TO"))?;
            let from = Currency::from_str(from).map_err(|e| bad(&e.to_string()))?;
            let to = Currency::from_str(to).map_err(|e| bad(&e.to_string()))?;
            let rate = Decimal::from_str(rate.trim()).map_err(|e| bad(&e.to_string()))?;
            if rate <= Decimal::ZERO {
                return Err(ExchangeRateError::InvalidRate { from, to, rate });
            }
            Ok((from, to, rate))
        })
        .collect()
}

/// A fixed table of exchange rates. Every quote is stamped with the time of the request and is good for `ttl`.
#[derive(Debug, Clone)]
pub struct StaticExchangeRates {
    rates: HashMap<(Currency, Currency), Decimal>,
    ttl: Duration,
}

impl StaticExchangeRates {
    pub fn new(ttl: Duration) -> Self {
        Self { rates: HashMap::new(), ttl }
    }

    pub fn from_table(table: &str, ttl: Duration) -> Result<Self, ExchangeRateError> {
        let rates = parse_rate_table(table)?.into_iter().map(|(from, to, rate)| ((from, to), rate)).collect();
        Ok(Self { rates, ttl })
    }

    pub fn with_rate(mut self, from: Currency, to: Currency, rate: Decimal) -> Self {
        self.rates.insert((from, to), rate);
        self
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&(Currency, Currency), &Decimal)> {
        self.rates.iter()
    }

    pub fn quote(&self, from: Currency, to: Currency) -> Result<ExchangeRate, ExchangeRateError> {
        let rate = self.rates.get(&(from, to)).ok_or(ExchangeRateError::RateDoesNotExist { from, to })?;
        ExchangeRate::new(from, to, *rate, "static", Utc::now(), self.ttl)
    }
}

impl ExchangeRateProvider for StaticExchangeRates {
    async fn fetch_rate(&self, from: Currency, to: Currency) -> Result<ExchangeRate, ExchangeRateError> {
        self.quote(from, to)
    }
}
