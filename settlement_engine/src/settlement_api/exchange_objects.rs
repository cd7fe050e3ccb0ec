use std::fmt::Display;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use settlement_common::{Currency, Money, MoneyError};

use crate::traits::ExchangeRateError;

/// A quoted conversion rate: one unit of `from` buys `rate` units of `to`.
///
/// Rates are only good until `expires_at`. An invoice locks in the rate that was current when it was created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub from: Currency,
    pub to: Currency,
    pub rate: Decimal,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ExchangeRate {
    /// Create a new ExchangeRate that is valid for `ttl` after `fetched_at`.
    ///
    /// The rate must be strictly positive.
    pub fn new<S: Into<String>>(
        from: Currency,
        to: Currency,
        rate: Decimal,
        source: S,
        fetched_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Self, ExchangeRateError> {
        if rate <= Decimal::ZERO {
            return Err(ExchangeRateError::InvalidRate { from, to, rate });
        }
        Ok(Self { from, to, rate, source: source.into(), fetched_at, expires_at: fetched_at + ttl })
    }

    /// A 1:1 rate, e.g. USD to a USD stablecoin.
    pub fn parity(from: Currency, to: Currency, fetched_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self { from, to, rate: Decimal::ONE, source: "parity".into(), fetched_at, expires_at: fetched_at + ttl }
    }

    /// Converts an amount in `from` into `to`, rounded to the target currency's decimal places.
    pub fn convert(&self, amount: &Money) -> Result<Money, MoneyError> {
        if amount.currency() != self.from {
            return Err(MoneyError::CurrencyMismatch { expected: self.from, found: amount.currency() });
        }
        let converted = amount.amount().checked_mul(self.rate).ok_or(MoneyError::Overflow("convert"))?;
        Ok(Money::new(converted, self.to)?.rounded())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

impl Display for ExchangeRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let one = Money::whole(1, self.from);
        match self.convert(&one) {
            Ok(converted) => write!(f, "1 {} => {converted}", self.from),
            Err(_) => write!(f, "1 {} => {} {}", self.from, self.rate, self.to),
        }
    }
}

#[cfg(test)]
mod test {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_exchange_rate() {
        let now = Utc::now();
        let ttl = Duration::minutes(5);
        // 1:1 exchange rate
        let rate = ExchangeRate::parity(Currency::Usd, Currency::Usdt, now, ttl);
        let five = Money::parse("5", Currency::Usd).unwrap();
        assert_eq!(rate.convert(&five).unwrap(), Money::parse("5.00", Currency::Usdt).unwrap());
        assert_eq!(format!("{rate}"), "1 USD => 1.00 USDT");

        // 62,500 USD/BTC
        let rate = ExchangeRate::new(Currency::Usd, Currency::Btc, dec!(0.000016), "test", now, ttl).unwrap();
        let total = Money::parse("150.00", Currency::Usd).unwrap();
        assert_eq!(rate.convert(&total).unwrap(), Money::parse("0.0024", Currency::Btc).unwrap());
        assert_eq!(format!("{rate}"), "1 USD => 0.00001600 BTC");

        // Conversions round half-up to the target currency
        let rate = ExchangeRate::new(Currency::Eur, Currency::Usdc, dec!(1.085), "test", now, ttl).unwrap();
        let amount = Money::parse("0.10", Currency::Eur).unwrap();
        assert_eq!(rate.convert(&amount).unwrap().amount(), dec!(0.11));
    }

    #[test]
    fn converting_the_wrong_currency_fails() {
        let rate = ExchangeRate::parity(Currency::Usd, Currency::Usdt, Utc::now(), Duration::minutes(5));
        let eur = Money::parse("5", Currency::Eur).unwrap();
        assert!(matches!(rate.convert(&eur), Err(MoneyError::CurrencyMismatch { .. })));
    }

    #[test]
    fn rates_must_be_positive() {
        let now = Utc::now();
        let err = ExchangeRate::new(Currency::Usd, Currency::Btc, dec!(0), "test", now, Duration::minutes(1));
        assert!(matches!(err, Err(ExchangeRateError::InvalidRate { .. })));
    }

    #[test]
    fn expiry() {
        let now = Utc::now();
        let rate = ExchangeRate::parity(Currency::Usd, Currency::Usdt, now, Duration::minutes(5));
        assert!(!rate.is_expired(now + Duration::minutes(5)));
        assert!(rate.is_expired(now + Duration::minutes(5) + Duration::seconds(1)));
    }
}
