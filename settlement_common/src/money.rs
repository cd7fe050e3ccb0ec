use std::{cmp::Ordering, fmt::Display, str::FromStr};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Currency;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("Monetary amounts cannot be negative: {0}")]
    NegativeAmount(Decimal),
    #[error("Currency mismatch. Expected {expected}, but got {found}")]
    CurrencyMismatch { expected: Currency, found: Currency },
    #[error("Not a valid decimal amount: {0}")]
    InvalidAmount(String),
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),
    #[error("Arithmetic overflow in {0}")]
    Overflow(&'static str),
}

//--------------------------------------         Money         ---------------------------------------------------------
/// An exact, non-negative amount of a given currency.
///
/// Amounts are stored unrounded. Results of [`Money::checked_add`], [`Money::checked_sub`] and [`Money::multiply`]
/// are rounded half-up to [`Currency::decimal_places`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "UncheckedMoney")]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

#[derive(Deserialize)]
struct UncheckedMoney {
    amount: Decimal,
    currency: Currency,
}

impl TryFrom<UncheckedMoney> for Money {
    type Error = MoneyError;

    fn try_from(value: UncheckedMoney) -> Result<Self, Self::Error> {
        Money::new(value.amount, value.currency)
    }
}

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::NegativeAmount(amount));
        }
        Ok(Self { amount, currency })
    }

    /// Parses a decimal string such as `"10.50"`. Floating point is never involved.
    pub fn parse(amount: &str, currency: Currency) -> Result<Self, MoneyError> {
        let amount = Decimal::from_str(amount.trim()).map_err(|e| MoneyError::InvalidAmount(format!("{amount}: {e}")))?;
        Self::new(amount, currency)
    }

    pub fn zero(currency: Currency) -> Self {
        Self { amount: Decimal::ZERO, currency }
    }

    /// A whole number of currency units. Infallible, since `units` cannot be negative.
    pub fn whole(units: u64, currency: Currency) -> Self {
        Self { amount: Decimal::from(units), currency }
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Returns a copy rounded half-up to the currency's decimal places.
    pub fn rounded(&self) -> Self {
        Self { amount: round_half_up(self.amount, self.currency), currency: self.currency }
    }

    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        let sum = self.amount.checked_add(other.amount).ok_or(MoneyError::Overflow("add"))?;
        Money::new(round_half_up(sum, self.currency), self.currency)
    }

    /// Subtracts `other`. A result below zero is rejected with [`MoneyError::NegativeAmount`].
    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        let diff = self.amount.checked_sub(other.amount).ok_or(MoneyError::Overflow("sub"))?;
        Money::new(round_half_up(diff, self.currency), self.currency)
    }

    pub fn multiply(&self, factor: Decimal) -> Result<Money, MoneyError> {
        let product = self.amount.checked_mul(factor).ok_or(MoneyError::Overflow("multiply"))?;
        Money::new(round_half_up(product, self.currency), self.currency)
    }

    /// Compares two amounts without rounding. Differing currencies are an error rather than an ordering.
    pub fn compare(&self, other: &Money) -> Result<Ordering, MoneyError> {
        self.ensure_same_currency(other)?;
        Ok(self.amount.cmp(&other.amount))
    }

    /// Adds up an iterator of amounts that must all be in `currency`.
    pub fn sum<'a, I>(currency: Currency, values: I) -> Result<Money, MoneyError>
    where I: IntoIterator<Item = &'a Money> {
        values.into_iter().try_fold(Money::zero(currency), |acc, m| acc.checked_add(m))
    }

    /// The amount fixed to the currency's decimal places, e.g. `"150.00"`.
    pub fn to_fixed_string(&self) -> String {
        let places = self.currency.decimal_places() as usize;
        format!("{:.*}", places, round_half_up(self.amount, self.currency))
    }

    pub fn ensure_same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency == other.currency {
            Ok(())
        } else {
            Err(MoneyError::CurrencyMismatch { expected: self.currency, found: other.currency })
        }
    }
}

impl PartialOrd for Money {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(other).ok()
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.to_fixed_string(), self.currency)
    }
}

fn round_half_up(value: Decimal, currency: Currency) -> Decimal {
    value.round_dp_with_strategy(currency.decimal_places(), RoundingStrategy::MidpointAwayFromZero)
}
