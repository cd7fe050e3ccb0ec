use std::{cmp::Ordering, fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use settlement_common::{Currency, Money, MoneyError};

use crate::{
    db_types::ConversionError,
    settlement_api::{errors::ValidationError, exchange_objects::ExchangeRate},
};

//--------------------------------------   OverpaymentAction   ---------------------------------------------------------
/// What the surrounding system should do with money received beyond the overpayment threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverpaymentAction {
    Credit,
    Refund,
    Donate,
}

impl Display for OverpaymentAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Credit => write!(f, "credit"),
            Self::Refund => write!(f, "refund"),
            Self::Donate => write!(f, "donate"),
        }
    }
}

impl FromStr for OverpaymentAction {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "credit" => Ok(Self::Credit),
            "refund" => Ok(Self::Refund),
            "donate" => Ok(Self::Donate),
            _ => Err(ConversionError::new("overpayment action", s)),
        }
    }
}

//--------------------------------------   PaymentTolerance    ---------------------------------------------------------
/// The slack allowed between the required and the received amount.
///
/// * `underpayment_threshold` is a fraction of the required amount. A shortfall up to and including this fraction is
///   accepted as a partial payment; anything larger is rejected.
/// * `overpayment_threshold` is a flat amount. Excess above it flags `overpayment_action`, but never blocks
///   acceptance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTolerance {
    pub underpayment_threshold: Decimal,
    pub overpayment_threshold: Money,
    pub overpayment_action: OverpaymentAction,
}

impl Default for PaymentTolerance {
    fn default() -> Self {
        Self {
            underpayment_threshold: Decimal::new(1, 2),
            overpayment_threshold: Money::whole(1, Currency::Usd),
            overpayment_action: OverpaymentAction::Credit,
        }
    }
}

/// The verdict on a received amount.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentClassification {
    /// At least the required amount was received. `overpayment_action` is set when the excess exceeds the
    /// overpayment threshold.
    Sufficient { excess: Money, overpayment_action: Option<OverpaymentAction> },
    /// Short, but within the underpayment tolerance.
    Partial { shortfall: Money },
    /// Short by more than the underpayment tolerance. The payment must be rejected.
    Underpayment { shortfall: Money, threshold: Money },
}

impl PaymentClassification {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::Underpayment { .. })
    }

    pub fn is_sufficient(&self) -> bool {
        matches!(self, Self::Sufficient { .. })
    }
}

impl Display for PaymentClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sufficient { excess, overpayment_action: Some(action) } => {
                write!(f, "sufficient (overpaid by {excess}, action: {action})")
            },
            Self::Sufficient { .. } => write!(f, "sufficient"),
            Self::Partial { shortfall } => write!(f, "partial (short by {shortfall})"),
            Self::Underpayment { shortfall, threshold } => {
                write!(f, "underpayment (short by {shortfall}, tolerance {threshold})")
            },
        }
    }
}

impl PaymentTolerance {
    pub fn new(
        underpayment_threshold: Decimal,
        overpayment_threshold: Money,
        overpayment_action: OverpaymentAction,
    ) -> Result<Self, ValidationError> {
        let tolerance = Self { underpayment_threshold, overpayment_threshold, overpayment_action };
        tolerance.validate()?;
        Ok(tolerance)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.underpayment_threshold < Decimal::ZERO || self.underpayment_threshold > Decimal::ONE {
            return Err(ValidationError::InvalidTolerance(self.underpayment_threshold));
        }
        Ok(())
    }

    /// Classifies `received` against `required`.
    ///
    /// Both amounts must be in the same currency. The overpayment threshold is converted with `rate` when it is not
    /// already expressed in that currency. Comparisons are made on unrounded values.
    pub fn classify(
        &self,
        required: &Money,
        received: &Money,
        rate: &ExchangeRate,
    ) -> Result<PaymentClassification, MoneyError> {
        match received.compare(required)? {
            Ordering::Less => {
                let shortfall = required.checked_sub(received)?;
                let threshold = Money::new(required.amount() * self.underpayment_threshold, required.currency())?;
                if shortfall.amount() > threshold.amount() {
                    Ok(PaymentClassification::Underpayment { shortfall, threshold })
                } else {
                    Ok(PaymentClassification::Partial { shortfall })
                }
            },
            Ordering::Equal | Ordering::Greater => {
                let excess = received.checked_sub(required)?;
                let threshold = self.overpayment_threshold_in(required.currency(), rate)?;
                let overpayment_action =
                    if excess.amount() > threshold.amount() { Some(self.overpayment_action) } else { None };
                Ok(PaymentClassification::Sufficient { excess, overpayment_action })
            },
        }
    }

    fn overpayment_threshold_in(&self, currency: Currency, rate: &ExchangeRate) -> Result<Money, MoneyError> {
        if self.overpayment_threshold.currency() == currency {
            return Ok(self.overpayment_threshold);
        }
        if rate.to != currency {
            return Err(MoneyError::CurrencyMismatch { expected: currency, found: rate.to });
        }
        rate.convert(&self.overpayment_threshold)
    }
}

//--------------------------------------    PaymentAddress     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAddress {
    pub address: String,
    pub network: String,
    pub currency: Currency,
    pub expires_at: DateTime<Utc>,
}

impl PaymentAddress {
    pub fn new<S: Into<String>>(address: S, network: S, currency: Currency, expires_at: DateTime<Utc>) -> Self {
        Self { address: address.into(), network: network.into(), currency, expires_at }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

impl Display for PaymentAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.address, self.network)
    }
}

//--------------------------------------      NewPayment       ---------------------------------------------------------
/// A payment-detection signal: a transfer to an invoice's payment address, as seen on chain.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub tx_hash: String,
    pub amount: Money,
    pub from_address: String,
    pub to_address: String,
    pub confirmations: u32,
}

impl NewPayment {
    pub fn new<S: Into<String>>(tx_hash: S, amount: Money, from_address: S, to_address: S) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            amount,
            from_address: from_address.into(),
            to_address: to_address.into(),
            confirmations: 0,
        }
    }

    pub fn with_confirmations(mut self, confirmations: u32) -> Self {
        self.confirmations = confirmations;
        self
    }
}
