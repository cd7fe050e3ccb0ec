use rust_decimal::Decimal;
use settlement_common::{Currency, Money, MoneyError};
use thiserror::Error;

use crate::{
    db_types::{InvoiceId, InvoiceStatusType},
    fsm::{PaymentTransitionError, TransitionError},
    traits::{ExchangeRateError, PaymentAddressError, RepositoryError},
};

/// Malformed input. Always raised before anything is mutated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("An invoice needs at least one item")]
    NoItems,
    #[error("The invoice title cannot be empty")]
    EmptyTitle,
    #[error("The invoice title is {0} characters long, which exceeds the limit")]
    TitleTooLong(usize),
    #[error("The invoice description is {0} characters long, which exceeds the limit")]
    DescriptionTooLong(usize),
    #[error("Item names cannot be empty")]
    EmptyItemName,
    #[error("The item name is {0} characters long, which exceeds the limit")]
    ItemNameTooLong(usize),
    #[error("The item description is {0} characters long, which exceeds the limit")]
    ItemDescriptionTooLong(usize),
    #[error("Item quantities must be positive. Got {0}")]
    InvalidQuantity(Decimal),
    #[error("Tax cannot be negative. Got {0}")]
    NegativeTax(Decimal),
    #[error("Invoices must be priced in a fiat currency, not {0}")]
    NotFiat(Currency),
    #[error("Invoices must be paid in a cryptocurrency, not {0}")]
    NotCrypto(Currency),
    #[error("Pricing does not add up: {subtotal} + {tax} != {total}")]
    PricingMismatch { subtotal: Money, tax: Money, total: Money },
    #[error("The underpayment tolerance must be a fraction between 0 and 1. Got {0}")]
    InvalidTolerance(Decimal),
    #[error("Durations must be positive")]
    NonPositiveDuration,
    #[error("The expiry window reaches past the latest representable date")]
    DurationOutOfRange,
    #[error("The exchange rate has already expired: {0}")]
    ExchangeRateExpired(String),
    #[error("The payment address has already expired: {0}")]
    PaymentAddressExpired(String),
    #[error("The exchange rate {rate} does not convert {from} to {to}")]
    RateMismatch { rate: String, from: Currency, to: Currency },
    #[error("The payment address is for {found}, but the invoice is paid in {expected}")]
    AddressCurrencyMismatch { expected: Currency, found: Currency },
    #[error("Payment amounts must be positive")]
    ZeroPayment,
    #[error("Invalid amount. {0}")]
    Money(#[from] MoneyError),
}

/// Errors at the settlement orchestrator boundary.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    Transition(#[from] TransitionError),
    #[error("{0}")]
    PaymentTransition(#[from] PaymentTransitionError),
    #[error("Underpayment rejected. Received {received} of {required}; the shortfall of {shortfall} exceeds the tolerance of {threshold}")]
    Underpayment { received: Money, required: Money, shortfall: Money, threshold: Money },
    #[error("Monetary error. {0}")]
    Money(#[from] MoneyError),
    #[error("{0}")]
    Repository(#[from] RepositoryError),
    #[error("{0}")]
    ExchangeRate(#[from] ExchangeRateError),
    #[error("{0}")]
    PaymentAddress(#[from] PaymentAddressError),
    #[error("Invoice {invoice_id} has no payment with transaction hash {tx_hash}")]
    PaymentNotFound { invoice_id: InvoiceId, tx_hash: String },
    #[error("There is no single transition from {from} to {to}")]
    NoDirectTransition { from: InvoiceStatusType, to: InvoiceStatusType },
    #[error("Invoice {0} can no longer be changed, since it is {1}")]
    InvoiceClosed(InvoiceId, InvoiceStatusType),
}

impl SettlementError {
    /// True for errors that mean "the invoice does not exist", as opposed to a storage failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Repository(e) if e.is_not_found())
    }
}
