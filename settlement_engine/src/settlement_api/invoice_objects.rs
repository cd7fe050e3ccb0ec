use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use settlement_common::{Currency, Money};

use crate::{
    db_types::{Invoice, InvoiceId, InvoiceStatusType},
    settlement_api::{
        errors::ValidationError,
        exchange_objects::ExchangeRate,
        payment_objects::{PaymentAddress, PaymentTolerance},
    },
};

pub const MAX_TITLE_LENGTH: usize = 255;
pub const MAX_DESCRIPTION_LENGTH: usize = 1000;
pub const DEFAULT_INVOICE_TTL: Duration = Duration::minutes(60);

//--------------------------------------      InvoiceItem      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub name: String,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Money,
    total: Money,
}

impl InvoiceItem {
    pub fn new<S: Into<String>>(
        name: S,
        description: S,
        quantity: Decimal,
        unit_price: Money,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        let description = description.into();
        check_item(&name, &description, quantity)?;
        let total = unit_price.multiply(quantity)?;
        Ok(Self { name, description, quantity, unit_price, total })
    }

    /// `unit_price * quantity`, fixed when the item was created.
    pub fn total(&self) -> Money {
        self.total
    }
}

fn check_item(name: &str, description: &str, quantity: Decimal) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyItemName);
    }
    let name_len = name.chars().count();
    if name_len > MAX_TITLE_LENGTH {
        return Err(ValidationError::ItemNameTooLong(name_len));
    }
    let desc_len = description.chars().count();
    if desc_len > MAX_DESCRIPTION_LENGTH {
        return Err(ValidationError::ItemDescriptionTooLong(desc_len));
    }
    if quantity <= Decimal::ZERO {
        return Err(ValidationError::InvalidQuantity(quantity));
    }
    Ok(())
}

//--------------------------------------    InvoicePricing     ---------------------------------------------------------
/// Subtotal, tax and total of an invoice, in the invoice's (fiat) currency. `total == subtotal + tax` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InvoicePricing {
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
}

impl InvoicePricing {
    pub fn new(subtotal: Money, tax: Money, total: Money) -> Result<Self, ValidationError> {
        subtotal.ensure_same_currency(&tax)?;
        subtotal.ensure_same_currency(&total)?;
        if subtotal.amount() + tax.amount() != total.amount() {
            return Err(ValidationError::PricingMismatch { subtotal, tax, total });
        }
        Ok(Self { subtotal, tax, total })
    }

    /// Sums the item totals and adds the (rounded) tax.
    pub fn from_items(currency: Currency, items: &[InvoiceItem], tax: Money) -> Result<Self, ValidationError> {
        let subtotal = Money::sum(currency, items.iter().map(|i| &i.total))?;
        let tax = tax.rounded();
        let total = subtotal.checked_add(&tax)?;
        Self::new(subtotal, tax, total)
    }

    pub fn currency(&self) -> Currency {
        self.total.currency()
    }
}

//--------------------------------------   InvoiceExpiration   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceExpiration {
    expires_at: DateTime<Utc>,
    duration_secs: i64,
}

impl InvoiceExpiration {
    /// An expiry window of `duration` starting at `start`. The duration must be positive and the window must end on a
    /// representable date.
    pub fn starting_at(start: DateTime<Utc>, duration: Duration) -> Result<Self, ValidationError> {
        if duration <= Duration::zero() {
            return Err(ValidationError::NonPositiveDuration);
        }
        let expires_at = start.checked_add_signed(duration).ok_or(ValidationError::DurationOutOfRange)?;
        Ok(Self { expires_at, duration_secs: duration.num_seconds() })
    }

    /// A fresh window of `duration` from `now`, replacing this one. Used to extend a live invoice.
    pub fn reissue(&self, duration: Duration, now: DateTime<Utc>) -> Result<Self, ValidationError> {
        Self::starting_at(now, duration)
    }

    /// Rebuilds an expiration from stored values, without validation.
    pub fn from_parts(expires_at: DateTime<Utc>, duration_secs: i64) -> Self {
        Self { expires_at, duration_secs }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn duration(&self) -> Duration {
        Duration::seconds(self.duration_secs)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Time left before expiry. Zero once the invoice has expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        if self.is_expired(now) {
            Duration::zero()
        } else {
            self.expires_at - now
        }
    }
}

//--------------------------------------    InvoiceDefaults    ---------------------------------------------------------
/// Values applied to new invoices that do not specify their own.
#[derive(Debug, Clone)]
pub struct InvoiceDefaults {
    pub payment_tolerance: PaymentTolerance,
    pub invoice_ttl: Duration,
}

impl Default for InvoiceDefaults {
    fn default() -> Self {
        Self { payment_tolerance: PaymentTolerance::default(), invoice_ttl: DEFAULT_INVOICE_TTL }
    }
}

//--------------------------------------      NewInvoice       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewInvoiceItem {
    pub name: String,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl NewInvoiceItem {
    pub fn new<S: Into<String>>(name: S, quantity: Decimal, unit_price: Decimal) -> Self {
        Self { name: name.into(), description: String::default(), quantity, unit_price }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_item(&self.name, &self.description, self.quantity)
    }
}

/// A request to issue a new invoice.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub merchant_id: String,
    pub title: String,
    pub description: String,
    pub items: Vec<NewInvoiceItem>,
    /// The fiat currency the invoice is priced in
    pub currency: Currency,
    /// The crypto currency the customer pays with
    pub crypto_currency: Currency,
    pub tax: Decimal,
    pub customer_id: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub payment_tolerance: Option<PaymentTolerance>,
    pub expires_in: Option<Duration>,
}

impl NewInvoice {
    pub fn new<S: Into<String>>(merchant_id: S, title: S, currency: Currency, crypto_currency: Currency) -> Self {
        Self {
            merchant_id: merchant_id.into(),
            title: title.into(),
            description: String::default(),
            items: Vec::new(),
            currency,
            crypto_currency,
            tax: Decimal::ZERO,
            customer_id: None,
            metadata: BTreeMap::new(),
            payment_tolerance: None,
            expires_in: None,
        }
    }

    pub fn with_item(mut self, item: NewInvoiceItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tax(mut self, tax: Decimal) -> Self {
        self.tax = tax;
        self
    }

    pub fn with_customer_id<S: Into<String>>(mut self, customer_id: S) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_metadata<S: Into<String>>(mut self, key: S, value: S) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_tolerance(mut self, tolerance: PaymentTolerance) -> Self {
        self.payment_tolerance = Some(tolerance);
        self
    }

    pub fn expires_in(mut self, duration: Duration) -> Self {
        self.expires_in = Some(duration);
        self
    }

    /// Checks everything that can be checked before the exchange rate and payment address are known.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.items.is_empty() {
            return Err(ValidationError::NoItems);
        }
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        let title_len = self.title.chars().count();
        if title_len > MAX_TITLE_LENGTH {
            return Err(ValidationError::TitleTooLong(title_len));
        }
        let desc_len = self.description.chars().count();
        if desc_len > MAX_DESCRIPTION_LENGTH {
            return Err(ValidationError::DescriptionTooLong(desc_len));
        }
        for item in &self.items {
            item.validate()?;
        }
        if !self.currency.is_fiat() {
            return Err(ValidationError::NotFiat(self.currency));
        }
        if !self.crypto_currency.is_crypto() {
            return Err(ValidationError::NotCrypto(self.crypto_currency));
        }
        if self.tax < Decimal::ZERO {
            return Err(ValidationError::NegativeTax(self.tax));
        }
        if let Some(tolerance) = &self.payment_tolerance {
            tolerance.validate()?;
        }
        if let Some(duration) = self.expires_in {
            InvoiceExpiration::starting_at(Utc::now(), duration)?;
        }
        Ok(())
    }

    /// Builds the invoice aggregate in `Created` status.
    ///
    /// The rate and address must be current, and must match the invoice's currencies.
    pub fn into_invoice(
        self,
        id: InvoiceId,
        exchange_rate: ExchangeRate,
        payment_address: PaymentAddress,
        defaults: &InvoiceDefaults,
        now: DateTime<Utc>,
    ) -> Result<Invoice, ValidationError> {
        self.validate()?;
        if exchange_rate.is_expired(now) {
            return Err(ValidationError::ExchangeRateExpired(exchange_rate.to_string()));
        }
        if exchange_rate.from != self.currency || exchange_rate.to != self.crypto_currency {
            return Err(ValidationError::RateMismatch {
                rate: exchange_rate.to_string(),
                from: self.currency,
                to: self.crypto_currency,
            });
        }
        if payment_address.is_expired(now) {
            return Err(ValidationError::PaymentAddressExpired(payment_address.address));
        }
        if payment_address.currency != self.crypto_currency {
            return Err(ValidationError::AddressCurrencyMismatch {
                expected: self.crypto_currency,
                found: payment_address.currency,
            });
        }
        let items = self
            .items
            .into_iter()
            .map(|item| {
                let unit_price = Money::new(item.unit_price, self.currency)?;
                InvoiceItem::new(item.name, item.description, item.quantity, unit_price)
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;
        let tax = Money::new(self.tax, self.currency).map_err(|_| ValidationError::NegativeTax(self.tax))?;
        let pricing = InvoicePricing::from_items(self.currency, &items, tax)?;
        let payment_tolerance = self.payment_tolerance.unwrap_or_else(|| defaults.payment_tolerance.clone());
        let expiration = InvoiceExpiration::starting_at(now, self.expires_in.unwrap_or(defaults.invoice_ttl))?;
        Ok(Invoice {
            id,
            merchant_id: self.merchant_id,
            title: self.title,
            description: self.description,
            items,
            pricing,
            crypto_currency: self.crypto_currency,
            payment_address,
            exchange_rate,
            payment_tolerance,
            expiration,
            created_at: now,
            customer_id: self.customer_id,
            metadata: self.metadata,
            status: InvoiceStatusType::Created,
            updated_at: now,
            paid_at: None,
            viewed_at: None,
            payments: Vec::new(),
            transitions: Vec::new(),
            version: 0,
        })
    }
}
