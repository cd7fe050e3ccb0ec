use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use settlement_common::Currency;

use crate::{
    db_types::{Invoice, InvoiceId, InvoiceStatusType},
    settlement_api::{
        exchange_objects::ExchangeRate,
        invoice_objects::{InvoiceDefaults, NewInvoice, NewInvoiceItem},
        payment_objects::PaymentAddress,
    },
};

/// 1 USD => 0.000016 BTC, valid for five minutes from `now`.
pub fn usd_btc_rate(now: DateTime<Utc>) -> ExchangeRate {
    ExchangeRate::new(Currency::Usd, Currency::Btc, Decimal::new(16, 6), "test", now, Duration::minutes(5))
        .expect("Test rate is positive")
}

/// A fresh, random bitcoin deposit address, valid for an hour from `now`.
pub fn btc_address(now: DateTime<Utc>) -> PaymentAddress {
    let address = format!("bc1q{:032x}", rand::random::<u128>());
    PaymentAddress::new(address.as_str(), "bitcoin", Currency::Btc, now + Duration::hours(1))
}

/// A one-item, 100.00 USD invoice paid in BTC (0.0016 BTC at the test rate), created at `now`, expiring an hour
/// later, and placed directly in `status`. Neither `viewed_at` nor `paid_at` is set, whatever the status.
pub fn invoice_in(status: InvoiceStatusType, now: DateTime<Utc>) -> Invoice {
    let mut invoice = NewInvoice::new("merchant-1", "Test invoice", Currency::Usd, Currency::Btc)
        .with_item(NewInvoiceItem::new("Widget", Decimal::ONE, Decimal::ONE_HUNDRED))
        .into_invoice(InvoiceId::random(), usd_btc_rate(now), btc_address(now), &InvoiceDefaults::default(), now)
        .expect("Test invoice is valid");
    invoice.status = status;
    invoice
}
