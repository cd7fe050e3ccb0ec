#![allow(dead_code)]
pub mod mocks;

use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use settlement_common::{Currency, Money};
use settlement_engine::{
    db_types::{Invoice, InvoiceId},
    events::{SettlementEvent, SettlementEventType},
    helpers::{HashedAddressProvider, StaticExchangeRates},
    settlement_api::{
        invoice_objects::{InvoiceExpiration, NewInvoice, NewInvoiceItem},
        payment_objects::NewPayment,
    },
    EventBus,
    EventBusError,
    InvoiceRepository,
    MemoryDatabase,
    SettlementFlowApi,
};

pub type TestApi = SettlementFlowApi<MemoryDatabase, StaticExchangeRates, HashedAddressProvider, RecordingBus>;

/// An event bus that keeps everything it is given.
#[derive(Debug, Clone, Default)]
pub struct RecordingBus {
    events: Arc<Mutex<Vec<SettlementEvent>>>,
}

impl RecordingBus {
    pub fn events(&self) -> Vec<SettlementEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn types(&self) -> Vec<SettlementEventType> {
        self.events().into_iter().map(|e| e.event_type).collect()
    }

    pub fn count(&self, event_type: SettlementEventType) -> usize {
        self.events().iter().filter(|e| e.event_type == event_type).count()
    }
}

impl EventBus for RecordingBus {
    fn publish(&self, event: SettlementEvent) -> Result<(), EventBusError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

pub fn test_rates() -> StaticExchangeRates {
    StaticExchangeRates::new(Duration::minutes(5))
        .with_rate(Currency::Usd, Currency::Btc, dec!(0.000016))
        .with_rate(Currency::Usd, Currency::Usdt, Decimal::ONE)
}

pub fn test_addresses() -> HashedAddressProvider {
    HashedAddressProvider::new("integration-tests", Duration::hours(1))
}

pub fn setup() -> (TestApi, RecordingBus) {
    let _ = env_logger::try_init();
    let bus = RecordingBus::default();
    let api = SettlementFlowApi::new(MemoryDatabase::new(), test_rates(), test_addresses(), bus.clone());
    (api, bus)
}

/// A 100.00 USD invoice paid in BTC. At the test rate the customer owes 0.0016 BTC.
pub fn btc_invoice() -> NewInvoice {
    NewInvoice::new("merchant-1", "Order 1001", Currency::Usd, Currency::Btc)
        .with_item(NewInvoiceItem::new("Espresso machine", dec!(1), dec!(100.00)))
}

/// A 500.00 USD invoice paid in USDT at parity. Payments of this size need three confirmations.
pub fn usdt_invoice() -> NewInvoice {
    NewInvoice::new("merchant-1", "Order 2002", Currency::Usd, Currency::Usdt)
        .with_item(NewInvoiceItem::new("Road bike", dec!(1), dec!(500.00)))
}

pub fn btc(amount: &str) -> Money {
    Money::parse(amount, Currency::Btc).unwrap()
}

pub fn usdt(amount: &str) -> Money {
    Money::parse(amount, Currency::Usdt).unwrap()
}

pub fn payment(invoice: &Invoice, tx_hash: &str, amount: Money) -> NewPayment {
    NewPayment::new(tx_hash, amount, "customer-wallet", invoice.payment_address.address.as_str())
}

/// Moves the invoice's expiry time into the past, straight in the store.
pub async fn backdate_expiry(api: &TestApi, id: &InvoiceId) {
    backdate_expiry_in(api.db(), id).await;
}

pub async fn backdate_expiry_in<B: InvoiceRepository>(db: &B, id: &InvoiceId) {
    let mut invoice = db.find_by_id(id).await.unwrap();
    let expiration = InvoiceExpiration::from_parts(Utc::now() - Duration::minutes(1), 3600);
    invoice.reissue_expiration(expiration);
    db.update(&invoice).await.unwrap();
}
