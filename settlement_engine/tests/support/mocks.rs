use mockall::mock;
use settlement_common::Currency;
use settlement_engine::{
    db_types::InvoiceId,
    events::SettlementEvent,
    settlement_api::{exchange_objects::ExchangeRate, payment_objects::PaymentAddress},
    EventBus,
    EventBusError,
    ExchangeRateError,
    ExchangeRateProvider,
    PaymentAddressError,
    PaymentAddressProvider,
};

mock! {
    pub Bus {}
    impl EventBus for Bus {
        fn publish(&self, event: SettlementEvent) -> Result<(), EventBusError>;
    }
}

mock! {
    pub Rates {}
    impl ExchangeRateProvider for Rates {
        async fn fetch_rate(&self, from: Currency, to: Currency) -> Result<ExchangeRate, ExchangeRateError>;
    }
}

mock! {
    pub Addresses {}
    impl PaymentAddressProvider for Addresses {
        async fn generate_address(&self, invoice_id: &InvoiceId, currency: Currency) -> Result<PaymentAddress, PaymentAddressError>;
    }
}
