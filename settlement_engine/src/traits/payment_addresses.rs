use settlement_common::Currency;
use thiserror::Error;

use crate::{db_types::InvoiceId, settlement_api::payment_objects::PaymentAddress};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PaymentAddressError {
    #[error("Cannot generate payment addresses for {0}")]
    UnsupportedCurrency(Currency),
    #[error("Payment address provider error: {0}")]
    ProviderError(String),
}

#[allow(async_fn_in_trait)]
pub trait PaymentAddressProvider {
    /// Generate a deposit address in `currency` for the given invoice.
    async fn generate_address(
        &self,
        invoice_id: &InvoiceId,
        currency: Currency,
    ) -> Result<PaymentAddress, PaymentAddressError>;
}
