use blake2::{Blake2b512, Digest};
use chrono::{Duration, Utc};
use settlement_common::Currency;

use crate::{
    db_types::InvoiceId,
    helpers::to_hex,
    settlement_api::payment_objects::PaymentAddress,
    traits::{PaymentAddressError, PaymentAddressProvider},
};

/// The network a currency is settled on.
pub fn network_for(currency: Currency) -> Option<&'static str> {
    match currency {
        Currency::Btc => Some("bitcoin"),
        Currency::Ltc => Some("litecoin"),
        Currency::Eth | Currency::Usdt | Currency::Usdc => Some("ethereum"),
        Currency::Usd | Currency::Eur | Currency::Gbp => None,
    }
}

/// Derives deposit addresses from the invoice id instead of talking to a wallet.
///
/// The address is the hex-encoded Blake2b-512 hash of `{secret}:{currency}:{invoice_id}`, truncated to 20 bytes
/// (40 hex characters), with a per-network prefix. The same invoice always gets the same address, which is easily
/// recognisable as a generated one.
#[derive(Debug, Clone)]
pub struct HashedAddressProvider {
    secret: String,
    ttl: Duration,
}

impl HashedAddressProvider {
    pub fn new<S: Into<String>>(secret: S, ttl: Duration) -> Self {
        Self { secret: secret.into(), ttl }
    }

    pub fn address_for(&self, invoice_id: &InvoiceId, currency: Currency) -> Result<PaymentAddress, PaymentAddressError> {
        let network = network_for(currency).ok_or(PaymentAddressError::UnsupportedCurrency(currency))?;
        let preimage = format!("{}:{currency}:{}", self.secret, invoice_id.as_str());
        let hash = Blake2b512::digest(preimage.as_bytes());
        let prefix = match network {
            "bitcoin" => "bc1q",
            "litecoin" => "ltc1q",
            _ => "0x",
        };
        let address = format!("{prefix}{}", to_hex(&hash[..20]));
        Ok(PaymentAddress::new(address, network.to_string(), currency, Utc::now() + self.ttl))
    }
}

impl PaymentAddressProvider for HashedAddressProvider {
    async fn generate_address(
        &self,
        invoice_id: &InvoiceId,
        currency: Currency,
    ) -> Result<PaymentAddress, PaymentAddressError> {
        self.address_for(invoice_id, currency)
    }
}
