mod hashed_addresses;
mod static_rates;

pub use hashed_addresses::{network_for, HashedAddressProvider};
pub use static_rates::{parse_rate_table, StaticExchangeRates};

/// A random identifier of the form `{prefix}_{32 hex digits}`.
pub fn random_id(prefix: &str) -> String {
    format!("{prefix}_{:032x}", rand::random::<u128>())
}

pub(crate) fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn random_ids() {
        let a = random_id("inv");
        let b = random_id("inv");
        assert!(a.starts_with("inv_"));
        assert_eq!(a.len(), 36);
        assert_ne!(a, b);
    }

    #[test]
    fn hex() {
        assert_eq!(to_hex(&[0, 1, 0xab, 0xff]), "0001abff");
    }
}
