use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::MoneyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencyKind {
    Fiat,
    Crypto,
}

//--------------------------------------       Currency        ---------------------------------------------------------
/// The currencies an invoice can be priced in, or settled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Btc,
    Eth,
    Ltc,
    /// Tether. A crypto asset, but rounded like fiat.
    Usdt,
    /// USD Coin. A crypto asset, but rounded like fiat.
    Usdc,
}

impl Currency {
    pub const ALL: [Currency; 8] = [
        Currency::Usd,
        Currency::Eur,
        Currency::Gbp,
        Currency::Btc,
        Currency::Eth,
        Currency::Ltc,
        Currency::Usdt,
        Currency::Usdc,
    ];

    pub fn kind(&self) -> CurrencyKind {
        match self {
            Currency::Usd | Currency::Eur | Currency::Gbp => CurrencyKind::Fiat,
            Currency::Btc | Currency::Eth | Currency::Ltc | Currency::Usdt | Currency::Usdc => CurrencyKind::Crypto,
        }
    }

    pub fn is_fiat(&self) -> bool {
        self.kind() == CurrencyKind::Fiat
    }

    pub fn is_crypto(&self) -> bool {
        self.kind() == CurrencyKind::Crypto
    }

    /// The number of decimal places amounts in this currency are rounded to after arithmetic.
    pub fn decimal_places(&self) -> u32 {
        match self {
            Currency::Usd | Currency::Eur | Currency::Gbp | Currency::Usdt | Currency::Usdc => 2,
            Currency::Btc | Currency::Ltc => 8,
            Currency::Eth => 18,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Btc => "BTC",
            Currency::Eth => "ETH",
            Currency::Ltc => "LTC",
            Currency::Usdt => "USDT",
            Currency::Usdc => "USDC",
        }
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        Currency::ALL
            .iter()
            .find(|c| c.code() == code)
            .copied()
            .ok_or_else(|| MoneyError::UnknownCurrency(s.to_string()))
    }
}
