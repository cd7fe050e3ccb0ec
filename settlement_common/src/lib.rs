//! Shared primitives for the invoice settlement crates.
//!
//! [`Money`] pairs an exact [`rust_decimal::Decimal`] amount with a [`Currency`]. Arithmetic between two `Money`
//! values only succeeds when the currencies agree, and every derived amount is rounded half-up to the number of
//! places the currency carries.
mod currency;
mod money;

pub use currency::{Currency, CurrencyKind};
pub use money::{Money, MoneyError};
