//! # Collaborator contracts
//!
//! The settlement engine does not care where invoices are stored, where exchange rates come from, how payment
//! addresses are derived, or who listens for its events. Each of these is a trait here:
//!
//! * [`InvoiceRepository`] stores and loads invoice aggregates. Backends must implement optimistic versioning: an
//!   update of a stale copy fails with [`RepositoryError::VersionConflict`].
//! * [`ExchangeRateProvider`] quotes a rate for a currency pair.
//! * [`PaymentAddressProvider`] hands out a fresh deposit address for an invoice.
//! * [`EventBus`] accepts domain events on a best-effort basis.
mod event_bus;
mod exchange_rates;
mod invoice_repository;
mod payment_addresses;

pub use event_bus::{EventBus, EventBusError};
pub use exchange_rates::{ExchangeRateError, ExchangeRateProvider};
pub use invoice_repository::{InvoiceRepository, RepositoryError};
pub use payment_addresses::{PaymentAddressError, PaymentAddressProvider};
