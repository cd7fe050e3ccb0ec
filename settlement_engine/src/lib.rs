//! Settlement Engine
//!
//! The settlement engine issues invoices priced in fiat, quotes them in a cryptocurrency at a locked-in exchange rate,
//! and follows them through payment, confirmation and expiry. This library contains the core logic. It is
//! provider-agnostic: storage, exchange rates, deposit addresses and event delivery are all supplied from outside.
//!
//! The library is divided into three main sections:
//! 1. The state machines ([`mod@fsm`]). A single transition table with guards decides every invoice status change,
//!    and a smaller machine tracks the confirmation progress of each payment. Both are pure and synchronous.
//! 2. The collaborator contracts ([`mod@traits`]). Backends implement [`InvoiceRepository`]; two are provided, the
//!    in-memory [`MemoryDatabase`] and, with the `sqlite` feature, [`SqliteDatabase`].
//! 3. The settlement API ([`mod@settlement_api`]). [`SettlementFlowApi`] is the public-facing entry point. Each of its
//!    operations locks one invoice, changes it through the state machines, and stores it with an optimistic version
//!    check.
//!
//! The engine also emits events when invoices are created or change status. A simple Actor framework ([`mod@events`])
//! is used so that you can easily hook into these events and perform custom actions.
pub mod db_types;
pub mod events;
pub mod fsm;
pub mod helpers;
pub mod memory_db;
pub mod settlement_api;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use memory_db::MemoryDatabase;
pub use settlement_api::{
    errors::{SettlementError, ValidationError},
    settlement_flow_api::{ConfirmationUpdate, PaymentProcessed, SettlementFlowApi, SweepResult},
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    EventBus,
    EventBusError,
    ExchangeRateError,
    ExchangeRateProvider,
    InvoiceRepository,
    PaymentAddressError,
    PaymentAddressProvider,
    RepositoryError,
};
