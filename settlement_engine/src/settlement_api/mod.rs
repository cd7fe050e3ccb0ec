//! # Settlement API
//!
//! The public face of the engine. [`settlement_flow_api::SettlementFlowApi`] takes merchant requests, customer views
//! and blockchain payment signals, and turns each of them into a single, locked, versioned change to one invoice.
//!
//! The value objects the API trades in live alongside it:
//! * [`invoice_objects`]: line items, pricing, expiry windows and new-invoice requests.
//! * [`payment_objects`]: payment tolerances and their classification of received amounts, deposit addresses and
//!   incoming payment signals.
//! * [`exchange_objects`]: time-limited exchange rates.
pub mod errors;
pub mod exchange_objects;
pub mod invoice_locks;
pub mod invoice_objects;
pub mod payment_objects;
pub mod settlement_flow_api;
