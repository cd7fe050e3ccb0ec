//! # State machines
//!
//! Two state machines live here:
//!
//! * [`invoice_fsm`] governs the invoice lifecycle. It is a single transition table ([`next_status`]) plus a set of
//!   guards that are checked before the table is consulted. Firing a trigger never performs I/O. The caller gets a
//!   [`Transition`] back, describing the new status and any [`SideEffect`]s that were applied.
//! * [`payment_fsm`] tracks a single payment from detection to final confirmation, driven purely by the number of
//!   block confirmations reported for its transaction.
//!
//! The two machines are not coupled. The settlement orchestrator watches payment status and fires invoice triggers
//! as needed.
pub mod invoice_fsm;
pub mod payment_fsm;

pub use invoice_fsm::{
    next_status,
    trigger_for,
    ExpiryCheck,
    GuardContext,
    GuardViolation,
    InvoiceTrigger,
    SideEffect,
    Transition,
    TransitionError,
};
pub use payment_fsm::{required_confirmations, PaymentStatusChange, PaymentTransitionError};
