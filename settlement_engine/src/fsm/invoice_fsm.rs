use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{ConversionError, Invoice, InvoiceStatusType};

//--------------------------------------     InvoiceTrigger    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvoiceTrigger {
    /// The customer opened the invoice.
    Viewed,
    /// A payment within the underpayment tolerance, but short of the total, was received.
    Partial,
    /// The full amount has been received and is awaiting confirmation.
    Completed,
    /// Every payment reached its required confirmation count.
    Confirmed,
    /// A chain reorganisation un-confirmed a payment.
    Reorg,
    Expired,
    Cancelled,
    Refunded,
}

impl InvoiceTrigger {
    pub const ALL: [InvoiceTrigger; 8] = [
        Self::Viewed,
        Self::Partial,
        Self::Completed,
        Self::Confirmed,
        Self::Reorg,
        Self::Expired,
        Self::Cancelled,
        Self::Refunded,
    ];
}

impl Display for InvoiceTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Viewed => write!(f, "Viewed"),
            Self::Partial => write!(f, "Partial"),
            Self::Completed => write!(f, "Completed"),
            Self::Confirmed => write!(f, "Confirmed"),
            Self::Reorg => write!(f, "Reorg"),
            Self::Expired => write!(f, "Expired"),
            Self::Cancelled => write!(f, "Cancelled"),
            Self::Refunded => write!(f, "Refunded"),
        }
    }
}

impl FromStr for InvoiceTrigger {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InvoiceTrigger::ALL
            .into_iter()
            .find(|t| t.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConversionError::new("invoice trigger", s))
    }
}

//--------------------------------------   Transition table    ---------------------------------------------------------
/// The invoice transition table. Returns `None` for every (status, trigger) pair that is not allowed.
///
/// Every pair is spelled out so that adding a status or a trigger will not compile until the table is updated.
pub fn next_status(from: InvoiceStatusType, trigger: InvoiceTrigger) -> Option<InvoiceStatusType> {
    use InvoiceStatusType as S;
    use InvoiceTrigger as T;
    match from {
        S::Created => match trigger {
            T::Viewed => Some(S::Pending),
            T::Expired => Some(S::Expired),
            T::Cancelled => Some(S::Cancelled),
            T::Partial | T::Completed | T::Confirmed | T::Reorg | T::Refunded => None,
        },
        S::Pending => match trigger {
            T::Partial => Some(S::Partial),
            T::Completed => Some(S::Confirming),
            T::Expired => Some(S::Expired),
            T::Cancelled => Some(S::Cancelled),
            T::Viewed | T::Confirmed | T::Reorg | T::Refunded => None,
        },
        S::Partial => match trigger {
            T::Completed => Some(S::Confirming),
            T::Cancelled => Some(S::Cancelled),
            T::Viewed | T::Partial | T::Confirmed | T::Reorg | T::Expired | T::Refunded => None,
        },
        S::Confirming => match trigger {
            T::Confirmed => Some(S::Paid),
            T::Reorg => Some(S::Pending),
            T::Viewed | T::Partial | T::Completed | T::Expired | T::Cancelled | T::Refunded => None,
        },
        S::Paid => match trigger {
            T::Refunded => Some(S::Refunded),
            T::Viewed | T::Partial | T::Completed | T::Confirmed | T::Reorg | T::Expired | T::Cancelled => None,
        },
        S::Expired | S::Cancelled | S::Refunded => None,
    }
}

/// The single trigger that moves an invoice from `from` to `to`, if there is one. Multi-hop paths are not considered.
pub fn trigger_for(from: InvoiceStatusType, to: InvoiceStatusType) -> Option<InvoiceTrigger> {
    InvoiceTrigger::ALL.into_iter().find(|t| next_status(from, *t) == Some(to))
}

//--------------------------------------        Guards         ---------------------------------------------------------
/// Whether the `Expired` trigger must wait for the invoice's expiry time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryCheck {
    /// Sweeps and `check_and_expire`. The invoice must be past `expires_at`.
    Enforce,
    /// Administrative force-expiry.
    Bypass,
}

/// The environment guards are evaluated in.
#[derive(Debug, Clone, Copy)]
pub struct GuardContext {
    pub now: DateTime<Utc>,
    pub expiry_check: ExpiryCheck,
}

impl GuardContext {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now, expiry_check: ExpiryCheck::Enforce }
    }

    pub fn bypass_expiry(mut self) -> Self {
        self.expiry_check = ExpiryCheck::Bypass;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GuardViolation {
    #[error("cannot auto-expire invoices with partial payments")]
    PartialPaymentOutstanding,
    #[error("invoice has not expired yet")]
    NotYetExpired,
    #[error("invoice is already in a terminal state")]
    AlreadyTerminal,
    #[error("invoice is not awaiting confirmation")]
    NotConfirming,
    #[error("invoice has not been paid")]
    NotPaid,
    #[error("invoice has already been viewed")]
    AlreadyViewed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Cannot fire {trigger} on an invoice that is {from}")]
    InvalidTransition { from: InvoiceStatusType, trigger: InvoiceTrigger },
    #[error("Cannot fire {trigger} on an invoice that is {from}: {violation}")]
    GuardViolation { from: InvoiceStatusType, trigger: InvoiceTrigger, violation: GuardViolation },
}

fn check_guards(invoice: &Invoice, trigger: InvoiceTrigger, ctx: &GuardContext) -> Result<(), GuardViolation> {
    let status = invoice.status;
    match trigger {
        InvoiceTrigger::Expired => {
            if status == InvoiceStatusType::Partial {
                return Err(GuardViolation::PartialPaymentOutstanding);
            }
            if ctx.expiry_check == ExpiryCheck::Enforce && !invoice.expiration.is_expired(ctx.now) {
                return Err(GuardViolation::NotYetExpired);
            }
        },
        InvoiceTrigger::Cancelled if status.is_terminal() => return Err(GuardViolation::AlreadyTerminal),
        InvoiceTrigger::Confirmed if status != InvoiceStatusType::Confirming => return Err(GuardViolation::NotConfirming),
        InvoiceTrigger::Refunded if status != InvoiceStatusType::Paid => return Err(GuardViolation::NotPaid),
        InvoiceTrigger::Viewed if invoice.viewed_at.is_some() => return Err(GuardViolation::AlreadyViewed),
        _ => {},
    }
    Ok(())
}

//--------------------------------------      Transition       ---------------------------------------------------------
/// Changes to the aggregate, beyond `status` and `updated_at`, that a transition carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    SetPaidAt(DateTime<Utc>),
    SetViewedAt(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: InvoiceStatusType,
    pub to: InvoiceStatusType,
    pub trigger: InvoiceTrigger,
    pub at: DateTime<Utc>,
    pub effects: Vec<SideEffect>,
}

/// Works out what firing `trigger` would do, without touching the invoice.
pub fn plan(invoice: &Invoice, trigger: InvoiceTrigger, ctx: &GuardContext) -> Result<Transition, TransitionError> {
    let from = invoice.status;
    check_guards(invoice, trigger, ctx).map_err(|violation| TransitionError::GuardViolation { from, trigger, violation })?;
    let to = next_status(from, trigger).ok_or(TransitionError::InvalidTransition { from, trigger })?;
    let mut effects = Vec::new();
    if to == InvoiceStatusType::Paid && invoice.paid_at.is_none() {
        effects.push(SideEffect::SetPaidAt(ctx.now));
    }
    if trigger == InvoiceTrigger::Viewed && invoice.viewed_at.is_none() {
        effects.push(SideEffect::SetViewedAt(ctx.now));
    }
    Ok(Transition { from, to, trigger, at: ctx.now, effects })
}

impl Invoice {
    pub fn can_fire(&self, trigger: InvoiceTrigger, ctx: &GuardContext) -> bool {
        plan(self, trigger, ctx).is_ok()
    }

    /// Fires `trigger`. On error the invoice is left exactly as it was.
    pub fn fire(&mut self, trigger: InvoiceTrigger, ctx: &GuardContext) -> Result<Transition, TransitionError> {
        let transition = plan(self, trigger, ctx)?;
        self.apply(&transition);
        Ok(transition)
    }

    /// Expires the invoice, provided it is past its expiry time.
    pub fn check_and_expire(&mut self, now: DateTime<Utc>) -> Result<Transition, TransitionError> {
        self.fire(InvoiceTrigger::Expired, &GuardContext::at(now))
    }

    /// Expires the invoice regardless of its expiry time. The partial-payment guard still holds.
    pub fn force_expire(&mut self, now: DateTime<Utc>) -> Result<Transition, TransitionError> {
        self.fire(InvoiceTrigger::Expired, &GuardContext::at(now).bypass_expiry())
    }

    fn apply(&mut self, transition: &Transition) {
        self.status = transition.to;
        self.updated_at = transition.at;
        for effect in &transition.effects {
            match effect {
                SideEffect::SetPaidAt(at) => {
                    self.paid_at.get_or_insert(*at);
                },
                SideEffect::SetViewedAt(at) => {
                    self.viewed_at.get_or_insert(*at);
                },
            }
        }
    }
}
