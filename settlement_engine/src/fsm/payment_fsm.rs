use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use settlement_common::Money;
use thiserror::Error;

use crate::{
    db_types::{InvoiceId, Payment, PaymentId, PaymentStatus},
    settlement_api::payment_objects::NewPayment,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentTransitionError {
    #[error("Payment {tx_hash} cannot move from {from} to {to}")]
    InvalidTransition { tx_hash: String, from: PaymentStatus, to: PaymentStatus },
    #[error("Payment {tx_hash} is {status} and does not take confirmation updates")]
    NotTracking { tx_hash: String, status: PaymentStatus },
}

/// A change in payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentStatusChange {
    pub from: PaymentStatus,
    pub to: PaymentStatus,
}

/// The number of confirmations a payment needs before it is considered final. Larger payments wait longer.
///
/// | amount (whole units) | confirmations |
/// |---|---|
/// | < 100 | 1 |
/// | < 1,000 | 3 |
/// | < 10,000 | 6 |
/// | otherwise | 12 |
pub fn required_confirmations(amount: &Money) -> u32 {
    let units = amount.amount();
    if units < Decimal::ONE_HUNDRED {
        1
    } else if units < Decimal::ONE_THOUSAND {
        3
    } else if units < Decimal::from(10_000) {
        6
    } else {
        12
    }
}

fn is_allowed(from: PaymentStatus, to: PaymentStatus) -> bool {
    use PaymentStatus::*;
    match from {
        Detected => matches!(to, Confirming | Failed),
        Confirming => matches!(to, Confirmed | Orphaned),
        Orphaned => matches!(to, Detected | Failed),
        Confirmed | Failed => false,
    }
}

impl Payment {
    /// A freshly detected payment, with no confirmations.
    pub fn detected(invoice_id: InvoiceId, signal: &NewPayment, now: DateTime<Utc>) -> Self {
        Self {
            id: PaymentId::random(),
            invoice_id,
            tx_hash: signal.tx_hash.clone(),
            amount: signal.amount,
            from_address: signal.from_address.clone(),
            to_address: signal.to_address.clone(),
            status: PaymentStatus::Detected,
            confirmations: 0,
            required_confirmations: required_confirmations(&signal.amount),
            detected_at: now,
            updated_at: now,
            confirmed_at: None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == PaymentStatus::Confirmed
    }

    /// Records a new confirmation count and moves the payment along.
    ///
    /// * Reaching `required_confirmations` confirms the payment, from `Detected` or `Confirming`.
    /// * Any confirmation at all moves a `Detected` payment to `Confirming`.
    /// * Anything else is a no-op and returns `Ok(None)`. Counts lower than the one already recorded are ignored.
    ///
    /// Failed and orphaned payments do not take updates.
    pub fn update_confirmations(
        &mut self,
        confirmations: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<PaymentStatusChange>, PaymentTransitionError> {
        if matches!(self.status, PaymentStatus::Failed | PaymentStatus::Orphaned) {
            return Err(PaymentTransitionError::NotTracking { tx_hash: self.tx_hash.clone(), status: self.status });
        }
        if confirmations <= self.confirmations {
            return Ok(None);
        }
        self.confirmations = confirmations;
        self.updated_at = now;
        let from = self.status;
        match from {
            PaymentStatus::Detected | PaymentStatus::Confirming if confirmations >= self.required_confirmations => {
                self.status = PaymentStatus::Confirmed;
                self.confirmed_at.get_or_insert(now);
            },
            PaymentStatus::Detected => self.status = PaymentStatus::Confirming,
            _ => return Ok(None),
        }
        Ok(Some(PaymentStatusChange { from, to: self.status }))
    }

    /// The payment's block was reorganised away. Confirmations restart from zero; the requirement is unchanged.
    pub fn orphan(&mut self, now: DateTime<Utc>) -> Result<PaymentStatusChange, PaymentTransitionError> {
        let change = self.transition(PaymentStatus::Orphaned, now)?;
        self.confirmations = 0;
        Ok(change)
    }

    /// An orphaned transaction was seen again.
    pub fn redetect(&mut self, now: DateTime<Utc>) -> Result<PaymentStatusChange, PaymentTransitionError> {
        self.transition(PaymentStatus::Detected, now)
    }

    pub fn fail(&mut self, now: DateTime<Utc>) -> Result<PaymentStatusChange, PaymentTransitionError> {
        self.transition(PaymentStatus::Failed, now)
    }

    fn transition(&mut self, to: PaymentStatus, now: DateTime<Utc>) -> Result<PaymentStatusChange, PaymentTransitionError> {
        let from = self.status;
        if !is_allowed(from, to) {
            return Err(PaymentTransitionError::InvalidTransition { tx_hash: self.tx_hash.clone(), from, to });
        }
        self.status = to;
        self.updated_at = now;
        Ok(PaymentStatusChange { from, to })
    }
}
