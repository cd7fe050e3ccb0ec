use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    db_types::{Actor, Invoice, InvoiceId, InvoiceStatusType},
    fsm::Transition,
};

pub const INVOICE_AGGREGATE: &str = "invoice";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettlementEventType {
    InvoiceCreated,
    InvoiceStatusChanged,
    InvoiceCancelled,
    InvoiceExpired,
}

impl SettlementEventType {
    /// The event announcing a status change, picked by where the invoice ended up.
    pub fn for_destination(status: InvoiceStatusType) -> Self {
        match status {
            InvoiceStatusType::Cancelled => Self::InvoiceCancelled,
            InvoiceStatusType::Expired => Self::InvoiceExpired,
            _ => Self::InvoiceStatusChanged,
        }
    }
}

impl Display for SettlementEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvoiceCreated => write!(f, "InvoiceCreated"),
            Self::InvoiceStatusChanged => write!(f, "InvoiceStatusChanged"),
            Self::InvoiceCancelled => write!(f, "InvoiceCancelled"),
            Self::InvoiceExpired => write!(f, "InvoiceExpired"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementEvent {
    pub event_type: SettlementEventType,
    pub aggregate_id: InvoiceId,
    pub aggregate_type: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

impl SettlementEvent {
    pub fn new(event_type: SettlementEventType, aggregate_id: InvoiceId, payload: Value, timestamp: DateTime<Utc>) -> Self {
        Self { event_type, aggregate_id, aggregate_type: INVOICE_AGGREGATE.to_string(), payload, timestamp }
    }

    pub fn invoice_created(invoice: &Invoice) -> Self {
        let required = invoice.required_amount().map(|m| m.to_fixed_string()).unwrap_or_default();
        let payload = json!({
            "merchant_id": invoice.merchant_id,
            "title": invoice.title,
            "total": invoice.pricing.total.to_fixed_string(),
            "currency": invoice.pricing.currency(),
            "crypto_amount": required,
            "crypto_currency": invoice.crypto_currency,
            "payment_address": invoice.payment_address.address,
            "expires_at": invoice.expiration().expires_at(),
        });
        Self::new(SettlementEventType::InvoiceCreated, invoice.id.clone(), payload, invoice.created_at)
    }

    pub fn status_changed(invoice: &Invoice, transition: &Transition, reason: &str, actor: Actor) -> Self {
        let payload = json!({
            "from": transition.from,
            "to": transition.to,
            "trigger": transition.trigger,
            "reason": reason,
            "actor": actor,
        });
        let event_type = SettlementEventType::for_destination(transition.to);
        Self::new(event_type, invoice.id.clone(), payload, transition.at)
    }
}

impl Display for SettlementEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} for {} {}", self.event_type, self.aggregate_type, self.aggregate_id)
    }
}
