use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settlement_common::{Currency, Money, MoneyError};
use thiserror::Error;

use crate::{
    fsm::InvoiceTrigger,
    helpers::random_id,
    settlement_api::{
        exchange_objects::ExchangeRate,
        invoice_objects::{InvoiceExpiration, InvoiceItem, InvoicePricing},
        payment_objects::{PaymentAddress, PaymentTolerance},
    },
};

#[derive(Debug, Clone, Error)]
#[error("Invalid {kind}: {value}")]
pub struct ConversionError {
    kind: &'static str,
    value: String,
}

impl ConversionError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}

//--------------------------------------       InvoiceId       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub String);

impl InvoiceId {
    pub fn random() -> Self {
        Self(random_id("inv"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for InvoiceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for InvoiceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for InvoiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//--------------------------------------       PaymentId       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(pub String);

impl PaymentId {
    pub fn random() -> Self {
        Self(random_id("pay"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PaymentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for PaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

//--------------------------------------   InvoiceStatusType   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvoiceStatusType {
    /// The invoice has been issued, but the customer has not looked at it yet.
    Created,
    /// The customer has viewed the invoice and no accepted payment has arrived.
    Pending,
    /// A payment inside the underpayment tolerance has been accepted, but the full amount is outstanding.
    Partial,
    /// The full amount has been received and is waiting for blockchain confirmations.
    Confirming,
    /// All payments are confirmed.
    Paid,
    /// The invoice passed its expiry time without being paid.
    Expired,
    /// The invoice was cancelled by the merchant or an admin.
    Cancelled,
    /// A paid invoice was refunded.
    Refunded,
}

impl InvoiceStatusType {
    pub const ALL: [InvoiceStatusType; 8] = [
        InvoiceStatusType::Created,
        InvoiceStatusType::Pending,
        InvoiceStatusType::Partial,
        InvoiceStatusType::Confirming,
        InvoiceStatusType::Paid,
        InvoiceStatusType::Expired,
        InvoiceStatusType::Cancelled,
        InvoiceStatusType::Refunded,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Expired | Self::Cancelled | Self::Refunded)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub fn is_paid(&self) -> bool {
        matches!(self, Self::Paid | Self::Refunded)
    }
}

impl Display for InvoiceStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Pending => write!(f, "Pending"),
            Self::Partial => write!(f, "Partial"),
            Self::Confirming => write!(f, "Confirming"),
            Self::Paid => write!(f, "Paid"),
            Self::Expired => write!(f, "Expired"),
            Self::Cancelled => write!(f, "Cancelled"),
            Self::Refunded => write!(f, "Refunded"),
        }
    }
}

impl FromStr for InvoiceStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Created" => Ok(Self::Created),
            "Pending" => Ok(Self::Pending),
            "Partial" => Ok(Self::Partial),
            "Confirming" => Ok(Self::Confirming),
            "Paid" => Ok(Self::Paid),
            "Expired" => Ok(Self::Expired),
            "Cancelled" => Ok(Self::Cancelled),
            "Refunded" => Ok(Self::Refunded),
            s => Err(ConversionError::new("invoice status", s)),
        }
    }
}

//--------------------------------------     PaymentStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// Seen on the network, no confirmations yet.
    Detected,
    /// Mined, but not yet deep enough to be considered final.
    Confirming,
    Confirmed,
    Failed,
    /// The block containing the payment was reorganised away.
    Orphaned,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }

    /// Whether a payment in this state counts towards the amount received for its invoice.
    pub fn counts_towards_total(&self) -> bool {
        matches!(self, Self::Detected | Self::Confirming | Self::Confirmed)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Detected => write!(f, "Detected"),
            Self::Confirming => write!(f, "Confirming"),
            Self::Confirmed => write!(f, "Confirmed"),
            Self::Failed => write!(f, "Failed"),
            Self::Orphaned => write!(f, "Orphaned"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Detected" => Ok(Self::Detected),
            "Confirming" => Ok(Self::Confirming),
            "Confirmed" => Ok(Self::Confirmed),
            "Failed" => Ok(Self::Failed),
            "Orphaned" => Ok(Self::Orphaned),
            s => Err(ConversionError::new("payment status", s)),
        }
    }
}

//--------------------------------------         Actor         ---------------------------------------------------------
/// Who, or what, caused an invoice status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Actor {
    System,
    Customer,
    Merchant,
    Admin,
    ExpirySweep,
}

impl Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Actor::System => write!(f, "System"),
            Actor::Customer => write!(f, "Customer"),
            Actor::Merchant => write!(f, "Merchant"),
            Actor::Admin => write!(f, "Admin"),
            Actor::ExpirySweep => write!(f, "ExpirySweep"),
        }
    }
}

impl FromStr for Actor {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "System" => Ok(Self::System),
            "Customer" => Ok(Self::Customer),
            "Merchant" => Ok(Self::Merchant),
            "Admin" => Ok(Self::Admin),
            "ExpirySweep" => Ok(Self::ExpirySweep),
            s => Err(ConversionError::new("actor", s)),
        }
    }
}

//--------------------------------------   StatusTransition    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub from: InvoiceStatusType,
    pub to: InvoiceStatusType,
    pub trigger: InvoiceTrigger,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    pub actor: Actor,
    pub metadata: Option<serde_json::Value>,
}

//--------------------------------------        Payment        ---------------------------------------------------------
/// A single on-chain transfer towards an invoice.
///
/// `status`, `confirmations` and `confirmed_at` are driven exclusively by the payment state machine in
/// [`crate::fsm`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub invoice_id: InvoiceId,
    pub tx_hash: String,
    pub amount: Money,
    pub from_address: String,
    pub to_address: String,
    pub(crate) status: PaymentStatus,
    pub(crate) confirmations: u32,
    pub required_confirmations: u32,
    pub detected_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    pub(crate) confirmed_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn confirmations(&self) -> u32 {
        self.confirmations
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn confirmed_at(&self) -> Option<DateTime<Utc>> {
        self.confirmed_at
    }
}

//--------------------------------------        Invoice        ---------------------------------------------------------
/// The invoice aggregate.
///
/// The creation-time fields are public and never change after the invoice is issued. The lifecycle fields
/// (`status`, `updated_at`, `paid_at`, `viewed_at`) are only ever changed by firing a trigger through the invoice state
/// machine, see [`crate::fsm`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub merchant_id: String,
    pub title: String,
    pub description: String,
    pub items: Vec<InvoiceItem>,
    pub pricing: InvoicePricing,
    pub crypto_currency: Currency,
    pub payment_address: PaymentAddress,
    pub exchange_rate: ExchangeRate,
    pub payment_tolerance: PaymentTolerance,
    pub(crate) expiration: InvoiceExpiration,
    pub created_at: DateTime<Utc>,
    pub customer_id: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub(crate) status: InvoiceStatusType,
    pub(crate) updated_at: DateTime<Utc>,
    pub(crate) paid_at: Option<DateTime<Utc>>,
    pub(crate) viewed_at: Option<DateTime<Utc>>,
    pub(crate) payments: Vec<Payment>,
    pub(crate) transitions: Vec<StatusTransition>,
    /// Optimistic concurrency counter. Bumped by the repository on every successful update.
    pub(crate) version: i64,
}

impl Invoice {
    pub fn status(&self) -> InvoiceStatusType {
        self.status
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn viewed_at(&self) -> Option<DateTime<Utc>> {
        self.viewed_at
    }

    pub fn expiration(&self) -> &InvoiceExpiration {
        &self.expiration
    }

    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    pub fn transitions(&self) -> &[StatusTransition] {
        &self.transitions
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn is_paid(&self) -> bool {
        self.status.is_paid()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration.is_expired(now)
    }

    /// The amount of `crypto_currency` the customer has to send, i.e. the invoice total at the locked-in rate.
    pub fn required_amount(&self) -> Result<Money, MoneyError> {
        self.exchange_rate.convert(&self.pricing.total)
    }

    /// The sum of every payment that has not failed or been orphaned.
    pub fn received_amount(&self) -> Result<Money, MoneyError> {
        let active = self.payments.iter().filter(|p| p.status.counts_towards_total()).map(|p| &p.amount);
        Money::sum(self.crypto_currency, active)
    }

    pub fn payment_by_tx_hash(&self, tx_hash: &str) -> Option<&Payment> {
        self.payments.iter().find(|p| p.tx_hash == tx_hash)
    }

    pub(crate) fn payment_by_tx_hash_mut(&mut self, tx_hash: &str) -> Option<&mut Payment> {
        self.payments.iter_mut().find(|p| p.tx_hash == tx_hash)
    }

    pub(crate) fn add_payment(&mut self, payment: Payment) {
        self.payments.push(payment);
    }

    /// True when at least one payment counts towards the total and every such payment is confirmed.
    pub fn all_payments_confirmed(&self) -> bool {
        let mut active = self.payments.iter().filter(|p| p.status.counts_towards_total()).peekable();
        active.peek().is_some() && active.all(|p| p.status == PaymentStatus::Confirmed)
    }

    pub(crate) fn record_transition(&mut self, transition: StatusTransition) {
        self.transitions.push(transition);
    }

    /// Replaces the expiry window. Only used for extensions and testing. The state machine never touches the
    /// expiration.
    pub fn reissue_expiration(&mut self, expiration: InvoiceExpiration) {
        self.expiration = expiration;
    }
}
