use std::fmt::{Debug, Display};

use chrono::{DateTime, Duration, Utc};
use log::*;
use serde_json::{json, Value};
use settlement_common::{Money, MoneyError};

use crate::{
    db_types::{Actor, Invoice, InvoiceId, InvoiceStatusType, Payment, PaymentStatus, StatusTransition},
    events::SettlementEvent,
    fsm::{trigger_for, GuardContext, InvoiceTrigger, PaymentStatusChange, Transition},
    settlement_api::{
        errors::{SettlementError, ValidationError},
        invoice_locks::InvoiceLocks,
        invoice_objects::{InvoiceDefaults, NewInvoice},
        payment_objects::{NewPayment, PaymentClassification},
    },
    traits::{EventBus, ExchangeRateProvider, InvoiceRepository, PaymentAddressProvider},
};

//--------------------------------------       Outcomes        ---------------------------------------------------------
/// The result of feeding a payment signal to an invoice.
#[derive(Debug, Clone)]
pub struct PaymentProcessed {
    pub invoice: Invoice,
    pub classification: PaymentClassification,
    pub transitions: Vec<Transition>,
    /// False when the signal was ignored: a re-delivered transaction, or an invoice that is already closed.
    pub recorded: bool,
}

/// The result of a confirmation count update.
#[derive(Debug, Clone)]
pub struct ConfirmationUpdate {
    pub invoice: Invoice,
    /// `None` when the new count did not move the payment on.
    pub payment_change: Option<PaymentStatusChange>,
    pub transitions: Vec<Transition>,
}

/// A summary of one expiry sweep.
#[derive(Debug, Default)]
pub struct SweepResult {
    pub expired: Vec<InvoiceId>,
    /// Past their expiry time, but not eligible to expire, e.g. because they hold a partial payment.
    pub skipped: Vec<InvoiceId>,
    pub failed: Vec<(InvoiceId, SettlementError)>,
}

impl SweepResult {
    pub fn total(&self) -> usize {
        self.expired.len() + self.skipped.len() + self.failed.len()
    }
}

impl Display for SweepResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} expired, {} skipped, {} failed", self.expired.len(), self.skipped.len(), self.failed.len())
    }
}

/// Who is making a change, and why. Stamped on every transition the change produces.
struct ChangeContext {
    actor: Actor,
    reason: String,
    metadata: Option<Value>,
}

impl ChangeContext {
    fn new<S: Into<String>>(actor: Actor, reason: S) -> Self {
        Self { actor, reason: reason.into(), metadata: None }
    }

    fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

//--------------------------------------   SettlementFlowApi   ---------------------------------------------------------
/// `SettlementFlowApi` drives invoices through their lifecycle in response to merchant, customer and blockchain
/// signals.
///
/// Every mutating call is a transaction over a single invoice: the invoice is locked, loaded, changed through the
/// state machines, and written back with an optimistic version check. Events are only published once the change has
/// been stored, and a failure to publish is logged rather than returned.
pub struct SettlementFlowApi<B, R, A, E> {
    db: B,
    rates: R,
    addresses: A,
    events: E,
    locks: InvoiceLocks,
    defaults: InvoiceDefaults,
}

impl<B, R, A, E> Debug for SettlementFlowApi<B, R, A, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementFlowApi ({} invoices locked)", self.locks.len())
    }
}

impl<B, R, A, E> SettlementFlowApi<B, R, A, E> {
    pub fn new(db: B, rates: R, addresses: A, events: E) -> Self {
        Self { db, rates, addresses, events, locks: InvoiceLocks::new(), defaults: InvoiceDefaults::default() }
    }

    pub fn with_defaults(mut self, defaults: InvoiceDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn defaults(&self) -> &InvoiceDefaults {
        &self.defaults
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, R, A, E> SettlementFlowApi<B, R, A, E>
where
    B: InvoiceRepository,
    R: ExchangeRateProvider,
    A: PaymentAddressProvider,
    E: EventBus,
{
    /// Issues a new invoice.
    ///
    /// The request is validated before either collaborator is called. The exchange rate and payment address are then
    /// fetched, checked for freshness, and locked into the invoice, which is stored in `Created` status.
    pub async fn create_invoice(&self, request: NewInvoice) -> Result<Invoice, SettlementError> {
        request.validate()?;
        let id = InvoiceId::random();
        let rate = self.rates.fetch_rate(request.currency, request.crypto_currency).await?;
        let address = self.addresses.generate_address(&id, request.crypto_currency).await?;
        let invoice = request.into_invoice(id, rate, address, &self.defaults, Utc::now())?;
        self.db.save(&invoice).await?;
        info!(
            "🧾️ Invoice {} created for {}. Pay {} to {}",
            invoice.id,
            invoice.pricing.total,
            invoice.required_amount().map(|m| m.to_string()).unwrap_or_default(),
            invoice.payment_address
        );
        self.publish(SettlementEvent::invoice_created(&invoice));
        Ok(invoice)
    }

    /// The customer has opened the invoice. Only a `Created` invoice that has never been viewed can be marked.
    pub async fn mark_viewed(&self, id: &InvoiceId) -> Result<Invoice, SettlementError> {
        let ctx = ChangeContext::new(Actor::Customer, "Invoice viewed");
        let (invoice, _, _) = self
            .modify_invoice(id, &ctx, |invoice, now| {
                let t = invoice.fire(InvoiceTrigger::Viewed, &GuardContext::at(now))?;
                Ok((vec![t], ()))
            })
            .await?;
        Ok(invoice)
    }

    /// Records a payment against an invoice and moves the invoice on according to the cumulative amount received.
    ///
    /// * Payments short by more than the underpayment tolerance are rejected, and nothing is recorded.
    /// * A payment within tolerance moves a `Pending` invoice to `Partial`.
    /// * Once the full amount has arrived, a `Pending` or `Partial` invoice moves to `Confirming`.
    /// * A payment that arrives before the invoice was viewed marks it as viewed first.
    /// * Re-delivered transactions are ignored, as are new transactions to invoices that are `Confirming`, `Paid` or
    ///   closed. A transaction that was orphaned by a reorg is picked up again.
    ///
    /// If the signal already carries enough confirmations, the invoice may go all the way to `Paid`.
    pub async fn process_payment(
        &self,
        id: &InvoiceId,
        payment: NewPayment,
    ) -> Result<PaymentProcessed, SettlementError> {
        if payment.amount.is_zero() {
            return Err(ValidationError::ZeroPayment.into());
        }
        let metadata = json!({ "tx_hash": payment.tx_hash, "amount": payment.amount.to_fixed_string() });
        let ctx = ChangeContext::new(Actor::System, format!("Payment {} of {}", payment.tx_hash, payment.amount))
            .with_metadata(metadata);
        let (invoice, transitions, (classification, recorded)) =
            self.modify_invoice(id, &ctx, |invoice, now| apply_payment(invoice, &payment, now)).await?;
        if recorded {
            info!("💰️ Payment {} on invoice {} is {classification}", payment.tx_hash, invoice.id);
        } else {
            debug!("💰️ Payment {} on invoice {} was ignored", payment.tx_hash, invoice.id);
        }
        Ok(PaymentProcessed { invoice, classification, transitions, recorded })
    }

    /// Records a new confirmation count for one of the invoice's payments. When every payment that counts towards the
    /// total is confirmed, a `Confirming` invoice becomes `Paid`.
    pub async fn update_confirmations(
        &self,
        id: &InvoiceId,
        tx_hash: &str,
        confirmations: u32,
    ) -> Result<ConfirmationUpdate, SettlementError> {
        let ctx = ChangeContext::new(Actor::System, format!("Payment {tx_hash} has {confirmations} confirmations"))
            .with_metadata(json!({ "tx_hash": tx_hash, "confirmations": confirmations }));
        let (invoice, transitions, payment_change) = self
            .modify_invoice(id, &ctx, |invoice, now| {
                let change = payment_mut(invoice, tx_hash)?.update_confirmations(confirmations, now)?;
                let transitions = settle_if_confirmed(invoice, now)?;
                Ok((transitions, change))
            })
            .await?;
        if let Some(change) = payment_change {
            debug!("💰️ Payment {tx_hash} on invoice {id} moved from {} to {}", change.from, change.to);
        }
        Ok(ConfirmationUpdate { invoice, payment_change, transitions })
    }

    /// A block reorganisation removed the payment's transaction from the chain. The payment is orphaned, and an
    /// invoice that was waiting for confirmations goes back to `Pending`.
    pub async fn handle_reorg(&self, id: &InvoiceId, tx_hash: &str) -> Result<Invoice, SettlementError> {
        let ctx = ChangeContext::new(Actor::System, format!("Payment {tx_hash} was reorganised out of the chain"))
            .with_metadata(json!({ "tx_hash": tx_hash }));
        let (invoice, _, _) = self
            .modify_invoice(id, &ctx, |invoice, now| {
                payment_mut(invoice, tx_hash)?.orphan(now)?;
                let mut transitions = Vec::new();
                if invoice.status() == InvoiceStatusType::Confirming {
                    transitions.push(invoice.fire(InvoiceTrigger::Reorg, &GuardContext::at(now))?);
                }
                Ok((transitions, ()))
            })
            .await?;
        warn!("💰️ Payment {tx_hash} on invoice {id} was orphaned. The invoice is now {}", invoice.status());
        Ok(invoice)
    }

    /// Marks a payment as failed. If the invoice was waiting for confirmations and the remaining payments no longer
    /// cover the required amount, it goes back to `Pending`.
    ///
    /// A `Partial` invoice keeps its status even when nothing live is left on it. It still accepts new payments, is
    /// skipped by the expiry sweep and can be cancelled by the merchant.
    pub async fn fail_payment(&self, id: &InvoiceId, tx_hash: &str, reason: &str) -> Result<Invoice, SettlementError> {
        let ctx = ChangeContext::new(Actor::System, format!("Payment {tx_hash} failed: {reason}"))
            .with_metadata(json!({ "tx_hash": tx_hash }));
        let (invoice, _, _) = self
            .modify_invoice(id, &ctx, |invoice, now| {
                payment_mut(invoice, tx_hash)?.fail(now)?;
                let mut transitions = Vec::new();
                if invoice.status() == InvoiceStatusType::Confirming {
                    if classify_received(invoice)?.is_sufficient() {
                        transitions.extend(settle_if_confirmed(invoice, now)?);
                    } else {
                        transitions.push(invoice.fire(InvoiceTrigger::Reorg, &GuardContext::at(now))?);
                    }
                }
                Ok((transitions, ()))
            })
            .await?;
        warn!("💰️ Payment {tx_hash} on invoice {id} failed ({reason}). The invoice is now {}", invoice.status());
        if invoice.status() == InvoiceStatusType::Partial && invoice.received_amount()?.is_zero() {
            warn!(
                "💰️ Invoice {id} has no live payments left but cannot return to Pending or expire. It stays open for \
                 a new payment until the merchant cancels it."
            );
        }
        Ok(invoice)
    }

    /// Cancels any invoice that is not already in a terminal state. Partial payments do not prevent cancellation.
    pub async fn cancel(&self, id: &InvoiceId, reason: &str) -> Result<Invoice, SettlementError> {
        let ctx = ChangeContext::new(Actor::Merchant, reason);
        self.fire_on(id, InvoiceTrigger::Cancelled, &ctx, GuardContext::at).await
    }

    pub async fn refund(&self, id: &InvoiceId, reason: &str) -> Result<Invoice, SettlementError> {
        let ctx = ChangeContext::new(Actor::Merchant, reason);
        self.fire_on(id, InvoiceTrigger::Refunded, &ctx, GuardContext::at).await
    }

    /// Expires the invoice if it is past its expiry time and holds no partial payment.
    pub async fn check_and_expire(&self, id: &InvoiceId) -> Result<Invoice, SettlementError> {
        let ctx = ChangeContext::new(Actor::System, "Invoice expired");
        self.fire_on(id, InvoiceTrigger::Expired, &ctx, GuardContext::at).await
    }

    /// Expires the invoice now, whatever its expiry time. Invoices holding a partial payment still cannot expire.
    pub async fn force_expire(&self, id: &InvoiceId, reason: &str) -> Result<Invoice, SettlementError> {
        let ctx = ChangeContext::new(Actor::Admin, reason);
        self.fire_on(id, InvoiceTrigger::Expired, &ctx, |now| GuardContext::at(now).bypass_expiry()).await
    }

    /// Expires every eligible invoice that is past its expiry time.
    ///
    /// Each invoice is handled on its own: a failure is logged and recorded in the result, and the sweep moves on.
    pub async fn sweep_expired(&self) -> Result<SweepResult, SettlementError> {
        let now = Utc::now();
        let candidates = self.db.find_expired(now).await?;
        let mut result = SweepResult::default();
        let ctx = ChangeContext::new(Actor::ExpirySweep, "Expiry sweep");
        for invoice in candidates {
            if !invoice.can_fire(InvoiceTrigger::Expired, &GuardContext::at(now)) {
                debug!("🕰️ Invoice {} is past its expiry time, but is {}. Skipping", invoice.id, invoice.status());
                result.skipped.push(invoice.id);
                continue;
            }
            match self.fire_on(&invoice.id, InvoiceTrigger::Expired, &ctx, GuardContext::at).await {
                Ok(_) => result.expired.push(invoice.id),
                Err(e) => {
                    warn!("🕰️ Could not expire invoice {}. {e}", invoice.id);
                    result.failed.push((invoice.id, e));
                },
            }
        }
        if result.total() > 0 {
            info!("🕰️ Expiry sweep complete: {result}");
        }
        Ok(result)
    }

    /// Administrative override. Moves the invoice to `target` using the one trigger that connects the two statuses.
    /// All guards apply, and multi-step paths are never taken.
    pub async fn update_status(
        &self,
        id: &InvoiceId,
        target: InvoiceStatusType,
        reason: &str,
    ) -> Result<Invoice, SettlementError> {
        let ctx = ChangeContext::new(Actor::Admin, reason);
        let (invoice, _, _) = self
            .modify_invoice(id, &ctx, |invoice, now| {
                let from = invoice.status();
                let trigger = trigger_for(from, target).ok_or(SettlementError::NoDirectTransition { from, to: target })?;
                let t = invoice.fire(trigger, &GuardContext::at(now))?;
                Ok((vec![t], ()))
            })
            .await?;
        info!("🧾️ Invoice {id} moved to {target} by an administrator: {reason}");
        Ok(invoice)
    }

    /// Restarts the expiry window of an open invoice, `duration` from now.
    pub async fn extend_expiration(&self, id: &InvoiceId, duration: Duration) -> Result<Invoice, SettlementError> {
        let ctx = ChangeContext::new(Actor::Merchant, "Expiry extended");
        let (invoice, _, _) = self
            .modify_invoice(id, &ctx, |invoice, now| {
                let status = invoice.status();
                if status.is_terminal() || status == InvoiceStatusType::Paid {
                    return Err(SettlementError::InvoiceClosed(invoice.id.clone(), status));
                }
                let expiration = invoice.expiration().reissue(duration, now)?;
                invoice.reissue_expiration(expiration);
                Ok((Vec::new(), ()))
            })
            .await?;
        info!("🧾️ Invoice {id} now expires at {}", invoice.expiration().expires_at());
        Ok(invoice)
    }

    pub async fn fetch_invoice(&self, id: &InvoiceId) -> Result<Invoice, SettlementError> {
        Ok(self.db.find_by_id(id).await?)
    }

    pub async fn fetch_invoice_by_payment_address(&self, address: &str) -> Result<Invoice, SettlementError> {
        Ok(self.db.find_by_payment_address(address).await?)
    }

    pub async fn fetch_invoices_by_status(&self, status: InvoiceStatusType) -> Result<Vec<Invoice>, SettlementError> {
        Ok(self.db.find_by_status(status).await?)
    }

    pub async fn fetch_active_invoices(&self) -> Result<Vec<Invoice>, SettlementError> {
        Ok(self.db.find_active().await?)
    }

    async fn fire_on<G>(
        &self,
        id: &InvoiceId,
        trigger: InvoiceTrigger,
        ctx: &ChangeContext,
        guards: G,
    ) -> Result<Invoice, SettlementError>
    where G: FnOnce(DateTime<Utc>) -> GuardContext {
        let (invoice, _, _) = self
            .modify_invoice(id, ctx, |invoice, now| {
                if trigger != InvoiceTrigger::Cancelled && invoice.is_terminal() {
                    return Err(SettlementError::InvoiceClosed(invoice.id.clone(), invoice.status()));
                }
                let t = invoice.fire(trigger, &guards(now))?;
                Ok((vec![t], ()))
            })
            .await?;
        debug!("🧾️ Invoice {id} is now {} after {trigger}", invoice.status());
        Ok(invoice)
    }

    /// Locks, loads, changes, stores, and announces one invoice.
    ///
    /// `change` works on a private copy. If it fails, or leaves the invoice untouched, nothing is written.
    async fn modify_invoice<T, F>(
        &self,
        id: &InvoiceId,
        ctx: &ChangeContext,
        change: F,
    ) -> Result<(Invoice, Vec<Transition>, T), SettlementError>
    where
        F: FnOnce(&mut Invoice, DateTime<Utc>) -> Result<(Vec<Transition>, T), SettlementError>,
    {
        let _guard = self.locks.lock(id).await;
        let mut invoice = self.db.find_by_id(id).await?;
        let original = invoice.clone();
        let (transitions, value) = change(&mut invoice, Utc::now())?;
        if invoice == original {
            trace!("🧾️ Nothing changed on invoice {id}");
            return Ok((invoice, transitions, value));
        }
        for t in &transitions {
            invoice.record_transition(StatusTransition {
                from: t.from,
                to: t.to,
                trigger: t.trigger,
                timestamp: t.at,
                reason: ctx.reason.clone(),
                actor: ctx.actor,
                metadata: ctx.metadata.clone(),
            });
        }
        let invoice = self.db.update(&invoice).await?;
        for t in &transitions {
            info!("🧾️ Invoice {id}: {} -> {} ({}, by {})", t.from, t.to, t.trigger, ctx.actor);
            self.publish(SettlementEvent::status_changed(&invoice, t, &ctx.reason, ctx.actor));
        }
        Ok((invoice, transitions, value))
    }

    fn publish(&self, event: SettlementEvent) {
        let description = event.to_string();
        match self.events.publish(event) {
            Ok(()) => trace!("📬️ Published {description}"),
            Err(e) => warn!("📬️ Could not publish {description}. {e}"),
        }
    }
}

//--------------------------------------    Payment helpers    ---------------------------------------------------------
fn payment_mut<'a>(invoice: &'a mut Invoice, tx_hash: &str) -> Result<&'a mut Payment, SettlementError> {
    let invoice_id = invoice.id.clone();
    invoice
        .payment_by_tx_hash_mut(tx_hash)
        .ok_or_else(|| SettlementError::PaymentNotFound { invoice_id, tx_hash: tx_hash.to_string() })
}

/// Classifies everything the invoice has received so far.
fn classify_received(invoice: &Invoice) -> Result<PaymentClassification, MoneyError> {
    let received = invoice.received_amount()?;
    classify(invoice, &received)
}

fn classify(invoice: &Invoice, received: &Money) -> Result<PaymentClassification, MoneyError> {
    let required = invoice.required_amount()?;
    invoice.payment_tolerance.classify(&required, received, &invoice.exchange_rate)
}

/// Fires `Confirmed` when a `Confirming` invoice has no unconfirmed payments left.
fn settle_if_confirmed(invoice: &mut Invoice, now: DateTime<Utc>) -> Result<Vec<Transition>, SettlementError> {
    if invoice.status() == InvoiceStatusType::Confirming && invoice.all_payments_confirmed() {
        Ok(vec![invoice.fire(InvoiceTrigger::Confirmed, &GuardContext::at(now))?])
    } else {
        Ok(Vec::new())
    }
}

fn apply_payment(
    invoice: &mut Invoice,
    signal: &NewPayment,
    now: DateTime<Utc>,
) -> Result<(Vec<Transition>, (PaymentClassification, bool)), SettlementError> {
    signal.amount.ensure_same_currency(&Money::zero(invoice.crypto_currency)).map_err(ValidationError::from)?;
    let existing = invoice.payment_by_tx_hash(&signal.tx_hash).map(|p| p.status());
    // New transactions are only taken while the invoice is still waiting for money
    let awaiting_funds = matches!(
        invoice.status(),
        InvoiceStatusType::Created | InvoiceStatusType::Pending | InvoiceStatusType::Partial
    );
    let reviving = existing == Some(PaymentStatus::Orphaned)
        && (awaiting_funds || invoice.status() == InvoiceStatusType::Confirming);
    if reviving {
        payment_mut(invoice, &signal.tx_hash)?.redetect(now)?;
    }
    let received = match existing {
        Some(_) => invoice.received_amount()?,
        None => invoice.received_amount()?.checked_add(&signal.amount)?,
    };
    let classification = classify(invoice, &received)?;
    if !reviving && (existing.is_some() || !awaiting_funds) {
        return Ok((Vec::new(), (classification, false)));
    }
    if let PaymentClassification::Underpayment { shortfall, threshold } = classification {
        let required = invoice.required_amount()?;
        return Err(SettlementError::Underpayment { received, required, shortfall, threshold });
    }
    let ctx = GuardContext::at(now);
    let mut transitions = Vec::new();
    if invoice.status() == InvoiceStatusType::Created {
        transitions.push(invoice.fire(InvoiceTrigger::Viewed, &ctx)?);
    }
    if existing.is_none() {
        invoice.add_payment(Payment::detected(invoice.id.clone(), signal, now));
    }
    let payment = payment_mut(invoice, &signal.tx_hash)?;
    if signal.confirmations > 0 {
        payment.update_confirmations(signal.confirmations, now)?;
    }
    let trigger = match (&classification, invoice.status()) {
        (PaymentClassification::Sufficient { .. }, InvoiceStatusType::Pending | InvoiceStatusType::Partial) => {
            Some(InvoiceTrigger::Completed)
        },
        (PaymentClassification::Partial { .. }, InvoiceStatusType::Pending) => Some(InvoiceTrigger::Partial),
        _ => None,
    };
    if let Some(trigger) = trigger {
        transitions.push(invoice.fire(trigger, &ctx)?);
    }
    transitions.extend(settle_if_confirmed(invoice, now)?);
    Ok((transitions, (classification, true)))
}
