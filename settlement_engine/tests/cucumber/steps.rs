use std::str::FromStr;

use chrono::{Duration, Utc};
use cucumber::{then, when};
use rust_decimal::Decimal;
use settlement_common::{Currency, Money};
use settlement_engine::{
    db_types::{InvoiceStatusType, PaymentStatus},
    fsm::InvoiceTrigger,
    settlement_api::{
        invoice_objects::{InvoiceExpiration, NewInvoice, NewInvoiceItem},
        payment_objects::NewPayment,
    },
    InvoiceRepository,
    SettlementError,
};

use crate::cucumber::SettlementWorld;

fn money(amount: &str, currency: &str) -> Money {
    let currency = Currency::from_str(currency).expect("Not a valid currency");
    Money::parse(amount, currency).expect("Not a valid amount")
}

/// Reloads the invoice so that later steps see the stored copy.
async fn refresh(world: &mut SettlementWorld, alias: &str) {
    let id = world.invoice(alias).id.clone();
    let invoice = world.api().fetch_invoice(&id).await.expect("Error fetching invoice");
    world.invoices.insert(alias.to_string(), invoice);
}

#[when(expr = "I issue invoice {word} for {word} {word} payable in {word}")]
async fn issue_invoice(world: &mut SettlementWorld, alias: String, amount: String, fiat: String, crypto: String) {
    let fiat = Currency::from_str(&fiat).expect("Not a valid currency");
    let crypto = Currency::from_str(&crypto).expect("Not a valid currency");
    let price = Decimal::from_str(&amount).expect("Not a valid amount");
    let request = NewInvoice::new("merchant-1", alias.as_str(), fiat, crypto)
        .with_item(NewInvoiceItem::new("Goods", Decimal::ONE, price));
    let result = world.api().create_invoice(request).await;
    if let Some(invoice) = world.record(result) {
        world.invoices.insert(alias, invoice);
    }
}

#[when(expr = "the customer views invoice {word}")]
async fn view_invoice(world: &mut SettlementWorld, alias: String) {
    let id = world.invoice(&alias).id.clone();
    let result = world.api().mark_viewed(&id).await;
    world.record(result);
    refresh(world, &alias).await;
}

#[when(expr = "a payment [{word}] of {word} {word} arrives for invoice {word}")]
async fn payment_arrives(world: &mut SettlementWorld, tx_hash: String, amount: String, currency: String, alias: String) {
    let invoice = world.invoice(&alias);
    let id = invoice.id.clone();
    let to_address = invoice.payment_address.address.as_str();
    let signal = NewPayment::new(tx_hash.as_str(), money(&amount, &currency), "customer-wallet", to_address);
    let result = world.api().process_payment(&id, signal).await;
    world.record(result);
    refresh(world, &alias).await;
}

#[when(expr = "payment [{word}] on invoice {word} reaches {int} confirmations")]
async fn confirmations(world: &mut SettlementWorld, tx_hash: String, alias: String, count: u32) {
    let id = world.invoice(&alias).id.clone();
    let result = world.api().update_confirmations(&id, &tx_hash, count).await;
    world.record(result);
    refresh(world, &alias).await;
}

#[when(expr = "payment [{word}] on invoice {word} is reorganised away")]
async fn reorg(world: &mut SettlementWorld, tx_hash: String, alias: String) {
    let id = world.invoice(&alias).id.clone();
    let result = world.api().handle_reorg(&id, &tx_hash).await;
    world.record(result);
    refresh(world, &alias).await;
}

#[when(expr = "payment [{word}] on invoice {word} fails")]
async fn payment_fails(world: &mut SettlementWorld, tx_hash: String, alias: String) {
    let id = world.invoice(&alias).id.clone();
    let result = world.api().fail_payment(&id, &tx_hash, "Rejected by the network").await;
    world.record(result);
    refresh(world, &alias).await;
}

#[when(expr = "the merchant cancels invoice {word}")]
async fn cancel(world: &mut SettlementWorld, alias: String) {
    let id = world.invoice(&alias).id.clone();
    let result = world.api().cancel(&id, "Cancelled by the merchant").await;
    world.record(result);
    refresh(world, &alias).await;
}

#[when(expr = "the merchant refunds invoice {word}")]
async fn refund(world: &mut SettlementWorld, alias: String) {
    let id = world.invoice(&alias).id.clone();
    let result = world.api().refund(&id, "Goods returned").await;
    world.record(result);
    refresh(world, &alias).await;
}

#[when(expr = "an administrator moves invoice {word} to {word}")]
async fn admin_update(world: &mut SettlementWorld, alias: String, status: String) {
    let id = world.invoice(&alias).id.clone();
    let target = InvoiceStatusType::from_str(&status).expect("Not a valid invoice status");
    let result = world.api().update_status(&id, target, "Manual override").await;
    world.record(result);
    refresh(world, &alias).await;
}

#[when(expr = "invoice {word} passes its expiry time")]
async fn backdate(world: &mut SettlementWorld, alias: String) {
    let mut invoice = world.invoice(&alias).clone();
    invoice.reissue_expiration(InvoiceExpiration::from_parts(Utc::now() - Duration::minutes(1), 3600));
    let db = world.api().db();
    let updated = db.update(&invoice).await.expect("Error backdating invoice");
    world.invoices.insert(alias, updated);
}

#[when(expr = "the expiry window of invoice {word} is extended by {int} minutes")]
async fn extend(world: &mut SettlementWorld, alias: String, minutes: i64) {
    let id = world.invoice(&alias).id.clone();
    let result = world.api().extend_expiration(&id, Duration::minutes(minutes)).await;
    world.record(result);
    refresh(world, &alias).await;
}

#[when("the expiry sweep runs")]
async fn sweep(world: &mut SettlementWorld) {
    let result = world.api().sweep_expired().await;
    world.record(result);
    let aliases = world.invoices.keys().cloned().collect::<Vec<_>>();
    for alias in aliases {
        refresh(world, &alias).await;
    }
}

#[then(expr = "invoice {word} is {word}")]
async fn check_status(world: &mut SettlementWorld, alias: String, status: String) {
    let expected = InvoiceStatusType::from_str(&status).expect("Not a valid invoice status");
    assert_eq!(world.invoice(&alias).status(), expected);
}

#[then(expr = "invoice {word} asks for {word} {word}")]
async fn check_required(world: &mut SettlementWorld, alias: String, amount: String, currency: String) {
    let required = world.invoice(&alias).required_amount().expect("Error calculating the required amount");
    assert_eq!(required, money(&amount, &currency));
}

#[then(expr = "invoice {word} has received {word} {word}")]
async fn check_received(world: &mut SettlementWorld, alias: String, amount: String, currency: String) {
    let received = world.invoice(&alias).received_amount().expect("Error calculating the received amount");
    assert_eq!(received, money(&amount, &currency));
}

#[then(expr = "invoice {word} has {int} payment(s)")]
async fn check_payment_count(world: &mut SettlementWorld, alias: String, count: usize) {
    assert_eq!(world.invoice(&alias).payments().len(), count);
}

#[then(expr = "payment [{word}] on invoice {word} is {word}")]
async fn check_payment_status(world: &mut SettlementWorld, tx_hash: String, alias: String, status: String) {
    let expected = PaymentStatus::from_str(&status).expect("Not a valid payment status");
    let payment = world.invoice(&alias).payment_by_tx_hash(&tx_hash).expect("No such payment");
    assert_eq!(payment.status(), expected);
}

#[then(expr = "the history of invoice {word} is {string}")]
async fn check_history(world: &mut SettlementWorld, alias: String, history: String) {
    let expected = history
        .split(',')
        .map(|t| InvoiceTrigger::from_str(t).expect("Not a valid trigger"))
        .collect::<Vec<_>>();
    let actual = world.invoice(&alias).transitions().iter().map(|t| t.trigger).collect::<Vec<_>>();
    assert_eq!(actual, expected);
}

#[then("the payment is rejected as an underpayment")]
async fn check_underpayment(world: &mut SettlementWorld) {
    assert!(
        matches!(world.last_error, Some(SettlementError::Underpayment { .. })),
        "Expected an underpayment, got {:?}",
        world.last_error
    );
}

#[then(expr = "the last step fails with {string}")]
async fn check_error(world: &mut SettlementWorld, message: String) {
    let err = world.last_error.as_ref().expect("The last step succeeded");
    assert!(err.to_string().contains(&message), "'{err}' does not mention '{message}'");
}

#[then("the last step succeeds")]
async fn check_success(world: &mut SettlementWorld) {
    assert!(world.last_error.is_none(), "Unexpected error: {:?}", world.last_error);
}
