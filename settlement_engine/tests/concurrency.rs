use std::sync::Arc;

use futures_util::future::join_all;
use log::*;
use settlement_engine::{
    db_types::{InvoiceStatusType, PaymentStatus},
    events::SettlementEventType,
    fsm::InvoiceTrigger,
};

use crate::support::{backdate_expiry, btc, btc_invoice, payment, setup};

mod support;

const NUM_INVOICES: usize = 20;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_full_payments_complete_once() {
    let (api, bus) = setup();
    let api = Arc::new(api);
    let invoice = api.create_invoice(btc_invoice()).await.unwrap();
    let jobs = ["tx-a", "tx-b"].map(|tx| {
        let api = Arc::clone(&api);
        let signal = payment(&invoice, tx, btc("0.0016"));
        let id = invoice.id.clone();
        tokio::spawn(async move { api.process_payment(&id, signal).await })
    });
    let results = join_all(jobs).await.into_iter().map(|job| job.unwrap().unwrap()).collect::<Vec<_>>();
    // Whichever payment lands second finds the invoice already confirming and is turned away
    assert_eq!(results.iter().filter(|r| r.recorded).count(), 1);
    let invoice = api.fetch_invoice(&invoice.id).await.unwrap();
    assert_eq!(invoice.status(), InvoiceStatusType::Confirming);
    assert_eq!(invoice.payments().len(), 1);
    let completed = invoice.transitions().iter().filter(|t| t.trigger == InvoiceTrigger::Completed).count();
    assert_eq!(completed, 1);
    assert_eq!(bus.count(SettlementEventType::InvoiceStatusChanged), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn payment_racing_the_sweep_leaves_a_consistent_invoice() {
    let (api, _) = setup();
    let api = Arc::new(api);
    let mut invoices = Vec::with_capacity(NUM_INVOICES);
    for _ in 0..NUM_INVOICES {
        let invoice = api.create_invoice(btc_invoice()).await.unwrap();
        backdate_expiry(&api, &invoice.id).await;
        invoices.push(invoice);
    }
    info!("🚀️ Racing {NUM_INVOICES} payments against an expiry sweep");
    let sweeper = {
        let api = Arc::clone(&api);
        tokio::spawn(async move { api.sweep_expired().await })
    };
    let payers = invoices.iter().map(|invoice| {
        let api = Arc::clone(&api);
        let id = invoice.id.clone();
        let signal = payment(invoice, "tx1", btc("0.0016"));
        tokio::spawn(async move { api.process_payment(&id, signal).await })
    });
    let payments = join_all(payers).await;
    let sweep = sweeper.await.unwrap().unwrap();
    // Invoices paid between the sweep's query and its turn on the lock are reported as failures
    assert_eq!(sweep.expired.len() + sweep.skipped.len() + sweep.failed.len(), NUM_INVOICES);
    for (invoice, paid) in invoices.iter().zip(payments) {
        let paid = paid.unwrap().unwrap();
        let stored = api.fetch_invoice(&invoice.id).await.unwrap();
        match stored.status() {
            InvoiceStatusType::Confirming => {
                assert!(paid.recorded);
                assert_eq!(stored.payments().len(), 1);
                assert_eq!(stored.payments()[0].status(), PaymentStatus::Detected);
                assert!(!sweep.expired.contains(&invoice.id));
            },
            InvoiceStatusType::Expired => {
                assert!(!paid.recorded);
                assert!(stored.payments().is_empty());
                assert!(sweep.expired.contains(&invoice.id));
            },
            status => panic!("Invoice {} ended up {status}", invoice.id),
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn an_invoice_is_viewed_exactly_once() {
    let (api, bus) = setup();
    let api = Arc::new(api);
    let invoice = api.create_invoice(btc_invoice()).await.unwrap();
    let viewers = (0..8).map(|_| {
        let api = Arc::clone(&api);
        let id = invoice.id.clone();
        tokio::spawn(async move { api.mark_viewed(&id).await })
    });
    let results = join_all(viewers).await.into_iter().map(|r| r.unwrap()).collect::<Vec<_>>();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let stored = api.fetch_invoice(&invoice.id).await.unwrap();
    assert_eq!(stored.version(), 1);
    assert_eq!(stored.transitions().len(), 1);
    assert_eq!(bus.count(SettlementEventType::InvoiceStatusChanged), 1);
}
