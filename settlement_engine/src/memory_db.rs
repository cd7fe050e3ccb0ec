//! An in-memory [`InvoiceRepository`], with the same optimistic versioning semantics as the SQLite backend.
//!
//! Cloning a `MemoryDatabase` yields a handle to the same store.
use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use log::*;
use tokio::sync::RwLock;

use crate::{
    db_types::{Invoice, InvoiceId, InvoiceStatusType},
    traits::{InvoiceRepository, RepositoryError},
};

#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    invoices: Arc<RwLock<HashMap<InvoiceId, Invoice>>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.invoices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.invoices.read().await.is_empty()
    }

    async fn select<F>(&self, predicate: F) -> Vec<Invoice>
    where F: Fn(&Invoice) -> bool {
        let invoices = self.invoices.read().await;
        let mut result = invoices.values().filter(|i| predicate(i)).cloned().collect::<Vec<_>>();
        result.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        result
    }
}

impl InvoiceRepository for MemoryDatabase {
    async fn save(&self, invoice: &Invoice) -> Result<(), RepositoryError> {
        let mut invoices = self.invoices.write().await;
        if invoices.contains_key(&invoice.id) {
            return Err(RepositoryError::InvoiceAlreadyExists(invoice.id.clone()));
        }
        invoices.insert(invoice.id.clone(), invoice.clone());
        trace!("🗃️ Invoice {} stored in memory", invoice.id);
        Ok(())
    }

    async fn find_by_id(&self, id: &InvoiceId) -> Result<Invoice, RepositoryError> {
        self.invoices.read().await.get(id).cloned().ok_or_else(|| RepositoryError::InvoiceNotFound(id.clone()))
    }

    async fn find_by_payment_address(&self, address: &str) -> Result<Invoice, RepositoryError> {
        self.invoices
            .read()
            .await
            .values()
            .find(|i| i.payment_address.address == address)
            .cloned()
            .ok_or_else(|| RepositoryError::AddressNotFound(address.to_string()))
    }

    async fn find_by_status(&self, status: InvoiceStatusType) -> Result<Vec<Invoice>, RepositoryError> {
        Ok(self.select(|i| i.status() == status).await)
    }

    async fn find_active(&self) -> Result<Vec<Invoice>, RepositoryError> {
        Ok(self.select(|i| i.is_active()).await)
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<Invoice>, RepositoryError> {
        Ok(self.select(|i| i.is_active() && i.is_expired(now)).await)
    }

    async fn update(&self, invoice: &Invoice) -> Result<Invoice, RepositoryError> {
        let mut invoices = self.invoices.write().await;
        let stored = invoices.get_mut(&invoice.id).ok_or_else(|| RepositoryError::InvoiceNotFound(invoice.id.clone()))?;
        if stored.version != invoice.version {
            return Err(RepositoryError::VersionConflict {
                id: invoice.id.clone(),
                expected: invoice.version,
                found: stored.version,
            });
        }
        let mut updated = invoice.clone();
        updated.version += 1;
        *stored = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, id: &InvoiceId) -> Result<(), RepositoryError> {
        self.invoices.write().await.remove(id).map(|_| ()).ok_or_else(|| RepositoryError::InvoiceNotFound(id.clone()))
    }

    async fn exists(&self, id: &InvoiceId) -> Result<bool, RepositoryError> {
        Ok(self.invoices.read().await.contains_key(id))
    }
}

#[cfg(test)]
mod test {
    use chrono::Duration;

    use super::*;
    use crate::test_utils::fixtures::invoice_in;

    #[tokio::test]
    async fn save_and_find() {
        let db = MemoryDatabase::new();
        let now = Utc::now();
        let invoice = invoice_in(InvoiceStatusType::Created, now);
        db.save(&invoice).await.unwrap();
        assert!(db.exists(&invoice.id).await.unwrap());
        assert_eq!(db.find_by_id(&invoice.id).await.unwrap(), invoice);
        let by_address = db.find_by_payment_address(&invoice.payment_address.address).await.unwrap();
        assert_eq!(by_address.id, invoice.id);
        let err = db.save(&invoice).await.unwrap_err();
        assert_eq!(err, RepositoryError::InvoiceAlreadyExists(invoice.id.clone()));
    }

    #[tokio::test]
    async fn not_found_is_distinct() {
        let db = MemoryDatabase::new();
        let id = InvoiceId::from("inv_missing");
        assert!(db.find_by_id(&id).await.unwrap_err().is_not_found());
        assert!(db.find_by_payment_address("nowhere").await.unwrap_err().is_not_found());
        assert!(db.delete(&id).await.unwrap_err().is_not_found());
        assert!(!db.exists(&id).await.unwrap());
    }

    #[tokio::test]
    async fn stale_updates_are_rejected() {
        let db = MemoryDatabase::new();
        let invoice = invoice_in(InvoiceStatusType::Pending, Utc::now());
        db.save(&invoice).await.unwrap();
        let first = db.update(&invoice).await.unwrap();
        assert_eq!(first.version(), invoice.version() + 1);
        let err = db.update(&invoice).await.unwrap_err();
        assert!(matches!(err, RepositoryError::VersionConflict { expected: 0, found: 1, .. }));
        let second = db.update(&first).await.unwrap();
        assert_eq!(second.version(), 2);
    }

    #[tokio::test]
    async fn queries() {
        let db = MemoryDatabase::new();
        let now = Utc::now();
        let created = invoice_in(InvoiceStatusType::Created, now - Duration::hours(3));
        let pending = invoice_in(InvoiceStatusType::Pending, now);
        let cancelled = invoice_in(InvoiceStatusType::Cancelled, now - Duration::hours(3));
        for i in [&created, &pending, &cancelled] {
            db.save(i).await.unwrap();
        }
        assert_eq!(db.len().await, 3);
        assert_eq!(db.find_active().await.unwrap().len(), 2);
        assert_eq!(db.find_by_status(InvoiceStatusType::Cancelled).await.unwrap()[0].id, cancelled.id);
        let expired = db.find_expired(now).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, created.id);
        db.delete(&created.id).await.unwrap();
        assert_eq!(db.len().await, 2);
    }
}
