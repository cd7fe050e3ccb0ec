//! `SqliteDatabase` is a concrete implementation of a settlement engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements [`InvoiceRepository`]. Every write touches several
//! tables and runs inside a single transaction.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate::MigrateError, SqlitePool};

use super::db::{db_url, invoices, new_pool};
use crate::{
    db_types::{Invoice, InvoiceId, InvoiceStatusType},
    traits::{InvoiceRepository, RepositoryError},
};

const ACTIVE_STATUSES: [InvoiceStatusType; 5] = [
    InvoiceStatusType::Created,
    InvoiceStatusType::Pending,
    InvoiceStatusType::Partial,
    InvoiceStatusType::Confirming,
    InvoiceStatusType::Paid,
];

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl InvoiceRepository for SqliteDatabase {
    async fn save(&self, invoice: &Invoice) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        invoices::insert_invoice(invoice, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Invoice {} has been saved in the DB", invoice.id);
        Ok(())
    }

    async fn find_by_id(&self, id: &InvoiceId) -> Result<Invoice, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        invoices::fetch_invoice(id, &mut conn).await?.ok_or_else(|| RepositoryError::InvoiceNotFound(id.clone()))
    }

    async fn find_by_payment_address(&self, address: &str) -> Result<Invoice, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        invoices::fetch_invoice_by_address(address, &mut conn)
            .await?
            .ok_or_else(|| RepositoryError::AddressNotFound(address.to_string()))
    }

    async fn find_by_status(&self, status: InvoiceStatusType) -> Result<Vec<Invoice>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        invoices::fetch_invoices_with_status(&[status], &mut conn).await
    }

    async fn find_active(&self) -> Result<Vec<Invoice>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        invoices::fetch_invoices_with_status(&ACTIVE_STATUSES, &mut conn).await
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<Invoice>, RepositoryError> {
        let active = self.find_active().await?;
        let expired = active.into_iter().filter(|i| i.is_expired(now)).collect::<Vec<_>>();
        trace!("🗃️ {} invoices are past their expiry time", expired.len());
        Ok(expired)
    }

    async fn update(&self, invoice: &Invoice) -> Result<Invoice, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let version = invoices::update_invoice(invoice, &mut tx).await?;
        tx.commit().await?;
        trace!("🗃️ Invoice {} updated to version {version}", invoice.id);
        let mut updated = invoice.clone();
        updated.version = version;
        Ok(updated)
    }

    async fn delete(&self, id: &InvoiceId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let deleted = invoices::delete_invoice(id, &mut tx).await?;
        if !deleted {
            return Err(RepositoryError::InvoiceNotFound(id.clone()));
        }
        tx.commit().await?;
        debug!("🗃️ Invoice {id} deleted");
        Ok(())
    }

    async fn exists(&self, id: &InvoiceId) -> Result<bool, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(invoices::fetch_version(id, &mut conn).await?.is_some())
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }
}
