use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{Invoice, InvoiceId, InvoiceStatusType};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RepositoryError {
    #[error("Invoice {0} does not exist")]
    InvoiceNotFound(InvoiceId),
    #[error("No invoice uses the payment address {0}")]
    AddressNotFound(String),
    #[error("Invoice {0} already exists")]
    InvoiceAlreadyExists(InvoiceId),
    #[error("Invoice {id} was modified concurrently. Expected version {expected}, but found {found}")]
    VersionConflict { id: InvoiceId, expected: i64, found: i64 },
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Could not read a stored invoice: {0}")]
    CorruptRecord(String),
}

impl RepositoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::InvoiceNotFound(_) | Self::AddressNotFound(_))
    }
}

/// Storage for invoice aggregates, including their payments and transition history.
///
/// Not-found conditions are always reported with the dedicated variants, never as a [`RepositoryError::StorageError`].
#[allow(async_fn_in_trait)]
pub trait InvoiceRepository: Clone {
    /// Stores a brand-new invoice. Fails with [`RepositoryError::InvoiceAlreadyExists`] if the id is taken.
    async fn save(&self, invoice: &Invoice) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &InvoiceId) -> Result<Invoice, RepositoryError>;

    async fn find_by_payment_address(&self, address: &str) -> Result<Invoice, RepositoryError>;

    async fn find_by_status(&self, status: InvoiceStatusType) -> Result<Vec<Invoice>, RepositoryError>;

    /// All invoices that are not in a terminal state.
    async fn find_active(&self) -> Result<Vec<Invoice>, RepositoryError>;

    /// All non-terminal invoices whose expiry time is before `now`.
    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<Invoice>, RepositoryError>;

    /// Overwrites the stored invoice with `invoice`.
    ///
    /// The stored version must equal `invoice.version()`, otherwise [`RepositoryError::VersionConflict`] is returned
    /// and nothing is written. On success the stored copy, with its version bumped, is returned.
    async fn update(&self, invoice: &Invoice) -> Result<Invoice, RepositoryError>;

    async fn delete(&self, id: &InvoiceId) -> Result<(), RepositoryError>;

    async fn exists(&self, id: &InvoiceId) -> Result<bool, RepositoryError>;
}
