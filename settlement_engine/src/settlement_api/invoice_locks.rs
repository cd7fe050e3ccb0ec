use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::db_types::InvoiceId;

/// One async mutex per invoice id. Holding the guard gives exclusive access to that invoice within this process.
///
/// Entries nobody is holding or waiting on are dropped the next time a lock is taken.
#[derive(Debug, Clone, Default)]
pub struct InvoiceLocks {
    locks: Arc<Mutex<HashMap<InvoiceId, Arc<AsyncMutex<()>>>>>,
}

impl InvoiceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, id: &InvoiceId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            locks.entry(id.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// The number of invoices currently locked or being waited on.
    pub fn len(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.values().filter(|l| Arc::strong_count(l) > 1).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
