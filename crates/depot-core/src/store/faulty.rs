//! A `MemoryStore` wrapper that fails chosen operations on request.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{DepotError, Result};

use super::{MemoryStore, MemoryTx, Record, RecordStore, RecordTx};

#[derive(Debug)]
struct InsertFault {
    kind: &'static str,
    /// Inserts of `kind` still allowed before the fault fires.
    allowed: usize,
}

#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    failing_transactions: AtomicUsize,
    insert_fault: Arc<Mutex<Option<InsertFault>>>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` transactions before they run.
    pub fn fail_transactions(&self, n: usize) {
        self.failing_transactions.store(n, Ordering::SeqCst);
    }

    /// Let `allowed` more inserts of kind `R` through, then fail the rest.
    pub fn fail_inserts_of<R: Record>(&self, allowed: usize) {
        *self.fault() = Some(InsertFault {
            kind: R::KIND,
            allowed,
        });
    }

    pub fn heal(&self) {
        self.failing_transactions.store(0, Ordering::SeqCst);
        *self.fault() = None;
    }

    fn fault(&self) -> std::sync::MutexGuard<'_, Option<InsertFault>> {
        self.insert_fault
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct FaultyTx {
    inner: MemoryTx,
    insert_fault: Arc<Mutex<Option<InsertFault>>>,
}

impl RecordTx for FaultyTx {
    fn get_all<R: Record>(&self) -> Result<Vec<R>> {
        self.inner.get_all()
    }

    fn get<R: Record>(&self, id: u64) -> Result<Option<R>> {
        self.inner.get(id)
    }

    fn insert<R: Record>(&mut self, record: &mut R) -> Result<u64> {
        let mut fault = self
            .insert_fault
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(f) = fault.as_mut().filter(|f| f.kind == R::KIND) {
            if f.allowed == 0 {
                return Err(DepotError::StoreUnavailable("disk full".into()));
            }
            f.allowed -= 1;
        }
        drop(fault);
        self.inner.insert(record)
    }

    fn update<R: Record>(&mut self, record: &R) -> Result<()> {
        self.inner.update(record)
    }

    fn delete<R: Record>(&mut self, id: u64) -> Result<()> {
        self.inner.delete::<R>(id)
    }
}

impl RecordStore for FaultyStore {
    type Tx = FaultyTx;

    fn get_all<R: Record>(&self) -> Result<Vec<R>> {
        self.inner.get_all()
    }

    fn get<R: Record>(&self, id: u64) -> Result<Option<R>> {
        self.inner.get(id)
    }

    fn atomically<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self::Tx) -> Result<T>,
    {
        let failing = self
            .failing_transactions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(DepotError::StoreUnavailable("connection refused".into()));
        }
        self.inner.atomically(|tx| {
            let mut faulty = FaultyTx {
                inner: std::mem::take(tx),
                insert_fault: Arc::clone(&self.insert_fault),
            };
            let out = f(&mut faulty);
            *tx = faulty.inner;
            out
        })
    }
}
