//! Record store abstraction.
//!
//! The engine never talks to a database directly. Everything it persists
//! goes through `RecordStore`, which is generic over a `Record` kind: each
//! kind lives in its own table keyed by a store-assigned `u64` id.
//! `RedbStore` is the durable backend; `MemoryStore` keeps the same
//! semantics in process.
//!
//! Writes that must land together (a stock row and its ledger entry, a
//! scan's notification markings) go through `RecordStore::atomically`:
//! every write made on the `RecordTx` commits, or none does.

pub mod db;
pub mod memory;

#[cfg(test)]
pub(crate) mod faulty;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

pub use self::db::{RedbStore, RedbTx};
pub use self::memory::{MemoryStore, MemoryTx};

/// A persistable entity kind.
pub trait Record: Serialize + DeserializeOwned + Send {
    /// Table name; also used in `NotFound` errors.
    const KIND: &'static str;

    fn id(&self) -> u64;
    fn set_id(&mut self, id: u64);
}

/// Reads and writes inside one open write transaction. Reads see the
/// transaction's own uncommitted writes.
pub trait RecordTx {
    fn get_all<R: Record>(&self) -> Result<Vec<R>>;

    fn get<R: Record>(&self, id: u64) -> Result<Option<R>>;

    /// Assign a fresh id to `record`, stage it, and return the id.
    fn insert<R: Record>(&mut self, record: &mut R) -> Result<u64>;

    /// Overwrite an existing record. Fails with `NotFound` if absent.
    fn update<R: Record>(&mut self, record: &R) -> Result<()>;

    /// Remove a record. Fails with `NotFound` if absent.
    fn delete<R: Record>(&mut self, id: u64) -> Result<()>;
}

/// Table-per-kind storage with read-your-writes on the same handle.
pub trait RecordStore: Send + Sync {
    type Tx: RecordTx;

    fn get_all<R: Record>(&self) -> Result<Vec<R>>;

    fn get<R: Record>(&self, id: u64) -> Result<Option<R>>;

    /// Run `f` inside one write transaction. Its writes commit when it
    /// returns `Ok` and are discarded when it returns `Err`.
    fn atomically<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self::Tx) -> Result<T>;

    /// Assign a fresh id to `record`, persist it, and return the id.
    fn insert<R: Record>(&self, record: &mut R) -> Result<u64> {
        self.atomically(|tx| tx.insert(record))
    }

    /// Overwrite an existing record. Fails with `NotFound` if absent.
    fn update<R: Record>(&self, record: &R) -> Result<()> {
        self.atomically(|tx| tx.update(record))
    }

    /// Remove a record. Fails with `NotFound` if absent.
    fn delete<R: Record>(&self, id: u64) -> Result<()> {
        self.atomically(|tx| tx.delete::<R>(id))
    }
}

impl<S: RecordStore> RecordStore for std::sync::Arc<S> {
    type Tx = S::Tx;

    fn get_all<R: Record>(&self) -> Result<Vec<R>> {
        (**self).get_all()
    }

    fn get<R: Record>(&self, id: u64) -> Result<Option<R>> {
        (**self).get(id)
    }

    fn atomically<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self::Tx) -> Result<T>,
    {
        (**self).atomically(f)
    }
}
