use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{DepotError, Result};

use super::{Record, RecordStore, RecordTx};

#[derive(Debug, Clone, Default)]
struct Tables {
    rows: HashMap<&'static str, BTreeMap<u64, Vec<u8>>>,
    sequences: HashMap<&'static str, u64>,
}

impl Tables {
    fn decode_all<R: Record>(&self) -> Result<Vec<R>> {
        let Some(rows) = self.rows.get(R::KIND) else {
            return Ok(Vec::new());
        };
        rows.values()
            .map(|v| serde_json::from_slice(v).map_err(DepotError::from))
            .collect()
    }

    fn decode<R: Record>(&self, id: u64) -> Result<Option<R>> {
        match self.rows.get(R::KIND).and_then(|rows| rows.get(&id)) {
            Some(v) => Ok(Some(serde_json::from_slice(v)?)),
            None => Ok(None),
        }
    }
}

/// In-process `RecordStore`. Records are kept JSON-encoded so reads hand out
/// fresh copies, exactly like the durable backend.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A working copy of the tables. It replaces the live tables on commit.
#[derive(Debug, Default)]
pub struct MemoryTx {
    tables: Tables,
}

impl RecordTx for MemoryTx {
    fn get_all<R: Record>(&self) -> Result<Vec<R>> {
        self.tables.decode_all()
    }

    fn get<R: Record>(&self, id: u64) -> Result<Option<R>> {
        self.tables.decode(id)
    }

    fn insert<R: Record>(&mut self, record: &mut R) -> Result<u64> {
        let seq = self.tables.sequences.entry(R::KIND).or_insert(0);
        *seq += 1;
        let id = *seq;
        record.set_id(id);
        let value = serde_json::to_vec(record)?;
        self.tables.rows.entry(R::KIND).or_default().insert(id, value);
        Ok(id)
    }

    fn update<R: Record>(&mut self, record: &R) -> Result<()> {
        let id = record.id();
        let value = serde_json::to_vec(record)?;
        match self.tables.rows.get_mut(R::KIND).and_then(|rows| rows.get_mut(&id)) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(DepotError::NotFound { kind: R::KIND, id }),
        }
    }

    fn delete<R: Record>(&mut self, id: u64) -> Result<()> {
        match self.tables.rows.get_mut(R::KIND).and_then(|rows| rows.remove(&id)) {
            Some(_) => Ok(()),
            None => Err(DepotError::NotFound { kind: R::KIND, id }),
        }
    }
}

impl RecordStore for MemoryStore {
    type Tx = MemoryTx;

    fn get_all<R: Record>(&self) -> Result<Vec<R>> {
        self.lock().decode_all()
    }

    fn get<R: Record>(&self, id: u64) -> Result<Option<R>> {
        self.lock().decode(id)
    }

    fn atomically<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self::Tx) -> Result<T>,
    {
        // The lock is held for the whole transaction, so writers never
        // interleave.
        let mut live = self.lock();
        let mut tx = MemoryTx {
            tables: live.clone(),
        };
        let out = f(&mut tx)?;
        *live = tx.tables;
        Ok(out)
    }
}
