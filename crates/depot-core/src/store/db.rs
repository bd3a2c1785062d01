//! Durable record store using redb.
//!
//! # Table design
//!
//! Each record kind gets its own table named after `Record::KIND`:
//! ```text
//! key: id u64   value: JSON-encoded record
//! ```
//! A separate `sequences` table holds the last id handed out per kind.
//! Id allocation and the record write happen in the same write
//! transaction, so ids are never reused even across processes.
//!
//! # File lock
//!
//! redb locks the database file for as long as a `Database` is open. A
//! store from `RedbStore::open` keeps it open; one from
//! `RedbStore::on_demand` opens it per call, so long-running processes do
//! not lock out short-lived ones. Opening a busy file is retried briefly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use redb::{
    Database, DatabaseError, ReadableTable, TableDefinition, TableError, WriteTransaction,
};

use crate::error::{DepotError, Result};

use super::{Record, RecordStore, RecordTx};

/// Key: record kind. Value: last id allocated for that kind.
const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

const OPEN_ATTEMPTS: u32 = 40;
const OPEN_BACKOFF: Duration = Duration::from_millis(50);

fn table<R: Record>() -> TableDefinition<'static, u64, &'static [u8]> {
    TableDefinition::new(R::KIND)
}

fn create_database(path: &Path) -> Result<Database> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut attempt = 1;
    loop {
        match Database::create(path) {
            Ok(db) => return Ok(db),
            Err(DatabaseError::DatabaseAlreadyOpen) if attempt < OPEN_ATTEMPTS => {
                tracing::debug!(path = %path.display(), attempt, "database busy; retrying");
                std::thread::sleep(OPEN_BACKOFF);
                attempt += 1;
            }
            Err(e) => return Err(DepotError::store(e)),
        }
    }
}

fn decode_all<R: Record>(table: &impl ReadableTable<u64, &'static [u8]>) -> Result<Vec<R>> {
    let mut result = Vec::new();
    for entry in table.iter().map_err(DepotError::store)? {
        let (_, v) = entry.map_err(DepotError::store)?;
        result.push(serde_json::from_slice(v.value())?);
    }
    Ok(result)
}

fn decode<R: Record>(table: &impl ReadableTable<u64, &'static [u8]>, id: u64) -> Result<Option<R>> {
    match table.get(id).map_err(DepotError::store)? {
        Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
        None => Ok(None),
    }
}

enum Backing {
    Held(Database),
    OnDemand(PathBuf),
}

/// Persistent `RecordStore` backed by a single redb file.
pub struct RedbStore {
    backing: Backing,
}

impl RedbStore {
    /// Open or create the database at `path` and keep it open.
    pub fn open(path: &Path) -> Result<Self> {
        let db = create_database(path)?;
        init(&db)?;
        Ok(Self {
            backing: Backing::Held(db),
        })
    }

    /// Create the database at `path` if needed, then release it. Every
    /// later call reopens the file and closes it again when done.
    pub fn on_demand(path: &Path) -> Result<Self> {
        init(&create_database(path)?)?;
        Ok(Self {
            backing: Backing::OnDemand(path.to_path_buf()),
        })
    }

    fn with_db<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        match &self.backing {
            Backing::Held(db) => f(db),
            Backing::OnDemand(path) => {
                let db = create_database(path)?;
                f(&db)
            }
        }
    }
}

fn init(db: &Database) -> Result<()> {
    let wt = db.begin_write().map_err(DepotError::store)?;
    wt.open_table(SEQUENCES).map_err(DepotError::store)?;
    wt.commit().map_err(DepotError::store)
}

/// An open redb write transaction.
pub struct RedbTx {
    wt: WriteTransaction,
}

impl RecordTx for RedbTx {
    fn get_all<R: Record>(&self) -> Result<Vec<R>> {
        let t = self.wt.open_table(table::<R>()).map_err(DepotError::store)?;
        decode_all(&t)
    }

    fn get<R: Record>(&self, id: u64) -> Result<Option<R>> {
        let t = self.wt.open_table(table::<R>()).map_err(DepotError::store)?;
        decode(&t, id)
    }

    fn insert<R: Record>(&mut self, record: &mut R) -> Result<u64> {
        let id = {
            let mut seq = self.wt.open_table(SEQUENCES).map_err(DepotError::store)?;
            let last = seq
                .get(R::KIND)
                .map_err(DepotError::store)?
                .map(|g| g.value())
                .unwrap_or(0);
            let id = last + 1;
            seq.insert(R::KIND, id).map_err(DepotError::store)?;
            id
        };
        record.set_id(id);
        let value = serde_json::to_vec(record)?;
        let mut t = self.wt.open_table(table::<R>()).map_err(DepotError::store)?;
        t.insert(id, value.as_slice()).map_err(DepotError::store)?;
        Ok(id)
    }

    fn update<R: Record>(&mut self, record: &R) -> Result<()> {
        let id = record.id();
        let value = serde_json::to_vec(record)?;
        let mut t = self.wt.open_table(table::<R>()).map_err(DepotError::store)?;
        let exists = t.get(id).map_err(DepotError::store)?.is_some();
        if !exists {
            return Err(DepotError::NotFound { kind: R::KIND, id });
        }
        t.insert(id, value.as_slice()).map_err(DepotError::store)?;
        Ok(())
    }

    fn delete<R: Record>(&mut self, id: u64) -> Result<()> {
        let mut t = self.wt.open_table(table::<R>()).map_err(DepotError::store)?;
        let removed = t.remove(id).map_err(DepotError::store)?.is_some();
        if !removed {
            return Err(DepotError::NotFound { kind: R::KIND, id });
        }
        Ok(())
    }
}

impl RecordStore for RedbStore {
    type Tx = RedbTx;

    fn get_all<R: Record>(&self) -> Result<Vec<R>> {
        self.with_db(|db| {
            let rt = db.begin_read().map_err(DepotError::store)?;
            match rt.open_table(table::<R>()) {
                Ok(t) => decode_all(&t),
                // Nothing of this kind has been written yet.
                Err(TableError::TableDoesNotExist(_)) => Ok(Vec::new()),
                Err(e) => Err(DepotError::store(e)),
            }
        })
    }

    fn get<R: Record>(&self, id: u64) -> Result<Option<R>> {
        self.with_db(|db| {
            let rt = db.begin_read().map_err(DepotError::store)?;
            match rt.open_table(table::<R>()) {
                Ok(t) => decode(&t, id),
                Err(TableError::TableDoesNotExist(_)) => Ok(None),
                Err(e) => Err(DepotError::store(e)),
            }
        })
    }

    fn atomically<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self::Tx) -> Result<T>,
    {
        self.with_db(|db| {
            let wt = db.begin_write().map_err(DepotError::store)?;
            let mut tx = RedbTx { wt };
            match f(&mut tx) {
                Ok(out) => {
                    tx.wt.commit().map_err(DepotError::store)?;
                    Ok(out)
                }
                Err(e) => {
                    if let Err(abort) = tx.wt.abort() {
                        tracing::warn!(error = %abort, "write transaction abort failed");
                    }
                    Err(e)
                }
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
