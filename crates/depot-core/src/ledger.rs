//! Ledger guard: the only write path for stock quantities.
//!
//! Every quantity change runs through `Ledger::apply`, which checks the role
//! gate, then performs the load / compute / persist sequence while holding
//! a lock for that resource id. Two applies on the same id are serialized;
//! applies on different ids never contend. The new quantity and its ledger
//! entry are written in one store transaction.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;

use crate::error::{DepotError, Result};
use crate::policy::{authorize, Operation, Role};
use crate::stock::{Direction, LedgerEntry, NewStock, StockEdit, StockResource};
use crate::store::{Record, RecordStore, RecordTx};

#[derive(Default)]
struct LockTable {
    locks: Mutex<HashMap<u64, Arc<Mutex<()>>>>,
}

impl LockTable {
    fn for_id(&self, id: u64) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(id).or_default().clone()
    }

    fn forget(&self, id: u64) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.remove(&id);
    }
}

pub struct Ledger<S> {
    store: S,
    locks: LockTable,
}

impl<S: RecordStore> Ledger<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            locks: LockTable::default(),
        }
    }

    /// Move `amount` units of a resource in `direction`.
    ///
    /// Fails without mutating anything on a non-positive amount, a denied
    /// role, an unknown id, or an outbound move larger than the quantity on
    /// hand.
    pub fn apply(
        &self,
        resource_id: u64,
        direction: Direction,
        amount: i64,
        role: Role,
    ) -> Result<StockResource> {
        if amount <= 0 {
            return Err(DepotError::invalid(format!(
                "amount must be a positive integer, got {amount}"
            )));
        }
        authorize(Operation::AdjustQuantity, role)?;
        let amount = amount.unsigned_abs();

        let lock = self.locks.for_id(resource_id);
        let _held = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut item = self.load(resource_id)?;
        let quantity = item.quantity_after(direction, amount)?;
        let now = Utc::now();

        item.quantity = quantity;
        item.last_operation = direction;
        item.last_operation_at = now;
        if direction == Direction::Inbound {
            item.last_inbound_at = now.date_naive();
        }
        self.store.atomically(|tx| {
            tx.update(&item)?;
            append_entry(tx, &item, direction, amount, role)
        })?;
        tracing::info!(
            id = resource_id,
            %direction,
            amount,
            quantity,
            %role,
            "stock adjusted"
        );
        Ok(item)
    }

    /// Create a resource with its initial inbound quantity.
    pub fn register(&self, input: NewStock, role: Role) -> Result<StockResource> {
        authorize(Operation::Register, role)?;
        let mut item = StockResource::new(input, Utc::now())?;
        self.store.atomically(|tx| {
            tx.insert(&mut item)?;
            if item.quantity > 0 {
                append_entry(tx, &item, Direction::Inbound, item.quantity, role)?;
            }
            Ok(())
        })?;
        tracing::info!(id = item.id, name = %item.name, quantity = item.quantity, "stock registered");
        Ok(item)
    }

    /// Change name, supplier, or price. Elevated only.
    pub fn edit(&self, resource_id: u64, edit: StockEdit, role: Role) -> Result<StockResource> {
        authorize(Operation::EditMetadata, role)?;
        if edit.is_empty() {
            return Err(DepotError::invalid("nothing to edit"));
        }

        let lock = self.locks.for_id(resource_id);
        let _held = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut item = self.load(resource_id)?;
        item.apply_edit(edit)?;
        self.store.update(&item)?;
        tracing::info!(id = resource_id, %role, "stock edited");
        Ok(item)
    }

    /// Delete a resource. Elevated only. Its ledger history is kept.
    pub fn remove(&self, resource_id: u64, role: Role) -> Result<()> {
        authorize(Operation::Remove, role)?;
        {
            let lock = self.locks.for_id(resource_id);
            let _held = lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.store.delete::<StockResource>(resource_id)?;
        }
        self.locks.forget(resource_id);
        tracing::info!(id = resource_id, %role, "stock removed");
        Ok(())
    }

    pub fn get(&self, resource_id: u64) -> Result<StockResource> {
        self.load(resource_id)
    }

    /// All resources, most recently touched first.
    pub fn list(&self) -> Result<Vec<StockResource>> {
        let mut items: Vec<StockResource> = self.store.get_all()?;
        items.sort_by(|a, b| {
            b.last_operation_at
                .cmp(&a.last_operation_at)
                .then(a.id.cmp(&b.id))
        });
        Ok(items)
    }

    /// Ledger entries for one resource, oldest first.
    pub fn history(&self, resource_id: u64) -> Result<Vec<LedgerEntry>> {
        let mut entries: Vec<LedgerEntry> = self
            .store
            .get_all::<LedgerEntry>()?
            .into_iter()
            .filter(|e| e.resource_id == resource_id)
            .collect();
        entries.sort_by_key(|e| e.id);
        Ok(entries)
    }

    fn load(&self, resource_id: u64) -> Result<StockResource> {
        self.store
            .get(resource_id)?
            .ok_or(DepotError::NotFound {
                kind: StockResource::KIND,
                id: resource_id,
            })
    }
}

/// Record a movement that has just been applied to `item`.
fn append_entry(
    tx: &mut impl RecordTx,
    item: &StockResource,
    direction: Direction,
    amount: u64,
    role: Role,
) -> Result<()> {
    let mut entry = LedgerEntry {
        id: 0,
        resource_id: item.id,
        direction,
        amount,
        quantity_after: item.quantity,
        role,
        recorded_at: item.last_operation_at,
    };
    tx.insert(&mut entry)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
