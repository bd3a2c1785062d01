//! Stock-like resources: an item with a quantity and a unit price.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DepotError, Result};
use crate::policy::Role;
use crate::store::Record;

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// StockStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    OutOfStock,
}

impl StockStatus {
    pub fn for_quantity(quantity: u64) -> Self {
        if quantity > 0 {
            StockStatus::InStock
        } else {
            StockStatus::OutOfStock
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StockStatus::InStock => "in_stock",
            StockStatus::OutOfStock => "out_of_stock",
        }
    }
}

impl fmt::Display for StockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// StockResource
// ---------------------------------------------------------------------------

/// Registration input. Signed so that bad input can be reported instead of
/// being unrepresentable at the call site.
#[derive(Debug, Clone)]
pub struct NewStock {
    pub name: String,
    pub supplier: String,
    pub quantity: i64,
    pub unit_price: Decimal,
}

/// Metadata edit. Quantity only moves through `Ledger::apply`.
#[derive(Debug, Clone, Default)]
pub struct StockEdit {
    pub name: Option<String>,
    pub supplier: Option<String>,
    pub unit_price: Option<Decimal>,
}

impl StockEdit {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.supplier.is_none() && self.unit_price.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockResource {
    pub id: u64,
    pub name: String,
    pub supplier: String,
    pub quantity: u64,
    pub unit_price: Decimal,
    pub last_operation: Direction,
    pub last_operation_at: DateTime<Utc>,
    pub last_inbound_at: NaiveDate,
}

impl StockResource {
    /// Build an unsaved resource from registration input.
    pub fn new(input: NewStock, now: DateTime<Utc>) -> Result<Self> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(DepotError::invalid("name must not be empty"));
        }
        let quantity = u64::try_from(input.quantity).map_err(|_| {
            DepotError::invalid(format!("quantity must be >= 0, got {}", input.quantity))
        })?;
        check_price(input.unit_price)?;
        Ok(Self {
            id: 0,
            name: name.to_string(),
            supplier: input.supplier.trim().to_string(),
            quantity,
            unit_price: input.unit_price,
            last_operation: Direction::Inbound,
            last_operation_at: now,
            last_inbound_at: now.date_naive(),
        })
    }

    pub fn status(&self) -> StockStatus {
        StockStatus::for_quantity(self.quantity)
    }

    /// Value of the units on hand.
    pub fn value(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    /// Compute the quantity after moving `amount` units in `direction`.
    ///
    /// Pure: the caller persists the result. Outbound moves that would take
    /// the quantity below zero fail with `InsufficientStock`.
    pub fn quantity_after(&self, direction: Direction, amount: u64) -> Result<u64> {
        match direction {
            Direction::Inbound => self
                .quantity
                .checked_add(amount)
                .ok_or_else(|| DepotError::invalid("quantity overflow")),
            Direction::Outbound => {
                self.quantity
                    .checked_sub(amount)
                    .ok_or(DepotError::InsufficientStock {
                        id: self.id,
                        available: self.quantity,
                        requested: amount,
                    })
            }
        }
    }

    pub(crate) fn apply_edit(&mut self, edit: StockEdit) -> Result<()> {
        if let Some(name) = edit.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(DepotError::invalid("name must not be empty"));
            }
            self.name = name.to_string();
        }
        if let Some(supplier) = edit.supplier {
            self.supplier = supplier.trim().to_string();
        }
        if let Some(price) = edit.unit_price {
            check_price(price)?;
            self.unit_price = price;
        }
        Ok(())
    }
}

fn check_price(price: Decimal) -> Result<()> {
    if price < Decimal::ZERO {
        return Err(DepotError::invalid(format!("price must be >= 0, got {price}")));
    }
    Ok(())
}

impl Record for StockResource {
    const KIND: &'static str = "stock";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

// ---------------------------------------------------------------------------
// LedgerEntry
// ---------------------------------------------------------------------------

/// One applied quantity change. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: u64,
    pub resource_id: u64,
    pub direction: Direction,
    pub amount: u64,
    pub quantity_after: u64,
    pub role: Role,
    pub recorded_at: DateTime<Utc>,
}

impl Record for LedgerEntry {
    const KIND: &'static str = "ledger";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
