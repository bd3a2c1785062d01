//! Aggregate reports over stock and fleet state. Elevated role only.
//!
//! Reports are structured values; rendering them is the caller's job.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::Result;
use crate::fleet::TimedResource;
use crate::policy::{authorize, Operation, Role};
use crate::stock::StockResource;
use crate::store::RecordStore;

#[derive(Debug, Clone, Serialize)]
pub struct StockReport {
    pub items: usize,
    pub total_units: u64,
    pub total_value: Decimal,
    pub out_of_stock: Vec<StockResource>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FleetReport {
    pub as_of: NaiveDate,
    pub lookahead_days: u32,
    pub total: usize,
    pub overdue: Vec<TimedResource>,
    pub upcoming: Vec<TimedResource>,
}

pub fn stock_report<S: RecordStore>(store: &S, role: Role) -> Result<StockReport> {
    authorize(Operation::RunReport, role)?;
    let items: Vec<StockResource> = store.get_all()?;
    let total_units = items.iter().map(|i| i.quantity).sum();
    let total_value = items.iter().map(StockResource::value).sum();
    let mut out_of_stock: Vec<StockResource> =
        items.iter().filter(|i| i.quantity == 0).cloned().collect();
    out_of_stock.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(StockReport {
        items: items.len(),
        total_units,
        total_value,
        out_of_stock,
    })
}

/// Split timed resources into overdue (due before `today`) and upcoming
/// (due within `today ..= today + lookahead_days`), soonest first.
pub fn fleet_report<S: RecordStore>(
    store: &S,
    today: NaiveDate,
    lookahead_days: u32,
    role: Role,
) -> Result<FleetReport> {
    authorize(Operation::RunReport, role)?;
    let mut all: Vec<TimedResource> = store.get_all()?;
    all.sort_by(|a, b| a.due_at.cmp(&b.due_at).then(a.id.cmp(&b.id)));
    let horizon = today
        .checked_add_signed(Duration::days(i64::from(lookahead_days)))
        .unwrap_or(NaiveDate::MAX);
    let total = all.len();

    let (overdue, rest): (Vec<_>, Vec<_>) = all.into_iter().partition(|r| r.due_at < today);
    let upcoming = rest.into_iter().filter(|r| r.due_at <= horizon).collect();
    Ok(FleetReport {
        as_of: today,
        lookahead_days,
        total,
        overdue,
        upcoming,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FleetConfig;
    use crate::error::DepotError;
    use crate::fleet::{Fleet, NewTimed};
    use crate::ledger::Ledger;
    use crate::stock::{Direction, NewStock};
    use crate::store::MemoryStore;
    use std::sync::Arc;

    #[test]
    fn reports_are_elevated_only() {
        let store = MemoryStore::new();
        assert!(matches!(
            stock_report(&store, Role::Operator),
            Err(DepotError::Forbidden { .. })
        ));
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert!(matches!(
            fleet_report(&store, today, 7, Role::Operator),
            Err(DepotError::Forbidden { .. })
        ));
    }

    #[test]
    fn stock_report_totals() {
        let store = Arc::new(MemoryStore::new());
        let ledger = Ledger::new(Arc::clone(&store));
        for (name, quantity, cents) in [("tea", 4, 250), ("sugar", 2, 100)] {
            ledger
                .register(
                    NewStock {
                        name: name.into(),
                        supplier: "x".into(),
                        quantity,
                        unit_price: Decimal::new(cents, 2),
                    },
                    Role::Operator,
                )
                .unwrap();
        }
        ledger.apply(2, Direction::Outbound, 2, Role::Operator).unwrap();

        let report = stock_report(&store, Role::Elevated).unwrap();
        assert_eq!(report.items, 2);
        assert_eq!(report.total_units, 4);
        assert_eq!(report.total_value, Decimal::new(1000, 2));
        assert_eq!(report.out_of_stock.len(), 1);
        assert_eq!(report.out_of_stock[0].name, "sugar");
    }

    #[test]
    fn fleet_report_splits_overdue_and_upcoming() {
        let store = Arc::new(MemoryStore::new());
        let fleet = Fleet::new(Arc::clone(&store), FleetConfig::default());
        let d = |m, day| NaiveDate::from_ymd_opt(2026, m, day).unwrap();
        for (label, last) in [("late", d(1, 1)), ("soon", d(1, 20)), ("fine", d(2, 10))] {
            fleet
                .register(
                    NewTimed {
                        label: label.into(),
                        assignee: None,
                        route: None,
                        last_event_at: last,
                    },
                    Role::Operator,
                )
                .unwrap();
        }

        let report = fleet_report(&store, d(2, 15), 7, Role::Elevated).unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.overdue.len(), 1);
        assert_eq!(report.overdue[0].label, "late");
        assert_eq!(report.upcoming.len(), 1);
        assert_eq!(report.upcoming[0].label, "soon");
    }

    #[test]
    fn huge_lookahead_counts_everything_not_overdue() {
        let store = Arc::new(MemoryStore::new());
        let fleet = Fleet::new(Arc::clone(&store), FleetConfig::default());
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        fleet
            .register(
                NewTimed {
                    label: "far".into(),
                    assignee: None,
                    route: None,
                    last_event_at: NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(),
                },
                Role::Operator,
            )
            .unwrap();

        let report = fleet_report(&store, today, u32::MAX, Role::Elevated).unwrap();
        assert!(report.overdue.is_empty());
        assert_eq!(report.upcoming.len(), 1);
    }
}
