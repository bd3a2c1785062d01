use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use depot_core::ledger::Ledger;
use depot_core::policy::Role;
use depot_core::stock::{Direction, NewStock, StockEdit, StockResource, StockStatus};
use depot_core::store::RedbStore;
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

#[derive(Subcommand)]
pub enum StockSubcommand {
    /// Register a new item with its initial quantity
    Add {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        supplier: String,
        #[arg(long, allow_negative_numbers = true)]
        quantity: i64,
        #[arg(long, allow_negative_numbers = true)]
        price: Decimal,
    },
    /// Receive units into stock
    In {
        id: u64,
        #[arg(allow_negative_numbers = true)]
        amount: i64,
    },
    /// Issue units out of stock
    Out {
        id: u64,
        #[arg(allow_negative_numbers = true)]
        amount: i64,
    },
    /// Edit name, supplier, or price (elevated role)
    Edit {
        id: u64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        supplier: Option<String>,
        #[arg(long, allow_negative_numbers = true)]
        price: Option<Decimal>,
    },
    /// Remove an item (elevated role)
    Remove { id: u64 },
    /// List items, most recently moved first
    List,
    /// Show one item
    Show { id: u64 },
    /// Show the quantity ledger for one item
    History { id: u64 },
}

/// A stock item with its derived status, for output.
#[derive(Serialize)]
struct StockView<'a> {
    #[serde(flatten)]
    item: &'a StockResource,
    status: StockStatus,
}

impl<'a> From<&'a StockResource> for StockView<'a> {
    fn from(item: &'a StockResource) -> Self {
        Self {
            item,
            status: item.status(),
        }
    }
}

pub fn run(root: &Path, subcmd: StockSubcommand, role: Role, json: bool) -> anyhow::Result<()> {
    let depot = super::open(root)?;
    let ledger = Ledger::new(depot.store);
    match subcmd {
        StockSubcommand::Add {
            name,
            supplier,
            quantity,
            price,
        } => add(
            &ledger,
            NewStock {
                name,
                supplier,
                quantity,
                unit_price: price,
            },
            role,
            json,
        ),
        StockSubcommand::In { id, amount } => {
            adjust(&ledger, id, Direction::Inbound, amount, role, json)
        }
        StockSubcommand::Out { id, amount } => {
            adjust(&ledger, id, Direction::Outbound, amount, role, json)
        }
        StockSubcommand::Edit {
            id,
            name,
            supplier,
            price,
        } => edit(
            &ledger,
            id,
            StockEdit {
                name,
                supplier,
                unit_price: price,
            },
            role,
            json,
        ),
        StockSubcommand::Remove { id } => remove(&ledger, id, role, json),
        StockSubcommand::List => list(&ledger, json),
        StockSubcommand::Show { id } => show(&ledger, id, json),
        StockSubcommand::History { id } => history(&ledger, id, json),
    }
}

type StockLedger = Ledger<Arc<RedbStore>>;

fn add(ledger: &StockLedger, input: NewStock, role: Role, json: bool) -> anyhow::Result<()> {
    let item = ledger
        .register(input, role)
        .context("failed to register item")?;
    if json {
        print_json(&StockView::from(&item))?;
    } else {
        println!(
            "Registered item [{}] {}: {} on hand at {}",
            item.id, item.name, item.quantity, item.unit_price
        );
    }
    Ok(())
}

fn adjust(
    ledger: &StockLedger,
    id: u64,
    direction: Direction,
    amount: i64,
    role: Role,
    json: bool,
) -> anyhow::Result<()> {
    let item = ledger
        .apply(id, direction, amount, role)
        .with_context(|| format!("{direction} of {amount} for item {id} rejected"))?;
    if json {
        print_json(&StockView::from(&item))?;
    } else {
        println!(
            "{} [{}] {}: {} on hand ({})",
            match direction {
                Direction::Inbound => "Received",
                Direction::Outbound => "Issued",
            },
            item.id,
            item.name,
            item.quantity,
            item.status()
        );
    }
    Ok(())
}

fn edit(
    ledger: &StockLedger,
    id: u64,
    edit: StockEdit,
    role: Role,
    json: bool,
) -> anyhow::Result<()> {
    let item = ledger
        .edit(id, edit, role)
        .with_context(|| format!("failed to edit item {id}"))?;
    if json {
        print_json(&StockView::from(&item))?;
    } else {
        println!("Updated item [{}] {}", item.id, item.name);
    }
    Ok(())
}

fn remove(ledger: &StockLedger, id: u64, role: Role, json: bool) -> anyhow::Result<()> {
    ledger
        .remove(id, role)
        .with_context(|| format!("failed to remove item {id}"))?;
    if json {
        print_json(&serde_json::json!({ "id": id, "removed": true }))?;
    } else {
        println!("Removed item [{id}]");
    }
    Ok(())
}

fn list(ledger: &StockLedger, json: bool) -> anyhow::Result<()> {
    let items = ledger.list()?;
    if json {
        let views: Vec<StockView> = items.iter().map(StockView::from).collect();
        return print_json(&views);
    }
    if items.is_empty() {
        println!("No items.");
        return Ok(());
    }
    let rows = items
        .iter()
        .map(|i| {
            vec![
                i.id.to_string(),
                i.name.clone(),
                i.supplier.clone(),
                i.quantity.to_string(),
                i.unit_price.to_string(),
                i.last_inbound_at.to_string(),
                i.last_operation.to_string(),
                i.last_operation_at.format("%Y-%m-%d %H:%M").to_string(),
                i.status().to_string(),
            ]
        })
        .collect();
    print_table(
        &[
            "ID", "NAME", "SUPPLIER", "QTY", "PRICE", "DELIVERED", "LAST OP", "AT", "STATUS",
        ],
        rows,
    );
    Ok(())
}

fn show(ledger: &StockLedger, id: u64, json: bool) -> anyhow::Result<()> {
    let item = ledger.get(id)?;
    if json {
        print_json(&StockView::from(&item))?;
    } else {
        println!("[{}] {}", item.id, item.name);
        println!("  supplier:       {}", item.supplier);
        println!("  quantity:       {} ({})", item.quantity, item.status());
        println!("  unit price:     {}", item.unit_price);
        println!("  value:          {}", item.value());
        println!("  last delivery:  {}", item.last_inbound_at);
        println!(
            "  last operation: {} at {}",
            item.last_operation,
            item.last_operation_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(())
}

fn history(ledger: &StockLedger, id: u64, json: bool) -> anyhow::Result<()> {
    let entries = ledger.history(id)?;
    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("No ledger entries for item [{id}].");
        return Ok(());
    }
    let rows = entries
        .iter()
        .map(|e| {
            vec![
                e.recorded_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                e.direction.to_string(),
                e.amount.to_string(),
                e.quantity_after.to_string(),
                e.role.to_string(),
            ]
        })
        .collect();
    print_table(&["AT", "DIRECTION", "AMOUNT", "AFTER", "ROLE"], rows);
    Ok(())
}
