use crate::output::{print_json, print_table};
use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::Subcommand;
use depot_core::fleet::TimedResource;
use depot_core::policy::Role;
use depot_core::report::{fleet_report, stock_report};
use std::path::Path;

#[derive(Subcommand)]
pub enum ReportSubcommand {
    /// Totals, stock value, and out-of-stock items
    Stock,
    /// Overdue and upcoming services
    Fleet {
        /// Report as of this date (default: today)
        #[arg(long)]
        today: Option<NaiveDate>,
    },
}

pub fn run(root: &Path, subcmd: ReportSubcommand, role: Role, json: bool) -> anyhow::Result<()> {
    let depot = super::open(root)?;
    match subcmd {
        ReportSubcommand::Stock => {
            let report = stock_report(depot.store.as_ref(), role)
                .context("failed to build stock report")?;
            if json {
                return print_json(&report);
            }
            println!("Items:        {}", report.items);
            println!("Total units:  {}", report.total_units);
            println!("Total value:  {}", report.total_value);
            if report.out_of_stock.is_empty() {
                println!("Out of stock: none");
            } else {
                println!("Out of stock:");
                let rows = report
                    .out_of_stock
                    .iter()
                    .map(|i| vec![i.id.to_string(), i.name.clone(), i.supplier.clone()])
                    .collect();
                print_table(&["ID", "NAME", "SUPPLIER"], rows);
            }
            Ok(())
        }
        ReportSubcommand::Fleet { today } => {
            let today = today.unwrap_or_else(|| Local::now().date_naive());
            let report = fleet_report(
                depot.store.as_ref(),
                today,
                depot.config.scanner.lookahead_days,
                role,
            )
            .context("failed to build fleet report")?;
            if json {
                return print_json(&report);
            }
            println!(
                "{} resources as of {} ({} overdue, {} due within {} days)",
                report.total,
                report.as_of,
                report.overdue.len(),
                report.upcoming.len(),
                report.lookahead_days
            );
            section("Overdue", &report.overdue, today);
            section("Upcoming", &report.upcoming, today);
            Ok(())
        }
    }
}

fn section(title: &str, resources: &[TimedResource], today: NaiveDate) {
    if resources.is_empty() {
        return;
    }
    println!();
    println!("{title}:");
    let rows = resources
        .iter()
        .map(|r| {
            vec![
                r.id.to_string(),
                r.label.clone(),
                r.due_at.to_string(),
                r.days_until_due(today).to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "LABEL", "DUE", "DAYS"], rows);
}
