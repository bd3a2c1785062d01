use crate::output::{or_dash, print_json, print_table};
use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::Subcommand;
use depot_core::fleet::{Fleet, NewTimed, TimedEdit, TimedResource, TimedStatus};
use depot_core::policy::Role;
use depot_core::store::RedbStore;
use std::path::Path;
use std::sync::Arc;

#[derive(Subcommand)]
pub enum FleetSubcommand {
    /// Register a timed resource
    Add {
        #[arg(long)]
        label: String,
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long)]
        route: Option<String>,
        /// Date of the last service (default: today)
        #[arg(long)]
        last_service: Option<NaiveDate>,
    },
    /// Record a completed service; the next due date moves forward
    Service {
        id: u64,
        /// Service date (default: today)
        #[arg(long)]
        on: Option<NaiveDate>,
    },
    /// Edit metadata or correct the last service date (elevated role)
    Edit {
        id: u64,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long)]
        route: Option<String>,
        #[arg(long)]
        last_service: Option<NaiveDate>,
        /// active | inactive
        #[arg(long)]
        status: Option<TimedStatus>,
    },
    /// Remove a timed resource (elevated role)
    Remove { id: u64 },
    /// List timed resources, soonest due first
    List,
    /// Show one timed resource
    Show { id: u64 },
}

type FleetStore = Fleet<Arc<RedbStore>>;

pub fn run(root: &Path, subcmd: FleetSubcommand, role: Role, json: bool) -> anyhow::Result<()> {
    let depot = super::open(root)?;
    let fleet = Fleet::new(depot.store, depot.config.fleet.clone());
    let today = Local::now().date_naive();
    match subcmd {
        FleetSubcommand::Add {
            label,
            assignee,
            route,
            last_service,
        } => {
            let input = NewTimed {
                label,
                assignee,
                route,
                last_event_at: last_service.unwrap_or(today),
            };
            let resource = fleet
                .register(input, role)
                .context("failed to register resource")?;
            if json {
                print_json(&resource)?;
            } else {
                println!(
                    "Registered [{}] {}: next service due {}",
                    resource.id, resource.label, resource.due_at
                );
            }
            Ok(())
        }
        FleetSubcommand::Service { id, on } => {
            let resource = fleet
                .service(id, on.unwrap_or(today), role)
                .with_context(|| format!("failed to record service for resource {id}"))?;
            if json {
                print_json(&resource)?;
            } else {
                println!(
                    "Serviced [{}] {} on {}: next due {}",
                    resource.id, resource.label, resource.last_event_at, resource.due_at
                );
            }
            Ok(())
        }
        FleetSubcommand::Edit {
            id,
            label,
            assignee,
            route,
            last_service,
            status,
        } => {
            let edit = TimedEdit {
                label,
                assignee,
                route,
                last_event_at: last_service,
                status,
            };
            let resource = fleet
                .edit(id, edit, role)
                .with_context(|| format!("failed to edit resource {id}"))?;
            if json {
                print_json(&resource)?;
            } else {
                println!("Updated [{}] {}", resource.id, resource.label);
            }
            Ok(())
        }
        FleetSubcommand::Remove { id } => {
            fleet
                .remove(id, role)
                .with_context(|| format!("failed to remove resource {id}"))?;
            if json {
                print_json(&serde_json::json!({ "id": id, "removed": true }))?;
            } else {
                println!("Removed resource [{id}]");
            }
            Ok(())
        }
        FleetSubcommand::List => list(&fleet, today, json),
        FleetSubcommand::Show { id } => show(&fleet, id, today, json),
    }
}

fn list(fleet: &FleetStore, today: NaiveDate, json: bool) -> anyhow::Result<()> {
    let resources = fleet.list()?;
    if json {
        return print_json(&resources);
    }
    if resources.is_empty() {
        println!("No resources.");
        return Ok(());
    }
    let rows = resources.iter().map(|r| row(r, today)).collect();
    print_table(
        &[
            "ID", "LABEL", "ASSIGNEE", "ROUTE", "LAST SERVICE", "DUE", "DAYS", "STATUS",
        ],
        rows,
    );
    Ok(())
}

fn row(r: &TimedResource, today: NaiveDate) -> Vec<String> {
    vec![
        r.id.to_string(),
        r.label.clone(),
        or_dash(r.assignee.as_deref()),
        or_dash(r.route.as_deref()),
        r.last_event_at.to_string(),
        r.due_at.to_string(),
        r.days_until_due(today).to_string(),
        r.status.to_string(),
    ]
}

fn show(fleet: &FleetStore, id: u64, today: NaiveDate, json: bool) -> anyhow::Result<()> {
    let r = fleet.get(id)?;
    if json {
        return print_json(&r);
    }
    println!("[{}] {}", r.id, r.label);
    println!("  assignee:     {}", or_dash(r.assignee.as_deref()));
    println!("  route:        {}", or_dash(r.route.as_deref()));
    println!("  last service: {}", r.last_event_at);
    match r.days_until_due(today) {
        d if d < 0 => println!("  due:          {} ({} days overdue)", r.due_at, -d),
        d => println!("  due:          {} (in {d} days)", r.due_at),
    }
    println!("  status:       {}", r.status);
    Ok(())
}
