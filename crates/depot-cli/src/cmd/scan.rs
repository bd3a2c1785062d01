use crate::output::print_json;
use anyhow::Context;
use chrono::{Local, NaiveDate};
use depot_core::config::Config;
use depot_core::notify::{LogSink, NotificationEvent, NotificationSink};
use depot_core::scanner::DueScanner;
use depot_core::store::RedbStore;
use std::path::Path;
use std::sync::Arc;

/// Writes each event to stdout, one line or one JSON object per event.
struct PrintSink {
    json: bool,
}

impl NotificationSink for PrintSink {
    fn deliver(&self, event: &NotificationEvent) -> depot_core::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(event)?);
        } else {
            println!("[{}] {}", event.resource_id, event.message);
        }
        LogSink.deliver(event)
    }
}

pub fn run(root: &Path, today: Option<NaiveDate>, json: bool) -> anyhow::Result<()> {
    let depot = super::open(root)?;
    let scanner = DueScanner::new(depot.store, depot.config.scanner.clone());
    let today = today.unwrap_or_else(|| Local::now().date_naive());

    // One-shot output is rendered after the scan so JSON stays a single array.
    let events = scanner
        .run_once(today, &LogSink)
        .with_context(|| format!("due scan for {today} failed"))?;

    if json {
        print_json(&events)?;
    } else if events.is_empty() {
        println!("No resources due.");
    } else {
        for event in &events {
            println!("[{}] {}", event.resource_id, event.message);
        }
    }
    Ok(())
}

/// Run the scanner loop until Ctrl-C. The database is opened only while a
/// scan runs, so other `depot` commands keep working against the same root.
pub fn watch(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load .depot/config.yaml")?;
    let db_path = config.database_path(root);
    let store = RedbStore::on_demand(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;
    let scanner = Arc::new(DueScanner::new(store, config.scanner.clone()));
    let sink: Arc<dyn NotificationSink> = Arc::new(PrintSink { json });

    let rt = tokio::runtime::Runtime::new().context("failed to start runtime")?;
    rt.block_on(async move {
        let handle = scanner.start(sink);
        tracing::info!("watching; press Ctrl-C to stop");
        let signal = tokio::signal::ctrl_c().await;
        handle.stop().await;
        signal.context("failed to listen for Ctrl-C")
    })
}
