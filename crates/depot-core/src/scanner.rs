//! Due scanner: a periodic sweep for timed resources entering their
//! lookahead window.
//!
//! `scan` is the unit of work. It emits at most one event per
//! `(resource_id, due_at)` pair, recording each pair as a
//! `NotificationRecord` in the store *before* the event is handed to a sink.
//! Delivery is therefore at-most-once per due value. Records whose resource
//! has since been serviced (new `due_at`) or removed are pruned on the next
//! scan, so the next due value is eligible again.
//!
//! `start` runs `scan` on a tokio task every `poll_interval`. A failed scan
//! is logged and retried on the next tick; nothing short of `stop` ends the
//! loop.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::ScannerConfig;
use crate::error::Result;
use crate::fleet::TimedResource;
use crate::notify::{NotificationEvent, NotificationSink};
use crate::store::{Record, RecordStore, RecordTx};

// ---------------------------------------------------------------------------
// NotificationRecord
// ---------------------------------------------------------------------------

/// A due value that has already been announced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: u64,
    pub resource_id: u64,
    pub due_at: NaiveDate,
    pub notified_at: DateTime<Utc>,
}

impl Record for NotificationRecord {
    const KIND: &'static str = "notified";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

// ---------------------------------------------------------------------------
// DueScanner
// ---------------------------------------------------------------------------

pub struct DueScanner<S> {
    store: S,
    config: ScannerConfig,
    /// Serializes scans within the process.
    in_scan: Mutex<()>,
}

impl<S: RecordStore> DueScanner<S> {
    pub fn new(store: S, config: ScannerConfig) -> Self {
        Self {
            store,
            config,
            in_scan: Mutex::new(()),
        }
    }

    /// Find resources due on or before `today + lookahead_days` that have not
    /// been announced for their current due date, and mark them announced.
    ///
    /// Reads, pruning and markings share one store transaction: events are
    /// returned only once their markings are committed, and a failed scan
    /// marks nothing.
    pub fn scan(&self, today: NaiveDate) -> Result<Vec<NotificationEvent>> {
        let _held = self.in_scan.lock().unwrap_or_else(PoisonError::into_inner);

        let horizon = today
            .checked_add_signed(Duration::days(i64::from(self.config.lookahead_days)))
            .unwrap_or(NaiveDate::MAX);

        let (events, pruned) = self.store.atomically(|tx| {
            let mut resources: Vec<TimedResource> = tx.get_all()?;
            let records: Vec<NotificationRecord> = tx.get_all()?;

            let current: HashMap<u64, NaiveDate> =
                resources.iter().map(|r| (r.id, r.due_at)).collect();
            let mut notified = HashSet::new();
            let mut pruned = 0usize;
            for record in records {
                if current.get(&record.resource_id) == Some(&record.due_at) {
                    notified.insert((record.resource_id, record.due_at));
                } else {
                    tx.delete::<NotificationRecord>(record.id)?;
                    pruned += 1;
                }
            }

            resources.sort_by(|a, b| a.due_at.cmp(&b.due_at).then(a.id.cmp(&b.id)));
            let mut events = Vec::new();
            for resource in resources
                .iter()
                .filter(|r| r.due_at <= horizon)
                .filter(|r| !notified.contains(&(r.id, r.due_at)))
            {
                let mut record = NotificationRecord {
                    id: 0,
                    resource_id: resource.id,
                    due_at: resource.due_at,
                    notified_at: Utc::now(),
                };
                tx.insert(&mut record)?;
                events.push(NotificationEvent::for_resource(resource, today));
            }
            Ok((events, pruned))
        })?;

        tracing::debug!(%today, %horizon, due = events.len(), pruned, "due scan complete");
        Ok(events)
    }

    /// Scan, then hand every new event to `sink`. Delivery failures are
    /// logged and do not undo the notified marking.
    pub fn run_once(
        &self,
        today: NaiveDate,
        sink: &dyn NotificationSink,
    ) -> Result<Vec<NotificationEvent>> {
        let events = self.scan(today)?;
        for event in &events {
            if let Err(e) = sink.deliver(event) {
                tracing::warn!(
                    resource_id = event.resource_id,
                    error = %e,
                    "notification delivery failed"
                );
            }
        }
        Ok(events)
    }
}

impl<S: RecordStore + 'static> DueScanner<S> {
    /// Spawn the polling loop on the current tokio runtime. The first scan
    /// runs immediately.
    pub fn start(self: Arc<Self>, sink: Arc<dyn NotificationSink>) -> ScannerHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let period = self
            .config
            .poll_interval()
            .max(std::time::Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(
                poll_secs = period.as_secs(),
                lookahead_days = self.config.lookahead_days,
                "due scanner started"
            );

            loop {
                tokio::select! {
                    biased;
                    // Err means the handle was dropped; treat it as a stop.
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {}
                }

                let scanner = Arc::clone(&self);
                let sink = Arc::clone(&sink);
                let today = Local::now().date_naive();
                let outcome =
                    tokio::task::spawn_blocking(move || scanner.run_once(today, sink.as_ref()))
                        .await;
                match outcome {
                    Ok(Ok(events)) => {
                        tracing::debug!(count = events.len(), "due scan delivered");
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(error = %e, "due scan failed; retrying next tick");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "due scan task aborted; retrying next tick");
                    }
                }
            }

            tracing::info!("due scanner stopped");
        });

        ScannerHandle { stop_tx, task }
    }
}

// ---------------------------------------------------------------------------
// ScannerHandle
// ---------------------------------------------------------------------------

/// Lifecycle control for a running scanner loop.
pub struct ScannerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ScannerHandle {
    /// Signal the loop to stop and wait for it. A scan already in flight is
    /// allowed to finish.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "due scanner task ended abnormally");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FleetConfig;
    use crate::error::DepotError;
    use crate::fleet::{Fleet, NewTimed};
    use crate::notify::QueueSink;
    use crate::policy::Role;
    use crate::store::faulty::FaultyStore;
    use crate::store::MemoryStore;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 1).unwrap() + Duration::days(offset)
    }

    fn config(lookahead_days: u32) -> ScannerConfig {
        ScannerConfig {
            poll_interval_secs: 86_400,
            lookahead_days,
        }
    }

    fn setup(last_event_at: NaiveDate) -> (Arc<MemoryStore>, Fleet<Arc<MemoryStore>>, u64) {
        let store = Arc::new(MemoryStore::new());
        let fleet = Fleet::new(Arc::clone(&store), FleetConfig::default());
        let id = fleet
            .register(
                NewTimed {
                    label: "bus-7".into(),
                    assignee: None,
                    route: Some("12".into()),
                    last_event_at,
                },
                Role::Operator,
            )
            .unwrap()
            .id;
        (store, fleet, id)
    }

    #[test]
    fn notifies_once_when_due_enters_window() {
        let (store, _fleet, id) = setup(day(0));
        let scanner = DueScanner::new(store, config(7));

        assert!(scanner.scan(day(22)).unwrap().is_empty());

        let events = scanner.scan(day(25)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].resource_id, id);
        assert_eq!(events[0].due_at, day(30));

        assert!(scanner.scan(day(26)).unwrap().is_empty());
    }

    #[test]
    fn rescanning_same_state_is_a_no_op() {
        let (store, _fleet, _id) = setup(day(0));
        let scanner = DueScanner::new(store, config(7));
        assert_eq!(scanner.scan(day(28)).unwrap().len(), 1);
        assert!(scanner.scan(day(28)).unwrap().is_empty());
    }

    #[test]
    fn overdue_resources_are_included() {
        let (store, _fleet, _id) = setup(day(0));
        let scanner = DueScanner::new(store, config(7));
        let events = scanner.scan(day(45)).unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].message.contains("overdue"));
    }

    #[test]
    fn servicing_makes_the_next_due_value_eligible() {
        let (store, fleet, id) = setup(day(0));
        let scanner = DueScanner::new(Arc::clone(&store), config(7));
        assert_eq!(scanner.scan(day(25)).unwrap().len(), 1);

        fleet.service(id, day(29), Role::Operator).unwrap();
        assert!(scanner.scan(day(30)).unwrap().is_empty());

        let records: Vec<NotificationRecord> = store.get_all().unwrap();
        assert!(records.is_empty(), "superseded record should be pruned");

        let events = scanner.scan(day(53)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].due_at, day(59));
    }

    #[test]
    fn removed_resources_drop_their_records() {
        let (store, fleet, id) = setup(day(0));
        let scanner = DueScanner::new(Arc::clone(&store), config(7));
        scanner.scan(day(25)).unwrap();
        fleet.remove(id, Role::Elevated).unwrap();
        scanner.scan(day(26)).unwrap();
        let records: Vec<NotificationRecord> = store.get_all().unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn lookahead_is_configurable() {
        let (store, _fleet, _id) = setup(day(0));
        let scanner = DueScanner::new(store, config(0));
        assert!(scanner.scan(day(29)).unwrap().is_empty());
        assert_eq!(scanner.scan(day(30)).unwrap().len(), 1);
    }

    struct RefusingSink;

    impl NotificationSink for RefusingSink {
        fn deliver(&self, _event: &NotificationEvent) -> Result<()> {
            Err(DepotError::Delivery("desktop notifier offline".into()))
        }
    }

    #[test]
    fn failed_delivery_keeps_the_marking() {
        let (store, _fleet, _id) = setup(day(0));
        let scanner = DueScanner::new(store, config(7));
        assert_eq!(scanner.run_once(day(25), &RefusingSink).unwrap().len(), 1);
        assert!(scanner.run_once(day(25), &RefusingSink).unwrap().is_empty());
    }

    #[test]
    fn failed_scan_marks_nothing_and_retry_emits_everything() {
        let store = Arc::new(FaultyStore::new());
        let fleet = Fleet::new(Arc::clone(&store), FleetConfig::default());
        for (label, last) in [("a", day(0)), ("b", day(1))] {
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
        let scanner = DueScanner::new(Arc::clone(&store), config(7));

        store.fail_inserts_of::<NotificationRecord>(1);
        assert!(matches!(
            scanner.scan(day(26)),
            Err(DepotError::StoreUnavailable(_))
        ));
        assert!(store.get_all::<NotificationRecord>().unwrap().is_empty());

        store.heal();
        let labels: Vec<String> = scanner
            .scan(day(26))
            .unwrap()
            .into_iter()
            .map(|e| e.label)
            .collect();
        assert_eq!(labels, vec!["a", "b"]);
    }

    fn faulty_with_due_resource(failures: usize) -> FaultyStore {
        let store = FaultyStore::new();
        let today = Local::now().date_naive();
        let mut resource = TimedResource::new(
            NewTimed {
                label: "tram-3".into(),
                assignee: None,
                route: None,
                last_event_at: today - Duration::days(28),
            },
            30,
        )
        .unwrap();
        store.insert(&mut resource).unwrap();
        store.fail_transactions(failures);
        store
    }

    fn fast_config() -> ScannerConfig {
        ScannerConfig {
            poll_interval_secs: 0,
            lookahead_days: 7,
        }
    }

    #[tokio::test]
    async fn loop_survives_failed_scans() {
        let scanner = Arc::new(DueScanner::new(faulty_with_due_resource(2), fast_config()));
        let (sink, mut rx) = QueueSink::new();
        let handle = Arc::clone(&scanner).start(Arc::new(sink));

        let event = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .expect("scanner never recovered")
            .expect("queue closed");
        assert_eq!(event.label, "tram-3");

        handle.stop().await;
    }

    #[tokio::test]
    async fn stop_ends_the_loop() {
        let scanner = Arc::new(DueScanner::new(faulty_with_due_resource(0), fast_config()));
        let (sink, mut rx) = QueueSink::new();
        let handle = Arc::clone(&scanner).start(Arc::new(sink));

        rx.recv().await.unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle.stop())
            .await
            .expect("stop hung");
        assert!(rx.try_recv().is_err());
    }
}
