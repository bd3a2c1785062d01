//! Notification events and the sinks that receive them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{DepotError, Result};
use crate::fleet::TimedResource;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub resource_id: u64,
    pub label: String,
    pub due_at: NaiveDate,
    pub message: String,
}

impl NotificationEvent {
    pub fn for_resource(resource: &TimedResource, today: NaiveDate) -> Self {
        let days = resource.days_until_due(today);
        let message = match days {
            d if d < 0 => format!(
                "{} is overdue for service since {}",
                resource.label, resource.due_at
            ),
            0 => format!("{} is due for service today ({})", resource.label, resource.due_at),
            1 => format!("{} is due for service tomorrow ({})", resource.label, resource.due_at),
            d => format!(
                "{} is due for service on {} (in {d} days)",
                resource.label, resource.due_at
            ),
        };
        Self {
            resource_id: resource.id,
            label: resource.label.clone(),
            due_at: resource.due_at,
            message,
        }
    }
}

/// Receives notification events from the due scanner.
///
/// Delivery is fire-and-forget: an `Err` is logged by the scanner and the
/// event is not retried.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, event: &NotificationEvent) -> Result<()>;
}

/// Emits each event as a `tracing` record.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn deliver(&self, event: &NotificationEvent) -> Result<()> {
        tracing::info!(
            resource_id = event.resource_id,
            due_at = %event.due_at,
            "{}",
            event.message
        );
        Ok(())
    }
}

/// Pushes events onto an unbounded channel for the caller to poll.
#[derive(Debug, Clone)]
pub struct QueueSink {
    tx: mpsc::UnboundedSender<NotificationEvent>,
}

impl QueueSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<NotificationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for QueueSink {
    fn deliver(&self, event: &NotificationEvent) -> Result<()> {
        self.tx
            .send(event.clone())
            .map_err(|_| DepotError::Delivery("notification queue closed".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::{NewTimed, TimedResource};

    fn truck() -> TimedResource {
        TimedResource::new(
            NewTimed {
                label: "K042".into(),
                assignee: None,
                route: None,
                last_event_at: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
            },
            30,
        )
        .unwrap()
    }

    #[test]
    fn message_reflects_distance_to_due() {
        let r = truck();
        let on = |d| NaiveDate::from_ymd_opt(2026, 5, d).unwrap();
        assert!(NotificationEvent::for_resource(&r, on(25))
            .message
            .contains("in 6 days"));
        assert!(NotificationEvent::for_resource(&r, on(30))
            .message
            .contains("tomorrow"));
        assert!(NotificationEvent::for_resource(&r, on(31))
            .message
            .contains("today"));
        let late = NaiveDate::from_ymd_opt(2026, 6, 2).unwrap();
        assert!(NotificationEvent::for_resource(&r, late)
            .message
            .contains("overdue"));
    }

    #[test]
    fn queue_sink_delivers_and_reports_closed_queue() {
        let (sink, mut rx) = QueueSink::new();
        let event = NotificationEvent::for_resource(&truck(), NaiveDate::from_ymd_opt(2026, 5, 28).unwrap());
        sink.deliver(&event).unwrap();
        assert_eq!(rx.try_recv().unwrap(), event);

        drop(rx);
        assert!(matches!(sink.deliver(&event), Err(DepotError::Delivery(_))));
    }
}
