//! Timed resources: anything that must be serviced on a fixed interval.
//!
//! `due_at` is derived. It is recomputed as `last_event_at + interval` on
//! every write that touches `last_event_at`, and no caller can set it.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::FleetConfig;
use crate::error::{DepotError, Result};
use crate::policy::{authorize, Operation, Role};
use crate::store::{Record, RecordStore};

// ---------------------------------------------------------------------------
// TimedStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimedStatus {
    Active,
    Inactive,
}

impl TimedStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TimedStatus::Active => "active",
            TimedStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for TimedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TimedStatus {
    type Err = DepotError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(TimedStatus::Active),
            "inactive" => Ok(TimedStatus::Inactive),
            other => Err(DepotError::invalid(format!("unknown status '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// TimedResource
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NewTimed {
    pub label: String,
    pub assignee: Option<String>,
    pub route: Option<String>,
    pub last_event_at: NaiveDate,
}

#[derive(Debug, Clone, Default)]
pub struct TimedEdit {
    pub label: Option<String>,
    pub assignee: Option<String>,
    pub route: Option<String>,
    pub last_event_at: Option<NaiveDate>,
    pub status: Option<TimedStatus>,
}

impl TimedEdit {
    pub fn is_empty(&self) -> bool {
        self.label.is_none()
            && self.assignee.is_none()
            && self.route.is_none()
            && self.last_event_at.is_none()
            && self.status.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedResource {
    pub id: u64,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    pub last_event_at: NaiveDate,
    pub due_at: NaiveDate,
    pub status: TimedStatus,
}

impl TimedResource {
    pub fn new(input: NewTimed, interval_days: u32) -> Result<Self> {
        let label = input.label.trim();
        if label.is_empty() {
            return Err(DepotError::invalid("label must not be empty"));
        }
        let mut resource = Self {
            id: 0,
            label: label.to_string(),
            assignee: non_empty(input.assignee),
            route: non_empty(input.route),
            last_event_at: input.last_event_at,
            due_at: input.last_event_at,
            status: TimedStatus::Active,
        };
        resource.set_last_event(input.last_event_at, interval_days)?;
        Ok(resource)
    }

    /// The only way `last_event_at` changes. Keeps `due_at` in step.
    pub fn set_last_event(&mut self, at: NaiveDate, interval_days: u32) -> Result<()> {
        let due = at
            .checked_add_signed(Duration::days(i64::from(interval_days)))
            .ok_or_else(|| DepotError::invalid(format!("date out of range: {at}")))?;
        self.last_event_at = at;
        self.due_at = due;
        Ok(())
    }

    /// Days from `today` until due. Negative once overdue.
    pub fn days_until_due(&self, today: NaiveDate) -> i64 {
        (self.due_at - today).num_days()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Record for TimedResource {
    const KIND: &'static str = "timed";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

// ---------------------------------------------------------------------------
// Fleet
// ---------------------------------------------------------------------------

/// Role-gated registry of timed resources.
pub struct Fleet<S> {
    store: S,
    config: FleetConfig,
}

impl<S: RecordStore> Fleet<S> {
    pub fn new(store: S, config: FleetConfig) -> Self {
        Self { store, config }
    }

    pub fn register(&self, input: NewTimed, role: Role) -> Result<TimedResource> {
        authorize(Operation::Register, role)?;
        let mut resource = TimedResource::new(input, self.config.service_interval_days)?;
        self.store.insert(&mut resource)?;
        tracing::info!(id = resource.id, label = %resource.label, due_at = %resource.due_at, "timed resource registered");
        Ok(resource)
    }

    /// Record a completed service on `on`, moving the due date forward.
    pub fn service(&self, id: u64, on: NaiveDate, role: Role) -> Result<TimedResource> {
        authorize(Operation::CompleteEvent, role)?;
        let mut resource = self.load(id)?;
        if on < resource.last_event_at {
            return Err(DepotError::invalid(format!(
                "service date {on} is before the last recorded service {}",
                resource.last_event_at
            )));
        }
        resource.set_last_event(on, self.config.service_interval_days)?;
        if self.config.reactivate_on_service {
            resource.status = TimedStatus::Active;
        }
        self.store.update(&resource)?;
        tracing::info!(id, serviced = %on, due_at = %resource.due_at, %role, "timed resource serviced");
        Ok(resource)
    }

    pub fn edit(&self, id: u64, edit: TimedEdit, role: Role) -> Result<TimedResource> {
        authorize(Operation::EditMetadata, role)?;
        if edit.is_empty() {
            return Err(DepotError::invalid("nothing to edit"));
        }
        let mut resource = self.load(id)?;
        if let Some(label) = edit.label {
            let label = label.trim();
            if label.is_empty() {
                return Err(DepotError::invalid("label must not be empty"));
            }
            resource.label = label.to_string();
        }
        if edit.assignee.is_some() {
            resource.assignee = non_empty(edit.assignee);
        }
        if edit.route.is_some() {
            resource.route = non_empty(edit.route);
        }
        if let Some(at) = edit.last_event_at {
            resource.set_last_event(at, self.config.service_interval_days)?;
        }
        if let Some(status) = edit.status {
            resource.status = status;
        }
        self.store.update(&resource)?;
        tracing::info!(id, %role, "timed resource edited");
        Ok(resource)
    }

    pub fn remove(&self, id: u64, role: Role) -> Result<()> {
        authorize(Operation::RemoveTimed, role)?;
        self.store.delete::<TimedResource>(id)?;
        tracing::info!(id, %role, "timed resource removed");
        Ok(())
    }

    pub fn get(&self, id: u64) -> Result<TimedResource> {
        self.load(id)
    }

    /// All resources, soonest due first.
    pub fn list(&self) -> Result<Vec<TimedResource>> {
        let mut all: Vec<TimedResource> = self.store.get_all()?;
        all.sort_by(|a, b| a.due_at.cmp(&b.due_at).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    fn load(&self, id: u64) -> Result<TimedResource> {
        self.store.get(id)?.ok_or(DepotError::NotFound {
            kind: TimedResource::KIND,
            id,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
