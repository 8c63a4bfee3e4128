//! Notification events
//!
//! Outbound payloads pushed to subscribed observers: updated day views,
//! synchronizer state transitions, and fatal sync failures.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::scheduling::DayViewModel;
use crate::sync::SyncState;

/// Event types pushed to observers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Event {
    /// A watched day's view model was rebuilt
    ViewChanged(ViewChangedEvent),
    /// The change-feed synchronizer changed state
    SyncStateChanged(SyncStateChangedEvent),
    /// The change feed failed permanently; served data may be stale
    SyncFailed(SyncFailedEvent),
}

impl Event {
    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::ViewChanged(_) => "view_changed",
            Event::SyncStateChanged(_) => "sync_state_changed",
            Event::SyncFailed(_) => "sync_failed",
        }
    }

    /// The calendar date this event concerns, if any
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Event::ViewChanged(e) => Some(e.date),
            _ => None,
        }
    }
}

/// Updated view model for one watched day
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewChangedEvent {
    pub date: NaiveDate,
    pub view: DayViewModel,
}

/// Synchronizer state transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStateChangedEvent {
    pub state: SyncState,
    pub timestamp: DateTime<Utc>,
}

/// Fatal synchronization failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncFailedEvent {
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Wrapper for sending events with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

impl EventMessage {
    pub fn new(event: Event) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────
