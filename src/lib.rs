//! # Expertcal Scheduling Core
//!
//! Multi-resource appointment booking engine for service businesses:
//! customers book time-bounded, multi-item services against a specific staff
//! resource on a specific calendar day.
//!
//! ## Architecture
//!
//! - **domain**: Bookings, service catalog, resources, validation
//! - **scheduling**: Aggregation, the interval index, advisory conflict
//!   checks and day-grid view models
//! - **sync**: Change-feed subscription keeping the index and live views
//!   consistent across concurrent viewers
//! - **notifications**: Broadcast fan-out of view updates to observers
//! - **shared**: Backoff and shutdown plumbing
//!
//! Conflict detection is advisory: overlaps are reported to the caller as
//! data, never enforced as a hard rejection. Persistence, transport, auth
//! and rendering belong to external collaborators.

pub mod config;
pub mod domain;
pub mod notifications;
pub mod scheduling;
pub mod shared;
pub mod sync;

pub use config::{default_config_path, AppConfig};

// Re-export the scheduling surface for easy access
pub use domain::{Booking, BookingItem, BookingStatus, Catalog, Resource, ServiceItem};
pub use scheduling::{
    aggregate, build_day_view, CalendarConfig, ConflictChecker, DayViewModel, ScheduleIndex,
};
pub use sync::{ChangeFeed, Synchronizer};

// Re-export notifications
pub use notifications::{create_event_bus, Event, EventBus, SharedEventBus};
