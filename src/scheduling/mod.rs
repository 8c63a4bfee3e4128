//! Scheduling core: aggregation, interval index, conflict checks, day views

pub mod aggregate;
pub mod conflict;
pub mod index;
pub mod view;

pub use aggregate::{aggregate, build_line_items, retain_capable, Aggregation, BookingTotals};
pub use conflict::{ConflictAdvisory, ConflictChecker};
pub use index::{ScheduleIndex, SlotKey};
pub use view::{build_day_view, BookingBlock, CalendarConfig, DayViewModel, ResourceColumn};
