//! Advisory conflict detection
//!
//! Overlap checks are warnings, not gates: the caller may create or save a
//! booking even when a conflict is reported. Because the check and the
//! subsequent write are not one transaction, two concurrent requests can
//! both pass the check and both land overlapping bookings. That window is a
//! documented property of the advisory model, inherited from the upstream
//! product behavior.

use std::sync::Arc;

use chrono::NaiveDate;
use metrics::counter;
use tracing::debug;

use crate::domain::{Booking, TimeInterval};
use crate::scheduling::index::ScheduleIndex;

/// A detected overlap, reported as data rather than an error
#[derive(Debug, Clone)]
pub struct ConflictAdvisory {
    /// The already-booked appointment that overlaps the candidate
    pub booking: Booking,
    /// The candidate interval that was checked
    pub candidate: TimeInterval,
}

/// Read-only overlap scanner over the schedule index
pub struct ConflictChecker {
    index: Arc<ScheduleIndex>,
}

impl ConflictChecker {
    pub fn new(index: Arc<ScheduleIndex>) -> Self {
        Self { index }
    }

    /// Report the first non-cancelled booking on (resource, date) whose
    /// interval overlaps `[start, start + duration)`.
    ///
    /// Half-open semantics: touching endpoints do not conflict. A candidate
    /// with `duration <= 0` has nothing to check and yields no conflict.
    /// `exclude_booking_id` skips the booking being edited when re-checking
    /// it against its own day.
    pub fn check(
        &self,
        resource_id: &str,
        date: NaiveDate,
        start_minute: i32,
        duration_minutes: i32,
        exclude_booking_id: Option<&str>,
    ) -> Option<ConflictAdvisory> {
        if duration_minutes <= 0 {
            return None;
        }

        let candidate = TimeInterval::from_start_duration(start_minute, duration_minutes);
        let hit = self
            .index
            .query(resource_id, date, false)
            .into_iter()
            .filter(|b| exclude_booking_id != Some(b.id.as_str()))
            .find(|b| b.interval().overlaps(&candidate));

        if let Some(ref booking) = hit {
            counter!("expertcal_conflicts_reported").increment(1);
            debug!(
                resource = resource_id,
                date = %date,
                candidate_start = candidate.start,
                candidate_end = candidate.end,
                conflicting = %booking.id,
                "Conflict advisory"
            );
        }

        hit.map(|booking| ConflictAdvisory { booking, candidate })
    }
}

// ── Tests ──────────────────────────────────────────────────────
