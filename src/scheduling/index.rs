//! Schedule index: per-(resource, date) booked intervals
//!
//! The index is the authoritative in-memory view of which minutes are taken.
//! Many request handlers read it concurrently; writes are serialized per key
//! by the map's shard locks. All times are integer minutes-of-day.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use dashmap::DashMap;
use metrics::gauge;
use tracing::{debug, warn};

use crate::domain::{Booking, DomainResult};

/// Index key: one resource's calendar day
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub resource_id: String,
    pub date: NaiveDate,
}

impl SlotKey {
    pub fn new(resource_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            resource_id: resource_id.into(),
            date,
        }
    }

    pub fn of(booking: &Booking) -> Self {
        Self::new(booking.resource_id.clone(), booking.date)
    }
}

/// Ordered interval index over booking snapshots.
///
/// Cancelled bookings stay in the index (history, conflict-exclusion lookups)
/// but are excluded from default query results. Exactly one entry exists per
/// live booking; a booking whose resource or date changes is moved to its new
/// key on upsert. Out-of-order upserts are last-write-wins; the feed does not
/// carry versions to reconcile against.
pub struct ScheduleIndex {
    /// Bookings per key, ordered by start minute
    days: DashMap<SlotKey, Vec<Booking>>,
    /// Current key per booking id, for move detection
    locations: DashMap<String, SlotKey>,
    /// Set when the change feed has permanently failed and data may be old
    stale: AtomicBool,
}

impl ScheduleIndex {
    pub fn new() -> Self {
        Self {
            days: DashMap::new(),
            locations: DashMap::new(),
            stale: AtomicBool::new(false),
        }
    }

    /// Insert or replace a booking's interval under its (resource, date) key.
    ///
    /// Rejects bookings that fail local validation; the index is never left
    /// holding an inconsistent entry. Idempotent for identical snapshots.
    pub fn upsert(&self, booking: Booking) -> DomainResult<()> {
        booking.validate()?;

        let key = SlotKey::of(&booking);
        let previous = self.locations.get(&booking.id).map(|e| e.value().clone());

        if let Some(prev) = previous {
            if prev != key {
                self.detach(&booking.id, &prev);
                debug!(
                    booking = %booking.id,
                    from_resource = %prev.resource_id,
                    from_date = %prev.date,
                    to_resource = %key.resource_id,
                    to_date = %key.date,
                    "Booking moved between index keys"
                );
            }
        }

        {
            let mut day = self.days.entry(key.clone()).or_default();
            match day.iter().position(|b| b.id == booking.id) {
                Some(i) => day[i] = booking.clone(),
                None => day.push(booking.clone()),
            }
            day.sort_by_key(|b| b.start_minute);
        }
        self.locations.insert(booking.id, key);
        self.record_size();
        Ok(())
    }

    /// Delete a booking's interval. Unknown ids are a logged no-op.
    pub fn remove(&self, booking_id: &str, resource_id: &str, date: NaiveDate) {
        let key = SlotKey::new(resource_id, date);
        let found = self.detach(booking_id, &key);
        self.locations
            .remove_if(booking_id, |_, stored| stored == &key);
        if !found {
            warn!(
                booking = booking_id,
                resource = resource_id,
                date = %date,
                "Remove for booking not present in index, ignoring"
            );
        }
        self.record_size();
    }

    /// Snapshot of a day's bookings ordered by start minute.
    ///
    /// Returns owned copies: callers iterate without observing concurrent
    /// mutation. Cancelled bookings appear only with `include_cancelled`.
    pub fn query(&self, resource_id: &str, date: NaiveDate, include_cancelled: bool) -> Vec<Booking> {
        let key = SlotKey::new(resource_id, date);
        match self.days.get(&key) {
            Some(day) => day
                .iter()
                .filter(|b| include_cancelled || !b.is_cancelled())
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Replace a key's contents wholesale, used to resynchronize after a feed
    /// outage. Invalid snapshots are skipped with a warning.
    pub fn replace_day(&self, key: &SlotKey, bookings: Vec<Booking>) {
        let mut valid: Vec<Booking> = bookings
            .into_iter()
            .filter(|b| {
                if b.resource_id != key.resource_id || b.date != key.date {
                    warn!(booking = %b.id, "Resync booking does not belong to its key, skipping");
                    return false;
                }
                match b.validate() {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(booking = %b.id, error = %e, "Resync booking failed validation, skipping");
                        false
                    }
                }
            })
            .collect();
        valid.sort_by_key(|b| b.start_minute);

        let fresh_ids: Vec<String> = valid.iter().map(|b| b.id.clone()).collect();
        let old = self.days.insert(key.clone(), valid);

        // Unlink entries that disappeared from this key during the outage
        if let Some(old) = old {
            for stale in old.iter().filter(|b| !fresh_ids.contains(&b.id)) {
                self.locations.remove_if(&stale.id, |_, stored| stored == key);
            }
        }
        for id in fresh_ids {
            self.locations.insert(id, key.clone());
        }
        self.record_size();
    }

    /// Key a booking is currently filed under, if any
    pub fn location_of(&self, booking_id: &str) -> Option<SlotKey> {
        self.locations.get(booking_id).map(|e| e.value().clone())
    }

    /// Number of bookings currently indexed (cancelled included)
    pub fn booking_count(&self) -> usize {
        self.locations.len()
    }

    pub fn set_stale(&self, stale: bool) {
        self.stale.store(stale, Ordering::SeqCst);
    }

    /// True while the index may be serving outdated data after a fatal feed
    /// failure
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::SeqCst)
    }

    fn detach(&self, booking_id: &str, key: &SlotKey) -> bool {
        match self.days.get_mut(key) {
            Some(mut day) => {
                let before = day.len();
                day.retain(|b| b.id != booking_id);
                day.len() != before
            }
            None => false,
        }
    }

    fn record_size(&self) {
        gauge!("expertcal_indexed_bookings").set(self.locations.len() as f64);
    }
}

impl Default for ScheduleIndex {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ──────────────────────────────────────────────────────
