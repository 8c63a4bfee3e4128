//! Booking domain entity
//!
//! A booking reserves one resource's time for one or more service items on a
//! single calendar date. Its effective interval is `[start, start + total
//! duration)` in resource-local minutes; bookings never cross midnight.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::catalog::ServiceItem;
use super::error::{DomainError, DomainResult};

/// Booking status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    /// Confirmed by the business
    Confirmed,
    /// Awaiting confirmation
    Pending,
    /// Cancelled; retained for history but freed from the calendar
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "Confirmed",
            Self::Pending => "Pending",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "Confirmed" => Self::Confirmed,
            "Pending" => Self::Pending,
            "Cancelled" => Self::Cancelled,
            _ => Self::Pending,
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Half-open [start, end) range of minutes-of-day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: i32,
    pub end: i32,
}

impl TimeInterval {
    pub fn from_start_duration(start: i32, duration: i32) -> Self {
        Self {
            start,
            end: start + duration,
        }
    }

    /// Overlap test. Touching endpoints do not overlap.
    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        self.start < other.end && self.end > other.start
    }

    pub fn duration(&self) -> i32 {
        self.end - self.start
    }
}

/// Line item owned by a booking.
///
/// Duration and price are denormalized from the catalog at selection time so
/// later catalog edits do not change a stored booking's totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingItem {
    pub service_item_id: String,
    pub name: String,
    pub duration_minutes: i32,
    pub price: Option<Decimal>,
    pub color: Option<String>,
}

impl BookingItem {
    pub fn from_catalog(item: &ServiceItem) -> Self {
        Self {
            service_item_id: item.id.clone(),
            name: item.name.clone(),
            duration_minutes: item.duration_minutes,
            price: item.price,
            color: item.color.clone(),
        }
    }
}

/// A reservation of one resource's time on one calendar date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub resource_id: String,
    /// Calendar day in the resource's local time
    pub date: NaiveDate,
    /// Minute-of-day (0-1439), resource-local
    pub start_minute: i32,
    pub status: BookingStatus,
    pub items: Vec<BookingItem>,
    /// Sum of line-item durations in minutes
    pub total_duration: i32,
    /// Sum of line-item prices; unpriced items contribute zero
    pub total_price: Decimal,
    pub customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(
        id: impl Into<String>,
        resource_id: impl Into<String>,
        date: NaiveDate,
        start_minute: i32,
        items: Vec<BookingItem>,
    ) -> Self {
        let mut booking = Self {
            id: id.into(),
            resource_id: resource_id.into(),
            date,
            start_minute,
            status: BookingStatus::Pending,
            items,
            total_duration: 0,
            total_price: Decimal::ZERO,
            customer_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        booking.recompute_totals();
        booking
    }

    fn recompute_totals(&mut self) {
        self.total_duration = self.items.iter().map(|i| i.duration_minutes).sum();
        self.total_price = self
            .items
            .iter()
            .filter_map(|i| i.price)
            .sum::<Decimal>();
    }

    /// Replace the line items and recompute totals
    pub fn set_items(&mut self, items: Vec<BookingItem>) {
        self.items = items;
        self.recompute_totals();
        self.updated_at = Utc::now();
    }

    /// Move the booking to another resource, date or start time.
    ///
    /// Callers must re-run aggregation (line items outside the new resource's
    /// capability set are dropped, not flagged) and the conflict check.
    pub fn reschedule(
        &mut self,
        resource_id: impl Into<String>,
        date: NaiveDate,
        start_minute: i32,
    ) {
        self.resource_id = resource_id.into();
        self.date = date;
        self.start_minute = start_minute;
        self.updated_at = Utc::now();
    }

    pub fn confirm(&mut self) {
        self.status = BookingStatus::Confirmed;
        self.updated_at = Utc::now();
    }

    pub fn cancel(&mut self) {
        self.status = BookingStatus::Cancelled;
        self.updated_at = Utc::now();
    }

    pub fn mark_pending(&mut self) {
        self.status = BookingStatus::Pending;
        self.updated_at = Utc::now();
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == BookingStatus::Cancelled
    }

    /// The booked [start, start + total_duration) interval
    pub fn interval(&self) -> TimeInterval {
        TimeInterval::from_start_duration(self.start_minute, self.total_duration)
    }

    /// Local invariants checked before a booking touches the schedule index
    pub fn validate(&self) -> DomainResult<()> {
        if self.start_minute < 0 || self.start_minute >= 1440 {
            return Err(DomainError::Validation(format!(
                "start minute {} outside 0-1439",
                self.start_minute
            )));
        }
        if self.is_cancelled() {
            return Ok(());
        }
        if self.status == BookingStatus::Confirmed && self.items.is_empty() {
            return Err(DomainError::Validation(
                "confirmed booking has no line items".into(),
            ));
        }
        if !self.items.is_empty() && self.total_duration <= 0 {
            return Err(DomainError::Validation(format!(
                "booking {} has non-positive total duration {}",
                self.id, self.total_duration
            )));
        }
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────
