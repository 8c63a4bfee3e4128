//! In-memory change feed for development and testing

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::mpsc;

use super::feed::{BookingMutationEvent, ChangeFeed, FeedError, MutationKind};
use crate::domain::Booking;

/// Default event channel capacity
const DEFAULT_CAPACITY: usize = 256;

/// A change feed backed by an in-process booking store.
///
/// `emit` applies a mutation to the store and delivers it to the connected
/// subscriber; `fetch_day` reads the store directly, so a resync after a
/// simulated outage observes every mutation made while disconnected.
pub struct InMemoryFeed {
    bookings: DashMap<String, Booking>,
    sender: Mutex<Option<mpsc::Sender<BookingMutationEvent>>>,
    next_connect_error: Mutex<Option<FeedError>>,
    capacity: usize,
}

impl InMemoryFeed {
    pub fn new() -> Self {
        Self {
            bookings: DashMap::new(),
            sender: Mutex::new(None),
            next_connect_error: Mutex::new(None),
            capacity: DEFAULT_CAPACITY,
        }
    }

    /// Put a booking in the store without emitting an event
    pub fn seed(&self, booking: Booking) {
        self.bookings.insert(booking.id.clone(), booking);
    }

    /// Apply a mutation to the store and deliver it to the subscriber, if any
    pub async fn emit(&self, kind: MutationKind, booking: Booking) {
        match kind {
            MutationKind::Deleted => {
                self.bookings.remove(&booking.id);
            }
            MutationKind::Created | MutationKind::Updated => {
                self.bookings.insert(booking.id.clone(), booking.clone());
            }
        }

        let sender = self.sender.lock().expect("feed sender lock").clone();
        if let Some(tx) = sender {
            let _ = tx.send(BookingMutationEvent { kind, booking }).await;
        }
    }

    /// Drop the subscriber channel, simulating a feed disconnect
    pub fn disconnect(&self) {
        *self.sender.lock().expect("feed sender lock") = None;
    }

    /// Make the next `connect` call fail with the given error
    pub fn fail_next_connect(&self, error: FeedError) {
        *self.next_connect_error.lock().expect("feed error lock") = Some(error);
    }
}

impl Default for InMemoryFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChangeFeed for InMemoryFeed {
    async fn connect(&self) -> Result<mpsc::Receiver<BookingMutationEvent>, FeedError> {
        if let Some(err) = self.next_connect_error.lock().expect("feed error lock").take() {
            return Err(err);
        }
        let (tx, rx) = mpsc::channel(self.capacity);
        *self.sender.lock().expect("feed sender lock") = Some(tx);
        Ok(rx)
    }

    async fn fetch_day(
        &self,
        resource_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<Booking>, FeedError> {
        Ok(self
            .bookings
            .iter()
            .filter(|b| b.resource_id == resource_id && b.date == date)
            .map(|b| b.value().clone())
            .collect())
    }
}

// ── Tests ──────────────────────────────────────────────────────
