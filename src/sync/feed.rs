//! Change feed port
//!
//! The external change-feed collaborator delivers booking mutation events
//! carrying full, self-consistent booking snapshots (never diffs). Transport
//! is its concern; this crate only consumes the stream.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::Booking;

/// What happened to the booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationKind {
    Created,
    Updated,
    Deleted,
}

/// One booking mutation delivered by the feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingMutationEvent {
    pub kind: MutationKind,
    /// Full booking snapshot after the mutation (before it, for deletes)
    pub booking: Booking,
}

#[derive(Debug, Clone, Error)]
pub enum FeedError {
    /// Recoverable (network blip, feed restart); retried with backoff
    #[error("Transient feed error: {0}")]
    Transient(String),

    /// Unrecoverable (invalid credentials, revoked access); halts the
    /// subscription until manually restarted
    #[error("Fatal feed error: {0}")]
    Fatal(String),
}

impl FeedError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, FeedError::Fatal(_))
    }
}

/// Subscription to an external stream of booking mutations.
///
/// `connect` opens the event channel; the channel closing signals a
/// disconnect. `fetch_day` re-reads one (resource, date) key wholesale and is
/// used to resynchronize after an outage instead of replaying missed events.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn connect(&self) -> Result<mpsc::Receiver<BookingMutationEvent>, FeedError>;

    async fn fetch_day(
        &self,
        resource_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<Booking>, FeedError>;
}
