//! Change feed synchronizer
//!
//! Owns the subscription to the booking mutation stream and is the single
//! writer applying feed events to the schedule index. After every applied
//! mutation it rebuilds the affected watched day views and broadcasts them
//! to observers.
//!
//! Lifecycle: Disconnected → Connecting → Live → (Reconnecting ↔ Live) →
//! Disconnected. Transient feed failures reconnect forever with capped
//! exponential backoff; each reconnect re-fetches every watched key in full
//! rather than replaying missed events. A fatal failure emits one
//! `SyncFailed`, marks the index stale and halts until manually restarted.

use std::sync::Arc;
use std::sync::RwLock;

use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::feed::{BookingMutationEvent, ChangeFeed, FeedError, MutationKind};
use crate::domain::Resource;
use crate::notifications::{Event, SharedEventBus, SyncFailedEvent, SyncStateChangedEvent, ViewChangedEvent};
use crate::scheduling::view::{build_day_view, CalendarConfig};
use crate::scheduling::{ScheduleIndex, SlotKey};
use crate::shared::backoff::{Backoff, BackoffConfig};
use crate::shared::shutdown::ShutdownSignal;

/// Subscription lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncState {
    Disconnected,
    Connecting,
    Live,
    Reconnecting,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Live => "Live",
            Self::Reconnecting => "Reconnecting",
        }
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

enum PumpOutcome {
    Disconnected,
    Shutdown,
}

/// Applies booking mutation events to the schedule index and fans updated
/// day views out to observers
pub struct Synchronizer {
    feed: Arc<dyn ChangeFeed>,
    index: Arc<ScheduleIndex>,
    bus: SharedEventBus,
    calendar: CalendarConfig,
    /// Resources rendered per watched calendar day
    watches: DashMap<NaiveDate, Vec<Resource>>,
    state: RwLock<SyncState>,
    backoff_config: BackoffConfig,
}

impl Synchronizer {
    pub fn new(feed: Arc<dyn ChangeFeed>, index: Arc<ScheduleIndex>, bus: SharedEventBus) -> Self {
        Self {
            feed,
            index,
            bus,
            calendar: CalendarConfig::default(),
            watches: DashMap::new(),
            state: RwLock::new(SyncState::Disconnected),
            backoff_config: BackoffConfig::default(),
        }
    }

    pub fn with_calendar(mut self, calendar: CalendarConfig) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn with_backoff(mut self, config: BackoffConfig) -> Self {
        self.backoff_config = config;
        self
    }

    pub fn state(&self) -> SyncState {
        *self.state.read().expect("sync state lock")
    }

    /// Start observing a day for the given resource columns.
    ///
    /// When already Live the day is hydrated from the feed first, so bookings
    /// that predate the watch appear in the initial view; otherwise the view
    /// is built from current index contents and the connect-time resync fills
    /// it. Feed events keep it fresh afterwards.
    pub async fn watch_day(&self, date: NaiveDate, resources: Vec<Resource>) {
        self.watches.insert(date, resources.clone());
        if self.state() == SyncState::Live {
            if let Err(e) = self.hydrate_day(date, &resources).await {
                warn!(error = %e, %date, "Initial fetch for watched day failed; next resync fills it");
            }
        }
        self.publish_view(date);
    }

    /// Stop observing a day; in-flight rebuilds for it are simply dropped
    pub fn unwatch_day(&self, date: NaiveDate) {
        self.watches.remove(&date);
    }

    /// Spawn the subscription task. Tear it down via the shutdown signal.
    pub fn start(self: Arc<Self>, shutdown: ShutdownSignal) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    async fn run(&self, shutdown: ShutdownSignal) {
        let mut backoff = Backoff::new(self.backoff_config.clone());
        let mut first_attempt = true;

        loop {
            if shutdown.is_triggered() {
                self.set_state(SyncState::Disconnected);
                return;
            }

            self.set_state(if first_attempt {
                SyncState::Connecting
            } else {
                SyncState::Reconnecting
            });

            match self.feed.connect().await {
                Ok(receiver) => match self.resync().await {
                    Ok(()) => {
                        backoff.reset();
                        self.index.set_stale(false);
                        self.set_state(SyncState::Live);
                        first_attempt = false;

                        match self.pump(receiver, &shutdown).await {
                            PumpOutcome::Shutdown => {
                                self.set_state(SyncState::Disconnected);
                                return;
                            }
                            PumpOutcome::Disconnected => {
                                warn!("Change feed closed, reconnecting");
                            }
                        }
                    }
                    Err(e) if e.is_fatal() => {
                        self.fail(e);
                        return;
                    }
                    Err(e) => {
                        warn!(error = %e, "Resync failed, will retry");
                    }
                },
                Err(e) if e.is_fatal() => {
                    self.fail(e);
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "Feed connect failed, will retry");
                }
            }

            counter!("expertcal_sync_reconnects").increment(1);
            let delay = backoff.next_delay();
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.notified().wait() => {
                    self.set_state(SyncState::Disconnected);
                    return;
                }
            }
        }
    }

    async fn pump(
        &self,
        mut receiver: mpsc::Receiver<BookingMutationEvent>,
        shutdown: &ShutdownSignal,
    ) -> PumpOutcome {
        loop {
            tokio::select! {
                event = receiver.recv() => match event {
                    Some(event) => self.apply_event(event),
                    None => return PumpOutcome::Disconnected,
                },
                _ = shutdown.notified().wait() => return PumpOutcome::Shutdown,
            }
        }
    }

    /// Apply one mutation to the index and republish affected day views.
    ///
    /// Events for the same booking are applied in delivery order; if the feed
    /// reorders, the last applied snapshot wins.
    fn apply_event(&self, event: BookingMutationEvent) {
        counter!("expertcal_feed_events_applied").increment(1);

        let booking = event.booking;
        let prior = self.index.location_of(&booking.id);
        let target_date = booking.date;

        match event.kind {
            MutationKind::Created | MutationKind::Updated => {
                if let Err(e) = self.index.upsert(booking) {
                    warn!(error = %e, "Dropped invalid booking event");
                    return;
                }
            }
            MutationKind::Deleted => match prior {
                // Prefer the indexed location; the event's coordinates can
                // lag behind a concurrent move
                Some(ref key) => self.index.remove(&booking.id, &key.resource_id, key.date),
                None => self.index.remove(&booking.id, &booking.resource_id, booking.date),
            },
        }

        self.publish_view(target_date);
        if let Some(prev) = prior {
            if prev.date != target_date {
                self.publish_view(prev.date);
            }
        }
    }

    /// Rebuild one watched day from the index and broadcast it
    fn publish_view(&self, date: NaiveDate) {
        let Some(resources) = self.watches.get(&date).map(|e| e.value().clone()) else {
            return;
        };

        let mut bookings = Vec::new();
        for resource in &resources {
            bookings.extend(self.index.query(&resource.id, date, false));
        }

        let mut view = build_day_view(&resources, &bookings, date, &self.calendar);
        view.stale = self.index.is_stale();
        self.bus.publish(Event::ViewChanged(ViewChangedEvent { date, view }));
    }

    /// Re-fetch every watched (resource, date) key in full.
    ///
    /// Self-healing after an outage: anything missed while disconnected is
    /// picked up wholesale, no gap-fill replay.
    async fn resync(&self) -> Result<(), FeedError> {
        let watched: Vec<(NaiveDate, Vec<Resource>)> = self
            .watches
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();

        for (date, resources) in watched {
            self.hydrate_day(date, &resources).await?;
            self.publish_view(date);
        }
        Ok(())
    }

    /// Fetch one day's bookings per resource and swap them into the index
    async fn hydrate_day(&self, date: NaiveDate, resources: &[Resource]) -> Result<(), FeedError> {
        for resource in resources {
            let bookings = self.feed.fetch_day(&resource.id, date).await?;
            self.index
                .replace_day(&SlotKey::new(resource.id.clone(), date), bookings);
        }
        Ok(())
    }

    fn set_state(&self, state: SyncState) {
        {
            let mut current = self.state.write().expect("sync state lock");
            if *current == state {
                return;
            }
            info!(from = %current, to = %state, "Sync state changed");
            *current = state;
        }
        self.bus.publish(Event::SyncStateChanged(SyncStateChangedEvent {
            state,
            timestamp: Utc::now(),
        }));
    }

    fn fail(&self, err: FeedError) {
        error!(error = %err, "Change feed failed permanently, serving stale data");
        counter!("expertcal_sync_fatal_failures").increment(1);
        self.index.set_stale(true);
        self.bus.publish(Event::SyncFailed(SyncFailedEvent {
            reason: err.to_string(),
            timestamp: Utc::now(),
        }));
        self.set_state(SyncState::Disconnected);
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::{Booking, BookingItem};
    use crate::notifications::{create_event_bus, EventSubscriber};
    use crate::sync::memory::InMemoryFeed;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    fn resource() -> Resource {
        Resource::new("exp-1", "Anna", "Europe/Berlin")
    }

    fn booking(id: &str, date: NaiveDate, start: i32) -> Booking {
        Booking::new(
            id,
            "exp-1",
            date,
            start,
            vec![BookingItem {
                service_item_id: "svc".into(),
                name: "Service".into(),
                duration_minutes: 60,
                price: None,
                color: None,
            }],
        )
    }

    struct Harness {
        feed: Arc<InMemoryFeed>,
        index: Arc<ScheduleIndex>,
        synchronizer: Arc<Synchronizer>,
        subscriber: EventSubscriber,
        shutdown: ShutdownSignal,
        handle: tokio::task::JoinHandle<()>,
    }

    async fn start_live_harness() -> Harness {
        let feed = Arc::new(InMemoryFeed::new());
        let index = Arc::new(ScheduleIndex::new());
        let bus = create_event_bus();
        let mut subscriber = bus.subscribe();

        let synchronizer = Arc::new(
            Synchronizer::new(feed.clone(), index.clone(), bus).with_backoff(BackoffConfig {
                initial_delay: Duration::from_millis(10),
                multiplier: 2.0,
                max_delay: Duration::from_millis(50),
            }),
        );
        synchronizer.watch_day(day(2), vec![resource()]).await;

        let shutdown = ShutdownSignal::new();
        let handle = synchronizer.clone().start(shutdown.clone());
        wait_for_state(&synchronizer, SyncState::Live).await;
        drain_pending(&mut subscriber).await;

        Harness {
            feed,
            index,
            synchronizer,
            subscriber,
            shutdown,
            handle,
        }
    }

    async fn wait_for_state(synchronizer: &Synchronizer, wanted: SyncState) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while synchronizer.state() != wanted {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("synchronizer never reached {wanted}"));
    }

    /// Swallow startup noise (state transitions, initial views) so tests
    /// only observe the events they cause
    async fn drain_pending(subscriber: &mut EventSubscriber) {
        while tokio::time::timeout(Duration::from_millis(100), subscriber.recv())
            .await
            .is_ok()
        {}
    }

    async fn next_view_change(subscriber: &mut EventSubscriber) -> ViewChangedEvent {
        loop {
            let message = tokio::time::timeout(Duration::from_secs(2), subscriber.recv())
                .await
                .expect("timeout waiting for event")
                .expect("bus closed");
            if let Event::ViewChanged(view) = message.event {
                return view;
            }
        }
    }

    #[tokio::test]
    async fn created_event_lands_in_index_and_view() {
        let mut h = start_live_harness().await;

        h.feed.emit(MutationKind::Created, booking("a", day(2), 600)).await;

        let change = next_view_change(&mut h.subscriber).await;
        assert_eq!(change.date, day(2));
        assert_eq!(change.view.columns[0].blocks.len(), 1);
        assert_eq!(change.view.columns[0].blocks[0].booking_id, "a");
        assert_eq!(h.index.query("exp-1", day(2), false).len(), 1);

        h.shutdown.trigger();
        h.handle.await.unwrap();
    }

    #[tokio::test]
    async fn date_change_moves_booking_between_days() {
        let mut h = start_live_harness().await;
        h.synchronizer.watch_day(day(3), vec![resource()]).await;
        // Consume the initial (empty) view published for the new watch
        next_view_change(&mut h.subscriber).await;

        let mut b = booking("a", day(2), 600);
        h.feed.emit(MutationKind::Created, b.clone()).await;
        next_view_change(&mut h.subscriber).await;

        b.reschedule("exp-1", day(3), 600);
        h.feed.emit(MutationKind::Updated, b).await;

        // Views for both the new and the old day are republished
        let mut republished = Vec::new();
        republished.push(next_view_change(&mut h.subscriber).await.date);
        republished.push(next_view_change(&mut h.subscriber).await.date);
        assert!(republished.contains(&day(2)));
        assert!(republished.contains(&day(3)));

        assert!(h.index.query("exp-1", day(2), false).is_empty());
        assert_eq!(h.index.query("exp-1", day(3), false).len(), 1);

        h.shutdown.trigger();
        h.handle.await.unwrap();
    }

    #[tokio::test]
    async fn deleted_event_clears_the_slot() {
        let mut h = start_live_harness().await;

        let b = booking("a", day(2), 600);
        h.feed.emit(MutationKind::Created, b.clone()).await;
        next_view_change(&mut h.subscriber).await;

        h.feed.emit(MutationKind::Deleted, b).await;
        let change = next_view_change(&mut h.subscriber).await;
        assert!(change.view.columns[0].blocks.is_empty());
        assert_eq!(h.index.booking_count(), 0);

        h.shutdown.trigger();
        h.handle.await.unwrap();
    }

    #[tokio::test]
    async fn cancellation_update_hides_booking_from_view() {
        let mut h = start_live_harness().await;

        let mut b = booking("a", day(2), 600);
        h.feed.emit(MutationKind::Created, b.clone()).await;
        next_view_change(&mut h.subscriber).await;

        b.cancel();
        h.feed.emit(MutationKind::Updated, b).await;
        let change = next_view_change(&mut h.subscriber).await;
        assert!(change.view.columns[0].blocks.is_empty());
        // Retained in the index for history
        assert_eq!(h.index.query("exp-1", day(2), true).len(), 1);

        h.shutdown.trigger();
        h.handle.await.unwrap();
    }

    #[tokio::test]
    async fn reconnect_resyncs_watched_days_in_full() {
        let mut h = start_live_harness().await;

        // Mutations made while disconnected are invisible to the event
        // stream; only fetch_day can surface them
        h.feed.disconnect();
        h.feed.seed(booking("missed", day(2), 700));

        wait_for_state(&h.synchronizer, SyncState::Live).await;
        let change = next_view_change(&mut h.subscriber).await;
        assert_eq!(change.view.columns[0].blocks.len(), 1);
        assert_eq!(change.view.columns[0].blocks[0].booking_id, "missed");

        h.shutdown.trigger();
        h.handle.await.unwrap();
    }

    #[tokio::test]
    async fn fatal_connect_halts_with_sync_failed_and_stale_index() {
        let feed = Arc::new(InMemoryFeed::new());
        feed.fail_next_connect(FeedError::Fatal("invalid credentials".into()));
        let index = Arc::new(ScheduleIndex::new());
        let bus = create_event_bus();
        let mut subscriber = bus.subscribe();

        let synchronizer = Arc::new(Synchronizer::new(feed, index.clone(), bus));
        let handle = synchronizer.clone().start(ShutdownSignal::new());
        handle.await.unwrap();

        assert_eq!(synchronizer.state(), SyncState::Disconnected);
        assert!(index.is_stale());

        let mut saw_failure = false;
        while let Ok(Some(message)) =
            tokio::time::timeout(Duration::from_millis(100), subscriber.recv()).await
        {
            if let Event::SyncFailed(e) = message.event {
                assert!(e.reason.contains("invalid credentials"));
                saw_failure = true;
                break;
            }
        }
        assert!(saw_failure);
    }

    #[tokio::test]
    async fn transient_connect_failure_retries_until_live() {
        let feed = Arc::new(InMemoryFeed::new());
        feed.fail_next_connect(FeedError::Transient("outage".into()));
        let index = Arc::new(ScheduleIndex::new());
        let bus = create_event_bus();

        let synchronizer = Arc::new(
            Synchronizer::new(feed, index, bus).with_backoff(BackoffConfig {
                initial_delay: Duration::from_millis(10),
                multiplier: 2.0,
                max_delay: Duration::from_millis(50),
            }),
        );
        let shutdown = ShutdownSignal::new();
        let handle = synchronizer.clone().start(shutdown.clone());

        wait_for_state(&synchronizer, SyncState::Live).await;

        shutdown.trigger();
        handle.await.unwrap();
        assert_eq!(synchronizer.state(), SyncState::Disconnected);
    }

    #[tokio::test]
    async fn shutdown_tears_down_quietly() {
        let h = start_live_harness().await;
        h.shutdown.trigger();
        h.handle.await.unwrap();
        assert_eq!(h.synchronizer.state(), SyncState::Disconnected);
    }

    #[tokio::test]
    async fn watch_day_publishes_initial_view() {
        let feed = Arc::new(InMemoryFeed::new());
        let index = Arc::new(ScheduleIndex::new());
        index.upsert(booking("a", day(2), 600)).unwrap();
        let bus = create_event_bus();
        let mut subscriber = bus.subscribe();

        let synchronizer = Synchronizer::new(feed, index, bus);
        synchronizer.watch_day(day(2), vec![resource()]).await;

        let change = next_view_change(&mut subscriber).await;
        assert_eq!(change.view.columns[0].blocks.len(), 1);
    }

    #[tokio::test]
    async fn watching_a_new_day_while_live_hydrates_from_the_feed() {
        let mut h = start_live_harness().await;

        // Booking existed in the store before anyone watched its day
        h.feed.seed(booking("existing", day(5), 540));
        h.synchronizer.watch_day(day(5), vec![resource()]).await;

        let change = next_view_change(&mut h.subscriber).await;
        assert_eq!(change.date, day(5));
        assert_eq!(change.view.columns[0].blocks.len(), 1);
        assert_eq!(change.view.columns[0].blocks[0].booking_id, "existing");
        assert_eq!(h.index.query("exp-1", day(5), false).len(), 1);

        h.shutdown.trigger();
        h.handle.await.unwrap();
    }

    #[tokio::test]
    async fn events_for_unwatched_days_update_index_silently() {
        let mut h = start_live_harness().await;

        h.feed.emit(MutationKind::Created, booking("a", day(9), 600)).await;

        // Indexed, but no ViewChanged for an unwatched day
        tokio::time::timeout(Duration::from_millis(200), async {
            loop {
                tokio::time::sleep(Duration::from_millis(10)).await;
                if h.index.query("exp-1", day(9), false).len() == 1 {
                    break;
                }
            }
        })
        .await
        .expect("event never applied");

        let mut saw_view_change = false;
        while let Ok(Some(message)) =
            tokio::time::timeout(Duration::from_millis(100), h.subscriber.recv()).await
        {
            if matches!(message.event, Event::ViewChanged(_)) {
                saw_view_change = true;
            }
        }
        assert!(!saw_view_change, "no view change expected for unwatched day");

        h.shutdown.trigger();
        h.handle.await.unwrap();
    }
}
