//! Change feed subscription and index synchronization

pub mod feed;
pub mod memory;
pub mod synchronizer;

pub use feed::{BookingMutationEvent, ChangeFeed, FeedError, MutationKind};
pub use memory::InMemoryFeed;
pub use synchronizer::{SyncState, Synchronizer};
