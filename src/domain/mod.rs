pub mod booking;
pub mod catalog;
pub mod error;
pub mod resource;

// Re-export commonly used types
pub use booking::{Booking, BookingItem, BookingStatus, TimeInterval};
pub use catalog::{Catalog, ServiceItem};
pub use error::{DomainError, DomainResult};
pub use resource::{DayWindow, Resource};
