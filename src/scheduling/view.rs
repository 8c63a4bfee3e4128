//! Day-grid view model builder
//!
//! Converts a day's bookings for one or more resources into a positioned
//! column layout for rendering. A pure transform over a snapshot: it never
//! queries storage, and it does not clip blocks that start before or run past
//! the visible window — clipping is the renderer's concern.

use chrono::{NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{Booking, BookingStatus, DayWindow, Resource};

/// Grid geometry for day views
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// First visible minute-of-day (default 05:00)
    pub window_start_minute: i32,
    /// One past the last visible minute-of-day (default 24:00)
    pub window_end_minute: i32,
    /// Minutes per grid row
    pub slot_minutes: i32,
    /// Pixel height of one grid row
    pub row_height_px: f32,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            window_start_minute: 300,
            window_end_minute: 1440,
            slot_minutes: 10,
            row_height_px: 20.0,
        }
    }
}

impl CalendarConfig {
    pub fn pixels_per_minute(&self) -> f32 {
        // Slot size below one minute has no grid geometry; treat it as 1
        self.row_height_px / self.slot_minutes.max(1) as f32
    }

    /// Vertical pixel offset of a minute-of-day within the window.
    /// Negative for minutes before the window start.
    pub fn offset_px(&self, minute: i32) -> f32 {
        (minute - self.window_start_minute) as f32 * self.pixels_per_minute()
    }
}

/// One positioned booking block within a resource column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingBlock {
    pub booking_id: String,
    pub customer_id: Option<String>,
    pub status: BookingStatus,
    pub start_minute: i32,
    pub duration_minutes: i32,
    pub top_offset_px: f32,
    pub height_px: f32,
    /// Joined line-item names, e.g. "Haircut + Coloring"
    pub label: String,
    /// Pass-through color from the first line item carrying one
    pub color: Option<String>,
}

/// One resource's column in the day grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceColumn {
    pub resource_id: String,
    pub label: String,
    /// Pass-through resource color tag
    pub color: Option<String>,
    /// True on holidays and closed weekdays; renderers gray these out
    pub closed: bool,
    pub working_window: Option<DayWindow>,
    pub lunch_break: Option<DayWindow>,
    pub blocks: Vec<BookingBlock>,
    /// Pixel offset of the current time in the resource's timezone;
    /// None outside the visible window
    pub now_offset_px: Option<f32>,
}

/// The positioned, resource-columned representation of one day
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayViewModel {
    pub date: NaiveDate,
    pub window_start_minute: i32,
    pub window_end_minute: i32,
    pub slot_minutes: i32,
    pub columns: Vec<ResourceColumn>,
    /// True while the backing index may be outdated after a sync failure
    pub stale: bool,
}

/// Build the day grid for the given resources from a booking snapshot.
///
/// Bookings for other dates or for resources not listed are ignored. Blocks
/// are positioned even when they fall partly or wholly outside the window.
pub fn build_day_view(
    resources: &[Resource],
    bookings: &[Booking],
    date: NaiveDate,
    config: &CalendarConfig,
) -> DayViewModel {
    let columns = resources
        .iter()
        .map(|resource| build_column(resource, bookings, date, config))
        .collect();

    DayViewModel {
        date,
        window_start_minute: config.window_start_minute,
        window_end_minute: config.window_end_minute,
        slot_minutes: config.slot_minutes,
        columns,
        stale: false,
    }
}

fn build_column(
    resource: &Resource,
    bookings: &[Booking],
    date: NaiveDate,
    config: &CalendarConfig,
) -> ResourceColumn {
    let mut blocks: Vec<BookingBlock> = bookings
        .iter()
        .filter(|b| b.resource_id == resource.id && b.date == date)
        .map(|b| position_block(b, config))
        .collect();
    blocks.sort_by_key(|b| b.start_minute);

    let window = resource.window_for(date);
    ResourceColumn {
        resource_id: resource.id.clone(),
        label: resource.name.clone(),
        color: resource.color.clone(),
        closed: window.is_none(),
        working_window: window,
        lunch_break: resource.lunch_break,
        blocks,
        now_offset_px: now_offset_px(resource, config),
    }
}

fn position_block(booking: &Booking, config: &CalendarConfig) -> BookingBlock {
    BookingBlock {
        booking_id: booking.id.clone(),
        customer_id: booking.customer_id.clone(),
        status: booking.status,
        start_minute: booking.start_minute,
        duration_minutes: booking.total_duration,
        top_offset_px: config.offset_px(booking.start_minute),
        height_px: booking.total_duration as f32 * config.pixels_per_minute(),
        label: booking
            .items
            .iter()
            .map(|i| i.name.as_str())
            .collect::<Vec<_>>()
            .join(" + "),
        color: booking.items.iter().find_map(|i| i.color.clone()),
    }
}

/// Current minute-of-day in an IANA timezone; None when the zone name does
/// not parse.
pub fn now_minute_in_zone(timezone: &str) -> Option<i32> {
    let tz: Tz = match timezone.parse() {
        Ok(tz) => tz,
        Err(_) => {
            warn!(timezone, "Unknown IANA timezone, omitting now indicator");
            return None;
        }
    };
    let now = Utc::now().with_timezone(&tz);
    Some((now.hour() * 60 + now.minute()) as i32)
}

fn now_offset_px(resource: &Resource, config: &CalendarConfig) -> Option<f32> {
    let minute = now_minute_in_zone(&resource.timezone)?;
    indicator_offset(minute, config)
}

/// Pixel offset for a "now" minute, omitted (not clamped) outside the window
fn indicator_offset(minute: i32, config: &CalendarConfig) -> Option<f32> {
    if minute < config.window_start_minute || minute >= config.window_end_minute {
        return None;
    }
    Some(config.offset_px(minute))
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BookingItem;

    fn day() -> NaiveDate {
        // A Monday
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    fn sample_resource() -> Resource {
        let mut r = Resource::new("exp-1", "Anna", "Europe/Berlin");
        r.color = Some("#3366ff".into());
        for weekday in 0..5 {
            r.working_hours[weekday] = Some(DayWindow::new(540, 1080));
        }
        r
    }

    fn booking(id: &str, start: i32, minutes: i32) -> Booking {
        Booking::new(
            id,
            "exp-1",
            day(),
            start,
            vec![BookingItem {
                service_item_id: "svc-cut".into(),
                name: "Haircut".into(),
                duration_minutes: minutes,
                price: None,
                color: Some("#ffaa00".into()),
            }],
        )
    }

    #[test]
    fn positions_block_within_window() {
        // ppm = 20 / 10 = 2; 09:00 start → (540 - 300) * 2 = 480
        let config = CalendarConfig::default();
        let view = build_day_view(&[sample_resource()], &[booking("a", 540, 60)], day(), &config);

        let block = &view.columns[0].blocks[0];
        assert_eq!(block.top_offset_px, 480.0);
        assert_eq!(block.height_px, 120.0);
        assert_eq!(block.label, "Haircut");
        assert_eq!(block.color.as_deref(), Some("#ffaa00"));
    }

    #[test]
    fn degenerate_slot_size_keeps_offsets_finite() {
        let config = CalendarConfig {
            slot_minutes: 0,
            ..CalendarConfig::default()
        };
        assert!(config.pixels_per_minute().is_finite());
        assert!(config.offset_px(540).is_finite());
    }

    #[test]
    fn does_not_clip_blocks_outside_window() {
        let config = CalendarConfig::default();
        // Starts 04:00, an hour before the 05:00 window
        let view = build_day_view(&[sample_resource()], &[booking("a", 240, 30)], day(), &config);
        assert_eq!(view.columns[0].blocks[0].top_offset_px, -120.0);
    }

    #[test]
    fn column_carries_resource_presentation_fields() {
        let config = CalendarConfig::default();
        let view = build_day_view(&[sample_resource()], &[], day(), &config);

        let column = &view.columns[0];
        assert_eq!(column.label, "Anna");
        assert_eq!(column.color.as_deref(), Some("#3366ff"));
        assert!(!column.closed);
        assert_eq!(column.working_window, Some(DayWindow::new(540, 1080)));
    }

    #[test]
    fn closed_column_on_holiday() {
        let mut resource = sample_resource();
        resource.holidays.insert(day());
        let view = build_day_view(&[resource], &[], day(), &CalendarConfig::default());
        assert!(view.columns[0].closed);
        assert!(view.columns[0].working_window.is_none());
    }

    #[test]
    fn ignores_bookings_for_other_dates_and_resources() {
        let config = CalendarConfig::default();
        let mut other_day = booking("other-day", 600, 30);
        other_day.date = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();
        let mut other_resource = booking("other-resource", 600, 30);
        other_resource.resource_id = "exp-2".into();

        let view = build_day_view(
            &[sample_resource()],
            &[booking("mine", 600, 30), other_day, other_resource],
            day(),
            &config,
        );
        assert_eq!(view.columns[0].blocks.len(), 1);
        assert_eq!(view.columns[0].blocks[0].booking_id, "mine");
    }

    #[test]
    fn blocks_sorted_by_start() {
        let config = CalendarConfig::default();
        let view = build_day_view(
            &[sample_resource()],
            &[booking("late", 900, 30), booking("early", 600, 30)],
            day(),
            &config,
        );
        let ids: Vec<_> = view.columns[0]
            .blocks
            .iter()
            .map(|b| b.booking_id.as_str())
            .collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn indicator_inside_window() {
        let config = CalendarConfig::default();
        assert_eq!(indicator_offset(540, &config), Some(480.0));
    }

    #[test]
    fn indicator_omitted_outside_window() {
        let config = CalendarConfig::default();
        assert!(indicator_offset(200, &config).is_none());
        assert!(indicator_offset(1440, &config).is_none());
    }

    #[test]
    fn now_minute_rejects_bad_zone() {
        assert!(now_minute_in_zone("Not/AZone").is_none());
        let minute = now_minute_in_zone("Europe/Berlin").unwrap();
        assert!((0..1440).contains(&minute));
    }

    #[test]
    fn pixels_per_minute_from_row_geometry() {
        let config = CalendarConfig {
            row_height_px: 20.0,
            slot_minutes: 10,
            ..CalendarConfig::default()
        };
        assert_eq!(config.pixels_per_minute(), 2.0);
    }
}
