//! Booking aggregation
//!
//! Computes a booking's total duration and price from a selection of catalog
//! items. Pure functions, no I/O.

use rust_decimal::Decimal;
use tracing::warn;

use crate::domain::{BookingItem, Catalog, Resource};

/// Aggregated totals for a line-item selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingTotals {
    pub duration_minutes: i32,
    pub price: Decimal,
}

/// Result of aggregating a selection.
///
/// Unknown ids contribute zero to the totals (lenient, matching the upstream
/// data source) but are reported here so strict callers can reject them.
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub totals: BookingTotals,
    pub unknown_ids: Vec<String>,
}

/// Sum duration and price over the referenced catalog items.
///
/// Order-independent: the totals for {X, Y} equal the totals for {Y, X}.
/// Items with no price contribute zero to the price total.
pub fn aggregate(item_ids: &[String], catalog: &Catalog) -> Aggregation {
    let mut duration_minutes = 0;
    let mut price = Decimal::ZERO;
    let mut unknown_ids = Vec::new();

    for id in item_ids {
        match catalog.item(id) {
            Some(item) => {
                duration_minutes += item.duration_minutes;
                price += item.price.unwrap_or(Decimal::ZERO);
            }
            None => unknown_ids.push(id.clone()),
        }
    }

    if !unknown_ids.is_empty() {
        warn!(
            unknown = ?unknown_ids,
            "Aggregation referenced unknown service items, treated as zero"
        );
    }

    Aggregation {
        totals: BookingTotals {
            duration_minutes,
            price,
        },
        unknown_ids,
    }
}

/// Drop selected item ids the given resource cannot perform.
///
/// Applied when the resource changes after items were chosen: items outside
/// the new resource's capability set are removed from the selection, not
/// merely flagged. Returns the dropped ids.
pub fn retain_capable(item_ids: &mut Vec<String>, resource: &Resource) -> Vec<String> {
    let mut dropped = Vec::new();
    item_ids.retain(|id| {
        if resource.can_perform(id) {
            true
        } else {
            dropped.push(id.clone());
            false
        }
    });
    if !dropped.is_empty() {
        warn!(
            resource = %resource.id,
            dropped = ?dropped,
            "Dropped line items outside the selected resource's capabilities"
        );
    }
    dropped
}

/// Materialize line items for a selection, skipping unknown ids.
///
/// Duration/price are copied out of the catalog so the booking keeps its
/// totals even if the catalog changes later.
pub fn build_line_items(item_ids: &[String], catalog: &Catalog) -> Vec<BookingItem> {
    item_ids
        .iter()
        .filter_map(|id| catalog.item(id).map(BookingItem::from_catalog))
        .collect()
}

// ── Tests ──────────────────────────────────────────────────────
