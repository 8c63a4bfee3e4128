//! Service catalog: bookable items and the resources that perform them
//!
//! The catalog is an immutable snapshot supplied by the external data-access
//! collaborator. Bookings denormalize item duration/price at creation time,
//! so later catalog edits never change historical totals.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::{DomainError, DomainResult};
use super::resource::Resource;

/// Bookable catalog entry with a fixed duration and an optional price
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceItem {
    pub id: String,
    pub name: String,
    /// Service length in minutes, always > 0
    pub duration_minutes: i32,
    /// Price in the business currency; None = price on request
    pub price: Option<Decimal>,
    /// Presentation color tag, passed through to view models
    pub color: Option<String>,
    pub is_active: bool,
}

impl ServiceItem {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        duration_minutes: i32,
        price: Option<Decimal>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            duration_minutes,
            price,
            color: None,
            is_active: true,
        }
    }
}

/// Immutable reference-data snapshot: service items plus resources
pub struct Catalog {
    items: HashMap<String, ServiceItem>,
    resources: HashMap<String, Resource>,
}

impl Catalog {
    pub fn new(items: Vec<ServiceItem>, resources: Vec<Resource>) -> Self {
        Self {
            items: items.into_iter().map(|i| (i.id.clone(), i)).collect(),
            resources: resources.into_iter().map(|r| (r.id.clone(), r)).collect(),
        }
    }

    pub fn item(&self, id: &str) -> Option<&ServiceItem> {
        self.items.get(id)
    }

    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resources.get(id)
    }

    /// Item lookup for strict callers that treat unknown ids as an error
    pub fn require_item(&self, id: &str) -> DomainResult<&ServiceItem> {
        self.items.get(id).ok_or(DomainError::NotFound {
            entity: "service item",
            field: "id",
            value: id.to_string(),
        })
    }

    pub fn require_resource(&self, id: &str) -> DomainResult<&Resource> {
        self.resources.get(id).ok_or(DomainError::NotFound {
            entity: "resource",
            field: "id",
            value: id.to_string(),
        })
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    /// Items currently offered for booking
    pub fn active_items(&self) -> Vec<&ServiceItem> {
        self.items.values().filter(|i| i.is_active).collect()
    }

    /// Active items the given resource is able to perform.
    ///
    /// Callers selecting a resource before line items must restrict the
    /// selectable items to this set.
    pub fn items_for_resource(&self, resource: &Resource) -> Vec<&ServiceItem> {
        self.items
            .values()
            .filter(|i| i.is_active && resource.can_perform(&i.id))
            .collect()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

// ── Tests ──────────────────────────────────────────────────────
