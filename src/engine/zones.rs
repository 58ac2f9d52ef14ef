use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AppError, FieldError};
use crate::geo::polygon::{contains, is_valid_ring};
use crate::models::zone::{
    DeliveryQuote, DeliveryZone, GeoPoint, ZoneInput, ZoneMatch, ZonePatch,
};
use crate::store::ZoneStore;

const MIN_NAME_CHARS: usize = 2;
const COPY_SUFFIX: &str = " (Copy)";

/// Zone definitions for every store, plus coordinate-to-zone resolution.
pub struct ZoneCatalog {
    zones: Arc<dyn ZoneStore>,
}

impl ZoneCatalog {
    pub fn new(zones: Arc<dyn ZoneStore>) -> Self {
        Self { zones }
    }

    pub async fn create(&self, store_id: Uuid, input: ZoneInput) -> Result<DeliveryZone, AppError> {
        let problems = validate_all(&input);
        if !problems.is_empty() {
            return Err(AppError::ZoneValidation(problems));
        }

        let zone = DeliveryZone::from_input(store_id, input);
        self.zones.insert_zone(zone.clone()).await?;
        Ok(zone)
    }

    pub async fn get(&self, zone_id: Uuid) -> Result<DeliveryZone, AppError> {
        self.zones
            .get_zone(zone_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("zone {zone_id} not found")))
    }

    /// Staff edit. The merged zone is validated as a whole, reporting every
    /// bad field. Assignments already priced from this zone keep their fee.
    pub async fn update(&self, zone_id: Uuid, patch: ZonePatch) -> Result<DeliveryZone, AppError> {
        let current = self.get(zone_id).await?;
        let input = patch.apply(current.to_input());

        let problems = validate_all(&input);
        if !problems.is_empty() {
            return Err(AppError::ZoneValidation(problems));
        }

        let updated = current.edited(input);
        if !self.zones.update_zone(updated.clone()).await? {
            return Err(AppError::NotFound(format!("zone {zone_id} not found")));
        }

        info!(
            zone_id = %zone_id,
            store_id = %updated.store_id,
            active = updated.is_active,
            fee = %updated.delivery_fee,
            "zone updated"
        );
        Ok(updated)
    }

    /// All zones of a store in resolution order (ascending id).
    pub async fn list(&self, store_id: Uuid) -> Result<Vec<DeliveryZone>, AppError> {
        let mut zones = self.zones.list_zones(store_id).await?;
        zones.sort_by_key(|zone| zone.id);
        Ok(zones)
    }

    /// First active zone, by ascending id, whose boundary contains `point`.
    /// Zones without a boundary never match here; they are picked manually.
    pub async fn resolve(
        &self,
        store_id: Uuid,
        point: &GeoPoint,
    ) -> Result<Option<ZoneMatch>, AppError> {
        let zones = self.list(store_id).await?;
        let mut hits = zones.into_iter().filter(|zone| {
            zone.is_active
                && zone
                    .boundary
                    .as_deref()
                    .is_some_and(|ring| contains(point, ring))
        });

        let Some(zone) = hits.next() else {
            debug!(store_id = %store_id, lat = point.lat, lng = point.lng, "no zone matched");
            return Ok(None);
        };

        let overlapping = hits.count();
        if overlapping > 0 {
            warn!(
                store_id = %store_id,
                zone_id = %zone.id,
                overlapping,
                "point falls inside several active zones; lowest id wins"
            );
        }

        Ok(Some(ZoneMatch {
            fee: zone.delivery_fee,
            zone,
        }))
    }

    /// Persists an inactive copy of an existing zone.
    pub async fn duplicate_zone(&self, zone_id: Uuid) -> Result<DeliveryZone, AppError> {
        let original = self.get(zone_id).await?;
        let copy = duplicate(&original);
        self.zones.insert_zone(copy.clone()).await?;
        Ok(copy)
    }
}

/// First violated field, in form order.
pub fn validate(input: &ZoneInput) -> Result<(), AppError> {
    match validate_all(input).into_iter().next() {
        Some(problem) => Err(AppError::InvalidZoneField(problem)),
        None => Ok(()),
    }
}

/// Every violated field, so a form can flag them all at once.
pub fn validate_all(input: &ZoneInput) -> Vec<FieldError> {
    let mut problems = Vec::new();

    if input.name.trim().chars().count() < MIN_NAME_CHARS {
        problems.push(FieldError::new(
            "name",
            format!("must be at least {MIN_NAME_CHARS} characters"),
        ));
    }

    if input.delivery_fee < Decimal::ZERO {
        problems.push(FieldError::new("delivery_fee", "must not be negative"));
    }

    if input.min_order_amount < Decimal::ZERO {
        problems.push(FieldError::new("min_order_amount", "must not be negative"));
    }

    if let Some(threshold) = input.free_delivery_threshold {
        if threshold <= input.min_order_amount {
            problems.push(FieldError::new(
                "free_delivery_threshold",
                "must be greater than the minimum order amount",
            ));
        }
    }

    if input.estimated_minutes < 1 {
        problems.push(FieldError::new("estimated_minutes", "must be at least 1"));
    }

    if let Some(ring) = &input.boundary {
        if !is_valid_ring(ring) {
            problems.push(FieldError::new(
                "boundary",
                "needs at least 3 distinct points with valid coordinates",
            ));
        }
    }

    if !is_hex_color(&input.color) {
        problems.push(FieldError::new("color", "must look like #RRGGBB"));
    }

    problems
}

/// Inactive copy with a fresh id and a " (Copy)" name suffix.
pub fn duplicate(zone: &DeliveryZone) -> DeliveryZone {
    let now = Utc::now();
    DeliveryZone {
        id: Uuid::new_v4(),
        name: format!("{}{COPY_SUFFIX}", zone.name),
        is_active: false,
        created_at: now,
        updated_at: now,
        ..zone.clone()
    }
}

/// Fee actually charged for an order of `subtotal` in `zone`.
pub fn quote(zone: &DeliveryZone, subtotal: Decimal) -> DeliveryQuote {
    let free_delivery = zone
        .free_delivery_threshold
        .is_some_and(|threshold| subtotal >= threshold);

    DeliveryQuote {
        zone_id: zone.id,
        fee: if free_delivery {
            Decimal::ZERO
        } else {
            zone.delivery_fee
        },
        free_delivery,
        meets_minimum: subtotal >= zone.min_order_amount,
        estimated_minutes: zone.estimated_minutes,
    }
}

fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}
