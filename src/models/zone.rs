use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryZone {
    pub id: Uuid,
    pub store_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub delivery_fee: Decimal,
    pub min_order_amount: Decimal,
    pub free_delivery_threshold: Option<Decimal>,
    pub estimated_minutes: u32,
    /// Ordered ring of vertices. `None` means the zone can only be picked manually.
    pub boundary: Option<Vec<GeoPoint>>,
    pub color: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Staff-editable fields of a zone, as submitted by the admin UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub delivery_fee: Decimal,
    #[serde(default)]
    pub min_order_amount: Decimal,
    #[serde(default)]
    pub free_delivery_threshold: Option<Decimal>,
    pub estimated_minutes: u32,
    #[serde(default)]
    pub boundary: Option<Vec<GeoPoint>>,
    #[serde(default = "default_zone_color")]
    pub color: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

pub fn default_zone_color() -> String {
    "#3B82F6".to_string()
}

fn default_active() -> bool {
    true
}

impl DeliveryZone {
    pub fn from_input(store_id: Uuid, input: ZoneInput) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            store_id,
            name: input.name.trim().to_string(),
            description: input.description,
            delivery_fee: input.delivery_fee,
            min_order_amount: input.min_order_amount,
            free_delivery_threshold: input.free_delivery_threshold,
            estimated_minutes: input.estimated_minutes,
            boundary: input.boundary,
            color: input.color,
            is_active: input.is_active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Same zone with every editable field taken from `input`. Identity,
    /// owner and creation time are kept.
    pub fn edited(&self, input: ZoneInput) -> Self {
        Self {
            id: self.id,
            store_id: self.store_id,
            created_at: self.created_at,
            ..Self::from_input(self.store_id, input)
        }
    }

    pub fn to_input(&self) -> ZoneInput {
        ZoneInput {
            name: self.name.clone(),
            description: self.description.clone(),
            delivery_fee: self.delivery_fee,
            min_order_amount: self.min_order_amount,
            free_delivery_threshold: self.free_delivery_threshold,
            estimated_minutes: self.estimated_minutes,
            boundary: self.boundary.clone(),
            color: self.color.clone(),
            is_active: self.is_active,
        }
    }
}

/// Partial edit of a zone. Absent fields keep their value; an explicit
/// `null` clears the optional ones.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ZonePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub delivery_fee: Option<Decimal>,
    #[serde(default)]
    pub min_order_amount: Option<Decimal>,
    #[serde(default, deserialize_with = "nullable")]
    pub free_delivery_threshold: Option<Option<Decimal>>,
    #[serde(default)]
    pub estimated_minutes: Option<u32>,
    #[serde(default, deserialize_with = "nullable")]
    pub boundary: Option<Option<Vec<GeoPoint>>>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl ZonePatch {
    pub fn apply(self, mut input: ZoneInput) -> ZoneInput {
        if let Some(name) = self.name {
            input.name = name;
        }
        if let Some(description) = self.description {
            input.description = description;
        }
        if let Some(fee) = self.delivery_fee {
            input.delivery_fee = fee;
        }
        if let Some(minimum) = self.min_order_amount {
            input.min_order_amount = minimum;
        }
        if let Some(threshold) = self.free_delivery_threshold {
            input.free_delivery_threshold = threshold;
        }
        if let Some(minutes) = self.estimated_minutes {
            input.estimated_minutes = minutes;
        }
        if let Some(boundary) = self.boundary {
            input.boundary = boundary;
        }
        if let Some(color) = self.color {
            input.color = color;
        }
        if let Some(active) = self.is_active {
            input.is_active = active;
        }
        input
    }
}

fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Outcome of matching a coordinate against a store's zones.
#[derive(Debug, Clone, Serialize)]
pub struct ZoneMatch {
    pub zone: DeliveryZone,
    pub fee: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryQuote {
    pub zone_id: Uuid,
    pub fee: Decimal,
    pub free_delivery: bool,
    pub meets_minimum: bool,
    pub estimated_minutes: u32,
}
