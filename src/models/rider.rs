use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::zone::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    Bicycle,
    Motorcycle,
    Car,
    Van,
}

/// Dispatch status. Only `RiderRegistry` moves a rider between these.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RiderStatus {
    Available,
    Busy,
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rider {
    pub id: Uuid,
    pub store_id: Uuid,
    pub name: String,
    pub phone: String,
    pub vehicle_type: VehicleType,
    pub vehicle_number: Option<String>,
    pub is_active: bool,
    pub is_online: bool,
    pub status: RiderStatus,
    pub rating: f64,
    pub rating_count: u32,
    pub total_deliveries: u64,
    pub location: Option<GeoPoint>,
    /// Bumped by the store on every conditional write.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rider {
    /// Eligible for a new claim right now.
    pub fn is_dispatchable(&self) -> bool {
        self.is_active && self.status == RiderStatus::Available
    }

    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}
