use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::zone::GeoPoint;

/// An order that the store has marked ready for delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryOrder {
    pub id: Uuid,
    pub store_id: Uuid,
    pub order_number: String,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub address: String,
    pub location: Option<GeoPoint>,
    pub subtotal: Decimal,
    pub country: String,
    pub prefer_whatsapp: bool,
    pub created_at: DateTime<Utc>,
}
