use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;
use crate::models::status::OrderStatus;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub quantity: u32,
    pub unit_price_cents: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub status: OrderStatus,
    pub shop_id: Uuid,
    pub customer_id: Uuid,
    pub address_id: Uuid,
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
    pub items: Vec<OrderItem>,
    pub total_cents: u64,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub status_changed_at: DateTime<Utc>,
}

impl Order {
    pub fn place(
        shop_id: Uuid,
        customer_id: Uuid,
        address_id: Uuid,
        pickup: GeoPoint,
        dropoff: GeoPoint,
        items: Vec<OrderItem>,
    ) -> Self {
        let now = Utc::now();
        let total_cents = items
            .iter()
            .map(|item| item.unit_price_cents.saturating_mul(u64::from(item.quantity)))
            .fold(0u64, u64::saturating_add);

        Self {
            id: Uuid::new_v4(),
            status: OrderStatus::Placed,
            shop_id,
            customer_id,
            address_id,
            pickup,
            dropoff,
            items,
            total_cents,
            version: 0,
            created_at: now,
            status_changed_at: now,
        }
    }
}
