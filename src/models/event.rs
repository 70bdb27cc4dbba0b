use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::actor::Actor;
use crate::models::status::OrderStatus;

/// One applied status change. `seq` starts at 1 and is dense per order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    pub seq: u64,
    pub order_id: Uuid,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub actor: Actor,
    pub at: DateTime<Utc>,
}
