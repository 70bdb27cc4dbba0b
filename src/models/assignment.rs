use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub partner_id: Uuid,
    pub fee_cents: u64,
    pub created_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
    pub rating: Option<u8>,
}

impl Assignment {
    pub fn is_released(&self) -> bool {
        self.released_at.is_some()
    }
}
