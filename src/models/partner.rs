use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

/// Rating assumed for partners nobody has rated yet.
pub const NEUTRAL_RATING: f64 = 3.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryPartner {
    pub id: Uuid,
    pub name: String,
    pub location: GeoPoint,
    pub capacity: u8,
    pub active_orders: u8,
    pub online: bool,
    pub verified: bool,
    pub rating: f64,
    pub ratings_count: u32,
    pub delivery_count: u64,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryPartner {
    pub fn is_eligible(&self) -> bool {
        self.online && self.verified && self.active_orders < self.capacity
    }

    pub fn effective_rating(&self) -> f64 {
        if self.ratings_count == 0 {
            NEUTRAL_RATING
        } else {
            self.rating
        }
    }

    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 1.0;
        }
        f64::from(self.active_orders) / f64::from(self.capacity)
    }

    pub fn record_rating(&mut self, stars: u8) {
        let total = self.rating * f64::from(self.ratings_count) + f64::from(stars);
        self.ratings_count += 1;
        self.rating = total / f64::from(self.ratings_count);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{DeliveryPartner, NEUTRAL_RATING};
    use crate::geo::GeoPoint;

    fn partner() -> DeliveryPartner {
        DeliveryPartner {
            id: Uuid::from_u128(1),
            name: "Rider".to_string(),
            location: GeoPoint { lat: 0.0, lng: 0.0 },
            capacity: 2,
            active_orders: 0,
            online: true,
            verified: true,
            rating: 0.0,
            ratings_count: 0,
            delivery_count: 0,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn unrated_partner_uses_neutral_rating() {
        assert_eq!(partner().effective_rating(), NEUTRAL_RATING);
    }

    #[test]
    fn ratings_average_out() {
        let mut p = partner();
        p.record_rating(5);
        p.record_rating(3);
        assert_eq!(p.ratings_count, 2);
        assert!((p.rating - 4.0).abs() < 1e-9);
    }

    #[test]
    fn full_or_offline_or_unverified_partner_is_not_eligible() {
        let mut full = partner();
        full.active_orders = 2;
        assert!(!full.is_eligible());

        let mut offline = partner();
        offline.online = false;
        assert!(!offline.is_eligible());

        let mut unverified = partner();
        unverified.verified = false;
        assert!(!unverified.is_eligible());

        assert!(partner().is_eligible());
    }
}
