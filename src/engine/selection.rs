use std::str::FromStr;

use uuid::Uuid;

use crate::models::order::Order;
use crate::models::partner::DeliveryPartner;

const DISTANCE_WEIGHT: f64 = 0.50;
const LOAD_WEIGHT: f64 = 0.30;
const RATING_WEIGHT: f64 = 0.20;

/// Picks a partner for an order that was assigned without an explicit partner.
///
/// `candidates` are already filtered to eligible partners and sorted by id. The
/// same order and candidate slice must always produce the same answer.
pub trait SelectionPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    fn select(&self, order: &Order, candidates: &[DeliveryPartner]) -> Option<Uuid>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    Scored,
    LeastBusy,
}

impl PolicyKind {
    pub fn build(self) -> Box<dyn SelectionPolicy> {
        match self {
            PolicyKind::Scored => Box::new(ScoredPolicy),
            PolicyKind::LeastBusy => Box::new(LeastBusyPolicy),
        }
    }
}

impl FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scored" => Ok(PolicyKind::Scored),
            "least_busy" | "least-busy" => Ok(PolicyKind::LeastBusy),
            other => Err(format!(
                "unknown selection policy: {other}, expected scored/least_busy"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    pub distance_score: f64,
    pub load_score: f64,
    pub rating_score: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        (self.distance_score * DISTANCE_WEIGHT)
            + (self.load_score * LOAD_WEIGHT)
            + (self.rating_score * RATING_WEIGHT)
    }
}

pub fn compute_score(partner: &DeliveryPartner, order: &Order) -> ScoreBreakdown {
    let distance_km = partner.location.distance_km(&order.pickup);

    ScoreBreakdown {
        distance_score: 1.0 / (1.0 + distance_km.max(0.0)),
        load_score: (1.0 - partner.utilization()).clamp(0.0, 1.0),
        rating_score: (partner.effective_rating() / 5.0).clamp(0.0, 1.0),
    }
}

pub struct ScoredPolicy;

impl SelectionPolicy for ScoredPolicy {
    fn name(&self) -> &'static str {
        "scored"
    }

    fn select(&self, order: &Order, candidates: &[DeliveryPartner]) -> Option<Uuid> {
        candidates
            .iter()
            .map(|partner| (partner.id, compute_score(partner, order).total()))
            .max_by(|a, b| a.1.total_cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
            .map(|(id, _)| id)
    }
}

pub struct LeastBusyPolicy;

impl SelectionPolicy for LeastBusyPolicy {
    fn name(&self) -> &'static str {
        "least_busy"
    }

    fn select(&self, _order: &Order, candidates: &[DeliveryPartner]) -> Option<Uuid> {
        candidates
            .iter()
            .min_by(|a, b| {
                a.active_orders
                    .cmp(&b.active_orders)
                    .then_with(|| b.effective_rating().total_cmp(&a.effective_rating()))
                    .then_with(|| a.id.cmp(&b.id))
            })
            .map(|partner| partner.id)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{LeastBusyPolicy, PolicyKind, ScoredPolicy, SelectionPolicy, compute_score};
    use crate::geo::GeoPoint;
    use crate::models::order::Order;
    use crate::models::partner::DeliveryPartner;

    fn partner(id_seed: u128, lat: f64, lng: f64, load: u8, rating: f64) -> DeliveryPartner {
        DeliveryPartner {
            id: Uuid::from_u128(id_seed),
            name: "test-partner".to_string(),
            location: GeoPoint { lat, lng },
            capacity: 3,
            active_orders: load,
            online: true,
            verified: true,
            rating,
            ratings_count: 1,
            delivery_count: 0,
            updated_at: Utc::now(),
        }
    }

    fn order_at(lat: f64, lng: f64) -> Order {
        Order::place(
            Uuid::from_u128(100),
            Uuid::from_u128(200),
            Uuid::from_u128(300),
            GeoPoint { lat, lng },
            GeoPoint {
                lat: lat + 0.01,
                lng: lng + 0.01,
            },
            Vec::new(),
        )
    }

    #[test]
    fn closer_partner_scores_higher_when_other_factors_match() {
        let order = order_at(28.6139, 77.2090);
        let near = partner(1, 28.6140, 77.2091, 0, 4.5);
        let far = partner(2, 28.9, 77.6, 0, 4.5);

        assert!(compute_score(&near, &order).total() > compute_score(&far, &order).total());
        assert_eq!(
            ScoredPolicy.select(&order, &[near.clone(), far]),
            Some(near.id)
        );
    }

    #[test]
    fn loaded_partner_is_penalized() {
        let order = order_at(28.6139, 77.2090);
        let light = partner(1, 28.6140, 77.2091, 0, 4.5);
        let heavy = partner(2, 28.6140, 77.2091, 2, 4.5);

        assert!(compute_score(&light, &order).load_score > compute_score(&heavy, &order).load_score);
    }

    #[test]
    fn scored_ties_go_to_lowest_id() {
        let order = order_at(28.6139, 77.2090);
        let a = partner(7, 28.6140, 77.2091, 0, 4.0);
        let b = partner(3, 28.6140, 77.2091, 0, 4.0);

        assert_eq!(ScoredPolicy.select(&order, &[b.clone(), a.clone()]), Some(b.id));
        assert_eq!(ScoredPolicy.select(&order, &[a, b.clone()]), Some(b.id));
    }

    #[test]
    fn least_busy_prefers_idle_then_rating() {
        let order = order_at(0.0, 0.0);
        let busy = partner(1, 0.0, 0.0, 2, 5.0);
        let idle_low = partner(2, 0.0, 0.0, 0, 3.0);
        let idle_high = partner(3, 0.0, 0.0, 0, 4.8);

        let picked = LeastBusyPolicy.select(&order, &[busy, idle_low, idle_high.clone()]);
        assert_eq!(picked, Some(idle_high.id));
    }

    #[test]
    fn empty_candidate_list_selects_nobody() {
        let order = order_at(0.0, 0.0);
        assert_eq!(ScoredPolicy.select(&order, &[]), None);
        assert_eq!(LeastBusyPolicy.select(&order, &[]), None);
    }

    #[test]
    fn policy_kind_parses_config_values() {
        assert_eq!("least_busy".parse::<PolicyKind>().unwrap(), PolicyKind::LeastBusy);
        assert_eq!("SCORED".parse::<PolicyKind>().unwrap().build().name(), "scored");
        assert!("nearest".parse::<PolicyKind>().is_err());
    }
}
