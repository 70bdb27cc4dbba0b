use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6_371.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }

    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let delta_lat = (other.lat - self.lat).to_radians();
        let delta_lng = (other.lng - self.lng).to_radians();

        let h = (delta_lat / 2.0).sin().powi(2)
            + self.lat.to_radians().cos()
                * other.lat.to_radians().cos()
                * (delta_lng / 2.0).sin().powi(2);

        2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
    }
}

pub fn trip_fee_cents(pickup: &GeoPoint, dropoff: &GeoPoint, base_cents: u64, per_km_cents: u64) -> u64 {
    let distance = pickup.distance_km(dropoff);
    base_cents + (distance * per_km_cents as f64).round() as u64
}

#[cfg(test)]
mod tests {
    use super::{GeoPoint, trip_fee_cents};

    #[test]
    fn zero_distance_for_same_point() {
        let shop = GeoPoint {
            lat: 19.076,
            lng: 72.8777,
        };
        assert!(shop.distance_km(&shop) < 1e-9);
    }

    #[test]
    fn mumbai_to_pune_is_around_120_km() {
        let mumbai = GeoPoint {
            lat: 19.076,
            lng: 72.8777,
        };
        let pune = GeoPoint {
            lat: 18.5204,
            lng: 73.8567,
        };
        assert!((mumbai.distance_km(&pune) - 120.0).abs() < 5.0);
    }

    #[test]
    fn fee_is_base_for_zero_distance() {
        let p = GeoPoint { lat: 10.0, lng: 10.0 };
        assert_eq!(trip_fee_cents(&p, &p, 250, 80), 250);
    }

    #[test]
    fn out_of_range_coordinates_are_invalid() {
        assert!(!GeoPoint { lat: 91.0, lng: 0.0 }.is_valid());
        assert!(GeoPoint { lat: -33.9, lng: 151.2 }.is_valid());
    }
}
