pub mod polygon;

use crate::models::zone::GeoPoint;

pub use polygon::contains;

const EARTH_RADIUS_KM: f64 = 6_371.0;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

#[cfg(test)]
mod tests {
    use super::haversine_km;
    use crate::models::zone::GeoPoint;

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint::new(-33.4489, -70.6693);
        assert!(haversine_km(&p, &p) < 1e-9);
    }

    #[test]
    fn santiago_to_valparaiso_is_around_100_km() {
        let santiago = GeoPoint::new(-33.4489, -70.6693);
        let valparaiso = GeoPoint::new(-33.0472, -71.6127);
        let distance = haversine_km(&santiago, &valparaiso);
        assert!((distance - 98.0).abs() < 5.0);
    }
}
