use crate::models::GeoPoint;

/// Mean Earth radius in kilometers, used when no radius is configured
pub const MEAN_EARTH_RADIUS_KM: f64 = 6371.0;

/// Distance between two points, in kilometers
///
/// The assignment engine is generic over this trait so a different metric
/// (or a spatial index wrapping one) can replace the brute-force haversine scan.
pub trait DistanceMetric {
    fn distance_km(&self, from: GeoPoint, to: GeoPoint) -> f64;
}

/// Great-circle distance on a sphere of the given radius
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Haversine {
    radius_km: f64,
}

impl Haversine {
    pub fn new(radius_km: f64) -> Self {
        Self { radius_km }
    }

    pub fn radius_km(&self) -> f64 {
        self.radius_km
    }
}

impl Default for Haversine {
    fn default() -> Self {
        Self::new(MEAN_EARTH_RADIUS_KM)
    }
}

impl DistanceMetric for Haversine {
    #[inline]
    fn distance_km(&self, from: GeoPoint, to: GeoPoint) -> f64 {
        haversine_distance_on(
            self.radius_km,
            from.latitude,
            from.longitude,
            to.latitude,
            to.longitude,
        )
    }
}

/// Calculate the Haversine distance between two points in kilometers
///
/// # Arguments
/// * `lat1` - Latitude of first point in degrees
/// * `lon1` - Longitude of first point in degrees
/// * `lat2` - Latitude of second point in degrees
/// * `lon2` - Longitude of second point in degrees
///
/// # Returns
/// Distance in kilometers on a sphere of [`MEAN_EARTH_RADIUS_KM`]
#[inline]
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    haversine_distance_on(MEAN_EARTH_RADIUS_KM, lat1, lon1, lat2, lon2)
}

/// Haversine distance on a sphere with an explicit radius
#[inline]
pub fn haversine_distance_on(radius_km: f64, lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    // Rounding can push `a` just past 1.0 for near-antipodal points
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    radius_km * c
}
