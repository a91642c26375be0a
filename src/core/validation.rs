use crate::models::LongitudeBounds;

/// Absolute bound for latitudes, in degrees
pub const LATITUDE_LIMIT: f64 = 90.0;

/// Absolute bound for longitudes, in degrees
pub const LONGITUDE_LIMIT: f64 = 180.0;

/// Check that a coordinate is numeric and lies within `[-90, 90]`
#[inline]
pub fn is_valid_coordinate(value: f64) -> bool {
    within(value, LATITUDE_LIMIT)
}

#[inline]
pub fn is_valid_latitude(value: f64) -> bool {
    within(value, LATITUDE_LIMIT)
}

/// Check a longitude against the configured bounds
///
/// `LegacyLatitudeRange` reproduces the historical check against `[-90, 90]`
/// and rejects valid longitudes such as 120°.
#[inline]
pub fn is_valid_longitude(value: f64, bounds: LongitudeBounds) -> bool {
    match bounds {
        LongitudeBounds::Geographic => within(value, LONGITUDE_LIMIT),
        LongitudeBounds::LegacyLatitudeRange => within(value, LATITUDE_LIMIT),
    }
}

#[inline]
fn within(value: f64, limit: f64) -> bool {
    value.is_finite() && (-limit..=limit).contains(&value)
}
