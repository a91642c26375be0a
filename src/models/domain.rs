use serde::{Deserialize, Serialize};

/// Latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Delivery agent at its last known position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Courier {
    pub id: i64,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "hasActivePackage", default)]
    pub has_active_package: bool,
}

impl Courier {
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    /// Whether this courier may receive a new order under `policy`
    #[inline]
    pub fn is_eligible(&self, policy: EligibilityPolicy) -> bool {
        match policy {
            EligibilityPolicy::Free => !self.has_active_package,
            EligibilityPolicy::Flagged => self.has_active_package,
            EligibilityPolicy::Any => true,
        }
    }
}

/// Delivery request awaiting a courier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "packageType")]
    pub package_type: String,
}

impl Order {
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Result of matching one order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    #[serde(rename = "orderId")]
    pub order_id: i64,
    #[serde(rename = "courierId")]
    pub courier_id: i64,
    #[serde(rename = "distanceKm")]
    pub distance_km: f64,
}

/// Which couriers may receive a new order, keyed on `hasActivePackage`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityPolicy {
    /// Only couriers without an active package
    #[default]
    Free,
    /// Only couriers whose flag is set (flag read as "available")
    Flagged,
    /// The flag is ignored
    Any,
}

/// Range applied when validating order longitudes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LongitudeBounds {
    /// `[-180, 180]`
    #[default]
    Geographic,
    /// `[-90, 90]`, kept for compatibility with older runs
    LegacyLatitudeRange,
}

/// How the engine reacts to a per-order failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure and move on to the next order
    #[default]
    Continue,
    /// Stop the batch at the first failure
    Abort,
}

/// Courier query sent to the backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CourierFilter {
    #[default]
    All,
    Eligible(EligibilityPolicy),
}

impl CourierFilter {
    pub fn accepts(&self, courier: &Courier) -> bool {
        match self {
            CourierFilter::All => true,
            CourierFilter::Eligible(policy) => courier.is_eligible(*policy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn courier(has_active_package: bool) -> Courier {
        Courier {
            id: 1,
            latitude: 0.0,
            longitude: 0.0,
            has_active_package,
        }
    }

    #[test]
    fn test_eligibility_policies() {
        assert!(courier(false).is_eligible(EligibilityPolicy::Free));
        assert!(!courier(true).is_eligible(EligibilityPolicy::Free));
        assert!(courier(true).is_eligible(EligibilityPolicy::Flagged));
        assert!(!courier(false).is_eligible(EligibilityPolicy::Flagged));
        assert!(courier(true).is_eligible(EligibilityPolicy::Any));
        assert!(courier(false).is_eligible(EligibilityPolicy::Any));
    }

    #[test]
    fn test_courier_json_field_names() {
        let json = serde_json::to_value(courier(true)).unwrap();
        assert_eq!(json["hasActivePackage"], true);

        let parsed: Courier =
            serde_json::from_str(r#"{"id":7,"latitude":1.5,"longitude":2.5}"#).unwrap();
        assert_eq!(parsed.id, 7);
        assert!(!parsed.has_active_package);
    }

    #[test]
    fn test_policy_names() {
        let policy: EligibilityPolicy = serde_json::from_str(r#""any""#).unwrap();
        assert_eq!(policy, EligibilityPolicy::Any);
        let bounds: LongitudeBounds = serde_json::from_str(r#""legacy_latitude_range""#).unwrap();
        assert_eq!(bounds, LongitudeBounds::LegacyLatitudeRange);
        assert_eq!(FailurePolicy::default(), FailurePolicy::Continue);
    }
}
