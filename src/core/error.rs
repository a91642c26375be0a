use thiserror::Error;

/// Which half of a coordinate failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateField {
    Latitude,
    Longitude,
}

impl std::fmt::Display for CoordinateField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordinateField::Latitude => f.write_str("latitude"),
            CoordinateField::Longitude => f.write_str("longitude"),
        }
    }
}

/// Failure to assign a single order
///
/// These are item-level errors: the engine's failure policy decides whether
/// the batch continues past them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssignmentError {
    #[error("order {order_id} has invalid {field}: {value}")]
    InvalidCoordinate {
        order_id: i64,
        field: CoordinateField,
        value: f64,
    },

    #[error("no couriers available for order {order_id}")]
    NoCouriersAvailable { order_id: i64 },

    #[error("no eligible courier for order {order_id}")]
    NoEligibleCourier { order_id: i64 },
}

impl AssignmentError {
    pub fn order_id(&self) -> i64 {
        match self {
            AssignmentError::InvalidCoordinate { order_id, .. }
            | AssignmentError::NoCouriersAvailable { order_id }
            | AssignmentError::NoEligibleCourier { order_id } => *order_id,
        }
    }

    /// Stable machine-readable name of the failure
    pub fn kind(&self) -> &'static str {
        match self {
            AssignmentError::InvalidCoordinate { .. } => "invalid_coordinate",
            AssignmentError::NoCouriersAvailable { .. } => "no_couriers_available",
            AssignmentError::NoEligibleCourier { .. } => "no_eligible_courier",
        }
    }
}
