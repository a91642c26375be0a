use crate::core::{
    distance::{DistanceMetric, Haversine},
    error::{AssignmentError, CoordinateField},
    validation::{is_valid_latitude, is_valid_longitude},
};
use crate::models::{Assignment, Courier, EligibilityPolicy, FailurePolicy, LongitudeBounds, Order};

/// Matching policy knobs
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineConfig {
    pub eligibility: EligibilityPolicy,
    pub longitude_bounds: LongitudeBounds,
    pub failure_policy: FailurePolicy,
}

/// Result of one batch, in order input order
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentReport {
    pub outcomes: Vec<Result<Assignment, AssignmentError>>,
    /// Set when the abort policy stopped the batch early
    pub halted: bool,
}

impl AssignmentReport {
    pub fn assignments(&self) -> impl Iterator<Item = &Assignment> {
        self.outcomes.iter().filter_map(|o| o.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &AssignmentError> {
        self.outcomes.iter().filter_map(|o| o.as_ref().err())
    }

    pub fn first_failure(&self) -> Option<&AssignmentError> {
        self.failures().next()
    }
}

/// Nearest-courier assignment engine
///
/// For every order:
/// 1. Coordinate validation
/// 2. Eligibility filtering of the courier snapshot
/// 3. Single scan for the minimum distance (first courier wins ties)
#[derive(Debug, Clone)]
pub struct AssignmentEngine<M = Haversine> {
    metric: M,
    config: EngineConfig,
}

impl AssignmentEngine<Haversine> {
    pub fn with_defaults() -> Self {
        Self::new(Haversine::default(), EngineConfig::default())
    }
}

impl<M: DistanceMetric> AssignmentEngine<M> {
    pub fn new(metric: M, config: EngineConfig) -> Self {
        Self { metric, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Assign every order to its nearest eligible courier
    ///
    /// `couriers` must be in a stable order; ties resolve to the earliest entry.
    pub fn assign_all(&self, couriers: &[Courier], orders: &[Order]) -> AssignmentReport {
        let mut outcomes = Vec::with_capacity(orders.len());
        let mut halted = false;

        for order in orders {
            let outcome = self.assign(order, couriers);

            match &outcome {
                Ok(assignment) => tracing::debug!(
                    order_id = assignment.order_id,
                    courier_id = assignment.courier_id,
                    distance_km = assignment.distance_km,
                    "order assigned"
                ),
                Err(err) => tracing::debug!(order_id = order.id, error = %err, "order not assigned"),
            }

            let failed = outcome.is_err();
            outcomes.push(outcome);

            if failed && self.config.failure_policy == FailurePolicy::Abort {
                halted = outcomes.len() < orders.len();
                break;
            }
        }

        AssignmentReport { outcomes, halted }
    }

    /// Find the nearest eligible courier for a single order
    pub fn assign(&self, order: &Order, couriers: &[Courier]) -> Result<Assignment, AssignmentError> {
        self.validate(order)?;

        if couriers.is_empty() {
            return Err(AssignmentError::NoCouriersAvailable { order_id: order.id });
        }

        let origin = order.location();
        let mut shortest = f64::INFINITY;
        let mut best: Option<&Courier> = None;

        for courier in couriers
            .iter()
            .filter(|c| c.is_eligible(self.config.eligibility))
        {
            let distance = self.metric.distance_km(origin, courier.location());
            // Strict comparison keeps the earliest courier on ties
            if distance < shortest {
                shortest = distance;
                best = Some(courier);
            }
        }

        best.map(|courier| Assignment {
            order_id: order.id,
            courier_id: courier.id,
            distance_km: shortest,
        })
        .ok_or(AssignmentError::NoEligibleCourier { order_id: order.id })
    }

    fn validate(&self, order: &Order) -> Result<(), AssignmentError> {
        if !is_valid_latitude(order.latitude) {
            return Err(AssignmentError::InvalidCoordinate {
                order_id: order.id,
                field: CoordinateField::Latitude,
                value: order.latitude,
            });
        }
        if !is_valid_longitude(order.longitude, self.config.longitude_bounds) {
            return Err(AssignmentError::InvalidCoordinate {
                order_id: order.id,
                field: CoordinateField::Longitude,
                value: order.longitude,
            });
        }
        Ok(())
    }
}

impl Default for AssignmentEngine<Haversine> {
    fn default() -> Self {
        Self::with_defaults()
    }
}
