// Model exports
pub mod domain;
pub mod responses;

pub use domain::{
    Assignment, Courier, CourierFilter, EligibilityPolicy, FailurePolicy, GeoPoint,
    LongitudeBounds, Order,
};
pub use responses::{ErrorResponse, FailureRecord, RunSummary};
