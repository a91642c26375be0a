// Core algorithm exports
pub mod distance;
pub mod engine;
pub mod error;
pub mod validation;

pub use distance::{haversine_distance, DistanceMetric, Haversine, MEAN_EARTH_RADIUS_KM};
pub use engine::{AssignmentEngine, AssignmentReport, EngineConfig};
pub use error::{AssignmentError, CoordinateField};
pub use validation::{is_valid_coordinate, is_valid_latitude, is_valid_longitude};
