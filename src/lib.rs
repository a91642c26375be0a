//! Courier Algo - nearest-courier assignment for pending delivery orders
//!
//! This library provides the batch matching routine: haversine distance,
//! coordinate validation, a time-to-live courier cache, and the engine that
//! picks the nearest eligible courier for every order.

pub mod config;
pub mod core;
pub mod models;
pub mod output;
pub mod services;

// Re-export commonly used types
pub use crate::core::{
    haversine_distance, AssignmentEngine, AssignmentError, AssignmentReport, EngineConfig, Haversine,
};
pub use crate::models::{Assignment, Courier, EligibilityPolicy, FailurePolicy, LongitudeBounds, Order};
