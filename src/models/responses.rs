use serde::{Deserialize, Serialize};
use crate::core::AssignmentReport;
use crate::models::domain::Assignment;

/// Structured output of one assignment run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(rename = "totalOrders")]
    pub total_orders: usize,
    pub assignments: Vec<Assignment>,
    pub failures: Vec<FailureRecord>,
    pub halted: bool,
    #[serde(rename = "generatedAt")]
    pub generated_at: chrono::DateTime<chrono::Utc>,
}

/// An order that could not be assigned
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    #[serde(rename = "orderId")]
    pub order_id: i64,
    pub kind: String,
    pub message: String,
}

impl RunSummary {
    pub fn from_report(
        report: &AssignmentReport,
        total_orders: usize,
        generated_at: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            total_orders,
            assignments: report.assignments().cloned().collect(),
            failures: report
                .failures()
                .map(|err| FailureRecord {
                    order_id: err.order_id(),
                    kind: err.kind().to_string(),
                    message: err.to_string(),
                })
                .collect(),
            halted: report.halted,
            generated_at,
        }
    }
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
