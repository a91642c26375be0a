use std::io::Write;

use crate::core::AssignmentError;
use crate::models::{ErrorResponse, FailurePolicy};
use crate::output::OutputFormat;
use crate::services::dispatcher::DispatchError;

/// Message shown to the operator when a run fails; details go to the log
pub const USER_FACING_MESSAGE: &str = "An error occurred. Please try again later.";

/// Central place where failures are logged and signalled
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorReporter {
    policy: FailurePolicy,
}

impl ErrorReporter {
    pub fn new(policy: FailurePolicy) -> Self {
        Self { policy }
    }

    /// Log a per-order failure
    ///
    /// Under the abort policy the failure ends the run, so it is logged as an error.
    pub fn report_item(&self, err: &AssignmentError) {
        match self.policy {
            FailurePolicy::Continue => {
                tracing::warn!(order_id = err.order_id(), kind = err.kind(), "{}", err)
            }
            FailurePolicy::Abort => {
                tracing::error!(order_id = err.order_id(), kind = err.kind(), "{}", err)
            }
        }
    }

    /// Log a fatal error without writing a notice
    pub fn log_fatal(&self, err: &DispatchError) {
        tracing::error!(kind = err.kind(), "{}", err);
    }

    /// Log a fatal error and write the user-facing failure notice
    pub fn report_fatal<W: Write>(
        &self,
        err: &DispatchError,
        format: OutputFormat,
        out: &mut W,
    ) -> std::io::Result<()> {
        self.log_fatal(err);

        match format {
            OutputFormat::Text => writeln!(out, "{}", USER_FACING_MESSAGE),
            OutputFormat::Json => {
                let body = ErrorResponse {
                    error: err.kind().to_string(),
                    message: USER_FACING_MESSAGE.to_string(),
                };
                serde_json::to_writer(&mut *out, &body)?;
                writeln!(out)
            }
        }
    }
}
