use serde::Deserialize;
use std::io::Write;

use crate::core::AssignmentReport;
use crate::models::RunSummary;
use crate::services::{DispatchError, DispatchRun, ErrorReporter};

/// How run results are written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One line per order
    #[default]
    Text,
    /// A single JSON document
    Json,
}

/// Write the outcome of every processed order
pub fn write_report<W: Write>(
    report: &AssignmentReport,
    total_orders: usize,
    format: OutputFormat,
    out: &mut W,
) -> std::io::Result<()> {
    match format {
        OutputFormat::Text => write_text(report, out),
        OutputFormat::Json => {
            let summary = RunSummary::from_report(report, total_orders, chrono::Utc::now());
            serde_json::to_writer_pretty(&mut *out, &summary)?;
            writeln!(out)
        }
    }
}

/// Write a finished run, followed by the failure notice if the run was aborted
///
/// JSON output stays a single document: an abort is carried by the summary's
/// `halted` flag and the notice goes to the log only.
pub fn finish_run<W: Write>(
    run: &DispatchRun,
    aborted: Option<&DispatchError>,
    reporter: &ErrorReporter,
    format: OutputFormat,
    out: &mut W,
) -> std::io::Result<()> {
    write_report(&run.report, run.total_orders, format, out)?;

    match (aborted, format) {
        (None, _) => Ok(()),
        (Some(err), OutputFormat::Text) => reporter.report_fatal(err, format, out),
        (Some(err), OutputFormat::Json) => {
            reporter.log_fatal(err);
            Ok(())
        }
    }
}

fn write_text<W: Write>(report: &AssignmentReport, out: &mut W) -> std::io::Result<()> {
    for outcome in &report.outcomes {
        match outcome {
            Ok(a) => writeln!(
                out,
                "Order {}: nearest courier {} ({:.2} km)",
                a.order_id, a.courier_id, a.distance_km
            )?,
            Err(err) => writeln!(
                out,
                "Order {}: no suitable courier found ({})",
                err.order_id(),
                err
            )?,
        }
    }
    if report.halted {
        writeln!(out, "Run halted after the first failed order")?;
    }
    Ok(())
}
