//! The `examtrend charts` command.

use std::path::PathBuf;

use anyhow::Result;

use examtrend_core::config::ChartFormat;
use examtrend_core::engine::EmitSummary;

use super::{finish, run_job, Session, StdinConfirm};

pub async fn execute(
    inputs: Vec<PathBuf>,
    output: Option<PathBuf>,
    chart_format: Option<ChartFormat>,
    assume_yes: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let mut session = Session::load(&inputs, config_path)?;
    if let Some(format) = chart_format {
        session.config.chart.format = format;
    }
    let output_dir = session.require_output_dir(output)?;

    eprintln!(
        "Drawing {} charts from {} spreadsheet(s)",
        session.config.chart.format,
        session.inputs.len()
    );
    let engine = session.engine();
    let files = session.inputs.clone();
    let dir = output_dir.clone();
    let confirm = StdinConfirm { assume_yes };
    let outcome = run_job("charts", session.poll_interval(), move |ctx| {
        engine.trend_charts(&files, &dir, &ctx, &confirm)
    })
    .await?;

    if let Some(summary) = finish(outcome)? {
        report_emitted("chart", &summary);
    }
    Ok(())
}

/// Shared tail for the per-student emitters.
pub(crate) fn report_emitted(kind: &str, summary: &EmitSummary) {
    eprintln!("\n{} {kind}(s) written", summary.written.len());
    if !summary.skipped_sources.is_empty() {
        eprintln!("Skipped sources:");
        for path in &summary.skipped_sources {
            eprintln!("  {}", path.display());
        }
    }
    if !summary.failures.is_empty() {
        eprintln!("{} student(s) failed:", summary.failures.len());
        for failure in &summary.failures {
            eprintln!("  {}: {}", failure.student, failure.message);
        }
    }
}
