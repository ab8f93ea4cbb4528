//! The `examtrend validate` command.

use std::path::PathBuf;

use anyhow::{bail, Result};

use examtrend_core::intake::IntakeSummary;

use super::{finish, run_job, Session};

pub async fn execute(inputs: Vec<PathBuf>, json: bool, config_path: Option<PathBuf>) -> Result<()> {
    let session = Session::load(&inputs, config_path)?;
    let engine = session.engine();
    let files = session.inputs.clone();
    let outcome = run_job("validate", session.poll_interval(), move |ctx| {
        engine.inspect(&files, &ctx)
    })
    .await?;

    let Some(summary) = finish(outcome)? else {
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    if !summary.skipped.is_empty() {
        bail!("{} source(s) could not be used", summary.skipped.len());
    }
    Ok(())
}

fn print_summary(summary: &IntakeSummary) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["Source", "Exam", "Rows", "Dropped"]);
    for source in &summary.sources {
        table.add_row(vec![
            Cell::new(source.path.display()),
            Cell::new(
                source
                    .exam
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(source.rows),
            Cell::new(source.dropped_rows),
        ]);
    }
    println!("{table}");

    for path in &summary.skipped {
        println!("  SKIPPED: {}", path.display());
    }

    if summary.skipped.is_empty() {
        println!(
            "All sources valid: {} exam(s), {} student(s).",
            summary.exams.len(),
            summary.students
        );
    }
}
