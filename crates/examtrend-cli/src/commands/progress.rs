//! The `examtrend progress` command.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use examtrend_core::engine::sanitize_file_name;
use examtrend_core::progress::{ProgressReport, ReportLayout};

use super::{finish, run_job, Session};

/// Extra exports on top of the spreadsheet the engine always writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Exports {
    json: bool,
    html: bool,
}

fn parse_format(format: &str) -> Result<Exports> {
    let exports = match format.trim().to_ascii_lowercase().as_str() {
        "csv" => Exports { json: false, html: false },
        "json" => Exports { json: true, html: false },
        "html" => Exports { json: false, html: true },
        "all" => Exports { json: true, html: true },
        other => bail!("unknown format '{other}' (expected csv, json, html, or all)"),
    };
    Ok(exports)
}

pub async fn execute(
    inputs: Vec<PathBuf>,
    output: Option<PathBuf>,
    format: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let exports = parse_format(&format)?;
    let session = Session::load(&inputs, config_path)?;
    let output_dir = session.output_dir(output);
    let layout = session.config.output.layout();
    let progress_file = session.config.output.progress_file.clone();

    eprintln!("Reading {} spreadsheet(s)", session.inputs.len());
    let engine = session.engine();
    let files = session.inputs.clone();
    let dir = output_dir.clone();
    let outcome = run_job("progress", session.poll_interval(), move |ctx| {
        engine.progress_report(&files, dir.as_deref(), &ctx)
    })
    .await?;

    let Some(run) = finish(outcome)? else {
        if output_dir.is_none() {
            eprintln!("No output directory chosen; pass --output or set [output] dir.");
        }
        return Ok(());
    };

    print_summary(&run.report, &layout);

    let (Some(dir), Some(path)) = (output_dir, run.path) else {
        return Ok(());
    };
    eprintln!("Report saved to: {}", path.display());

    let stem = sanitize_file_name(&progress_file);
    if exports.json {
        let json_path = export_path(&dir, &stem, "json");
        run.report.save_json(&json_path)?;
        eprintln!("JSON saved to: {}", json_path.display());
    }
    if exports.html {
        let html_path = export_path(&dir, &stem, "html");
        examtrend_report::write_html_report(&run.report, &layout, &html_path)?;
        eprintln!("HTML saved to: {}", html_path.display());
    }

    Ok(())
}

fn print_summary(report: &ProgressReport, layout: &ReportLayout) {
    use comfy_table::{Cell, Table};

    let (previous, current) = match report.exams.as_slice() {
        [.., p, c] => (layout.rank_label(*p), layout.rank_label(*c)),
        _ => ("Previous".to_string(), "Current".to_string()),
    };

    let mut table = Table::new();
    table.set_header(vec![
        layout.student_column.clone(),
        previous,
        current,
        layout.coefficient_column.clone(),
    ]);

    for entry in &report.entries {
        let rank = |exam| {
            entry
                .rank_in(exam)
                .map(|r| format!("{r}"))
                .unwrap_or_default()
        };
        table.add_row(vec![
            Cell::new(&entry.student),
            Cell::new(format!("{} ({})", rank(entry.previous_exam), entry.previous_exam)),
            Cell::new(format!("{} ({})", rank(entry.current_exam), entry.current_exam)),
            Cell::new(format!("{:+.4}", entry.coefficient)),
        ]);
    }

    eprintln!("\n{table}");
    if let Some(mean) = report.mean_coefficient() {
        eprintln!("Mean coefficient: {mean:+.4}");
    }
    if !report.skipped.is_empty() {
        eprintln!("{} student(s) not reported:", report.skipped.len());
        for skipped in &report.skipped {
            eprintln!("  {}", skipped.detail);
        }
    }
}

fn export_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    dir.join(format!("{stem}.{ext}"))
}
