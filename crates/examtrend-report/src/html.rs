//! HTML progress report.
//!
//! Produces a self-contained HTML file with all CSS/JS inlined.

use anyhow::{Context, Result};
use std::path::Path;

use examtrend_core::model::ExamId;
use examtrend_core::progress::{ProgressEntry, ProgressReport, ReportLayout};

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn format_rank(rank: f64) -> String {
    if rank.fract() == 0.0 {
        format!("{}", rank as i64)
    } else {
        rank.to_string()
    }
}

fn trend_class(coefficient: f64) -> &'static str {
    if coefficient > 0.0 {
        "up"
    } else if coefficient < 0.0 {
        "down"
    } else {
        "flat"
    }
}

/// Generate an HTML page from a progress report.
pub fn generate_html(report: &ProgressReport, layout: &ReportLayout) -> String {
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"zh\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>{}</title>\n",
        html_escape(&layout.coefficient_column)
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    // Header
    html.push_str("<header>\n");
    html.push_str(&format!("<h1>{}</h1>\n", html_escape(&layout.coefficient_column)));
    html.push_str(&format!(
        "<p class=\"meta\">{} students | {} exams | {} skipped | {}</p>\n",
        report.entries.len(),
        report.exams.len(),
        report.skipped.len(),
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some(mean) = report.mean_coefficient() {
        html.push_str(&format!("<p class=\"meta\">Mean coefficient: {mean:.4}</p>\n"));
    }
    html.push_str("</header>\n");

    // Coefficient chart
    if !report.entries.is_empty() {
        html.push_str("<section class=\"dashboard\">\n");
        html.push_str(&generate_bar_chart(&report.entries));
        html.push_str("</section>\n");
    }

    // Per-student table
    html.push_str("<section class=\"results\">\n");
    html.push_str("<table class=\"results-table\" id=\"results\">\n<thead><tr>");
    let mut col = 0;
    let mut header = |label: &str, html: &mut String| {
        html.push_str(&format!(
            "<th onclick=\"sortTable({col})\">{}</th>",
            html_escape(label)
        ));
        col += 1;
    };
    header(&layout.student_column, &mut html);
    for exam in &report.exams {
        header(&layout.rank_label(*exam), &mut html);
    }
    header(&layout.coefficient_column, &mut html);
    html.push_str("</tr></thead>\n<tbody>\n");

    for entry in &report.entries {
        html.push_str(&format!(
            "<tr class=\"{}\"><td>{}</td>",
            trend_class(entry.coefficient),
            html_escape(&entry.student)
        ));
        for exam in &report.exams {
            html.push_str(&format!("<td>{}</td>", rank_cell(entry, *exam)));
        }
        html.push_str(&format!("<td>{:.4}</td></tr>\n", entry.coefficient));
    }
    html.push_str("</tbody></table>\n");
    html.push_str("</section>\n");

    // Skipped students
    if !report.skipped.is_empty() {
        html.push_str("<section class=\"skipped\">\n<h2>Skipped</h2>\n<ul>\n");
        for s in &report.skipped {
            html.push_str(&format!("<li>{}</li>\n", html_escape(&s.detail)));
        }
        html.push_str("</ul>\n</section>\n");
    }

    // Raw JSON
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(
        &serde_json::to_string_pretty(report)
            .unwrap_or_default()
            .replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;"),
    );
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    // JavaScript for sorting
    html.push_str("<script>\n");
    html.push_str(JS);
    html.push_str("</script>\n");

    html.push_str("</body>\n</html>");
    html
}

fn rank_cell(entry: &ProgressEntry, exam: ExamId) -> String {
    entry.rank_in(exam).map(format_rank).unwrap_or_default()
}

/// Write an HTML report to a file.
pub fn write_html_report(report: &ProgressReport, layout: &ReportLayout, path: &Path) -> Result<()> {
    let html = generate_html(report, layout);
    tracing::debug!(path = %path.display(), bytes = html.len(), "writing HTML report");
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)
        .with_context(|| format!("failed to write HTML report to {}", path.display()))?;
    Ok(())
}

/// Diverging bars: improvement grows right of the axis, decline left.
fn generate_bar_chart(entries: &[ProgressEntry]) -> String {
    let bar_height = 24;
    let half_width = 200;
    let padding = 8;
    let label_width = 160;

    let scale = entries
        .iter()
        .map(|e| e.coefficient.abs())
        .fold(0.0_f64, f64::max)
        .max(f64::EPSILON);
    let axis = label_width + half_width;
    let total_height = entries.len() * (bar_height + padding) + padding;

    let mut svg = format!(
        "<svg width=\"{}\" height=\"{}\" xmlns=\"http://www.w3.org/2000/svg\">\n",
        axis + half_width + 80,
        total_height
    );
    svg.push_str(&format!(
        "  <line x1=\"{axis}\" y1=\"0\" x2=\"{axis}\" y2=\"{total_height}\" stroke=\"currentColor\" stroke-width=\"1\"/>\n"
    ));

    for (i, entry) in entries.iter().enumerate() {
        let y = i * (bar_height + padding) + padding;
        let width = (entry.coefficient.abs() / scale * half_width as f64) as usize;
        let (x, color) = if entry.coefficient >= 0.0 {
            (axis, "#22c55e")
        } else {
            (axis - width, "#ef4444")
        };

        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"14\" fill=\"currentColor\" text-anchor=\"end\" dominant-baseline=\"middle\">{}</text>\n",
            label_width - 10,
            y + bar_height / 2,
            html_escape(&entry.student)
        ));
        svg.push_str(&format!(
            "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\" rx=\"4\"/>\n",
            x, y, width, bar_height, color
        ));
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"12\" fill=\"currentColor\" dominant-baseline=\"middle\">{:+.3}</text>\n",
            axis + half_width + 8,
            y + bar_height / 2,
            entry.coefficient
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --up: #dcfce7; --down: #fde2e2; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --up: #064e3b; --down: #7f1d1d; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; }
th { background: var(--border); cursor: pointer; }
.up { background: var(--up); }
.down { background: var(--down); }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; }
"#;

const JS: &str = r#"
function sortTable(col) {
  const table = document.getElementById('results');
  const tbody = table.querySelector('tbody');
  const rows = Array.from(tbody.querySelectorAll('tr'));
  const asc = table.dataset.sortCol == col && table.dataset.sortDir == 'asc' ? false : true;
  rows.sort((a, b) => {
    const va = a.cells[col].textContent;
    const vb = b.cells[col].textContent;
    const na = parseFloat(va), nb = parseFloat(vb);
    const cmp = !isNaN(na) && !isNaN(nb) ? na - nb : va.localeCompare(vb);
    return asc ? cmp : -cmp;
  });
  table.dataset.sortCol = col;
  table.dataset.sortDir = asc ? 'asc' : 'desc';
  rows.forEach(r => tbody.appendChild(r));
}
"#;
