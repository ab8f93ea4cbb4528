//! examtrend-report — chart rendering and HTML output.
//!
//! - **Charts**: per-student rank trend lines (SVG or PNG) via plotters
//! - **Fonts**: the face used for chart text, configured or bundled
//! - **HTML**: a self-contained page for the progress coefficient report

pub mod chart;
pub mod font;
pub mod html;

pub use chart::PlottersRenderer;
pub use html::{generate_html, write_html_report};
