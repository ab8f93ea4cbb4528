//! Rank trend charts drawn with plotters.
//!
//! The rank axis is inverted by plotting `-rank` and printing the labels
//! negated back, so rank 1 sits at the top. SVG and PNG share one drawing
//! routine; text goes through the face installed by [`crate::font`].

use std::ops::Range;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use plotters::coord::Shift;
use plotters::prelude::*;

use examtrend_core::config::{ChartConfig, ChartFormat};
use examtrend_core::traits::{ChartRenderer, TrendPoint, TrendSeries};

use crate::font;

/// Renders [`TrendSeries`] as SVG or PNG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlottersRenderer {
    format: ChartFormat,
    width: u32,
    height: u32,
    font: Option<PathBuf>,
}

impl PlottersRenderer {
    pub fn new(format: ChartFormat, width: u32, height: u32) -> Self {
        Self {
            format,
            width: width.max(64),
            height: height.max(64),
            font: None,
        }
    }

    /// Prefer this font file for chart text.
    pub fn with_font(mut self, font: Option<PathBuf>) -> Self {
        self.font = font;
        self
    }

    pub fn from_config(config: &ChartConfig) -> Self {
        Self::new(config.format, config.width, config.height).with_font(config.font.clone())
    }

    pub fn format(&self) -> ChartFormat {
        self.format
    }
}

impl ChartRenderer for PlottersRenderer {
    fn extension(&self) -> &str {
        self.format.extension()
    }

    fn render(&self, path: &Path, series: &TrendSeries) -> Result<()> {
        if series.points.is_empty() {
            anyhow::bail!("no data points for {}", series.student);
        }
        font::install(self.font.as_deref());
        tracing::debug!(path = %path.display(), format = %self.format, "rendering chart");
        let size = (self.width, self.height);
        let drawn = match self.format {
            ChartFormat::Svg => draw_trend(SVGBackend::new(path, size).into_drawing_area(), series),
            ChartFormat::Png => draw_trend(BitMapBackend::new(path, size).into_drawing_area(), series),
        };
        drawn.with_context(|| format!("failed to render {}", path.display()))
    }
}

/// X spans the exams with one step of padding either side; Y spans the
/// negated ranks with a tenth of the spread (at least one place) of padding.
pub fn axis_ranges(points: &[TrendPoint]) -> (Range<i64>, Range<f64>) {
    let (mut x_min, mut x_max) = (i64::MAX, i64::MIN);
    let (mut r_min, mut r_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for p in points {
        x_min = x_min.min(p.exam.0);
        x_max = x_max.max(p.exam.0);
        r_min = r_min.min(p.rank);
        r_max = r_max.max(p.rank);
    }
    if points.is_empty() {
        return (0..2, -2.0..0.0);
    }
    let pad = ((r_max - r_min) * 0.1).max(1.0);
    (
        x_min.saturating_sub(1)..x_max.saturating_add(1),
        (-r_max - pad)..(-r_min + pad),
    )
}

/// One x label per exam, capped at 21.
fn x_label_count(x_range: &Range<i64>) -> usize {
    let span = usize::try_from(x_range.end.abs_diff(x_range.start)).unwrap_or(usize::MAX);
    span.clamp(1, 20) + 1
}

fn rank_label(y: &f64) -> String {
    let rank = -*y;
    if rank.fract() == 0.0 {
        format!("{}", rank as i64)
    } else {
        format!("{rank:.1}")
    }
}

fn draw_trend<DB>(root: DrawingArea<DB, Shift>, series: &TrendSeries) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let (x_range, y_range) = axis_ranges(&series.points);

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption(&series.title, (font::FAMILY, 28))
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range.clone(), y_range)?;

    chart
        .configure_mesh()
        .x_desc(series.x_label.as_str())
        .y_desc(series.y_label.as_str())
        .x_labels(x_label_count(&x_range))
        .y_label_formatter(&rank_label)
        .label_style((font::FAMILY, 14))
        .draw()?;

    let points: Vec<(i64, f64)> = series
        .points
        .iter()
        .map(|p| (p.exam.0, -p.rank))
        .collect();

    chart
        .draw_series(LineSeries::new(points.clone(), BLUE.stroke_width(2)))?
        .label(series.student.as_str())
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE.stroke_width(2)));
    chart.draw_series(points.into_iter().map(|p| Circle::new(p, 4, BLUE.filled())))?;

    chart
        .configure_series_labels()
        .label_font((font::FAMILY, 14))
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use examtrend_core::model::ExamId;

    fn series(points: &[(i64, f64)]) -> TrendSeries {
        TrendSeries {
            student: "甲".into(),
            title: "甲 年级排名折线图".into(),
            x_label: "考试编号".into(),
            y_label: "年级排名".into(),
            points: points
                .iter()
                .map(|&(exam, rank)| TrendPoint {
                    exam: ExamId(exam),
                    rank,
                })
                .collect(),
        }
    }

    #[test]
    fn ranges_invert_rank_and_pad() {
        let (x, y) = axis_ranges(&series(&[(1, 10.0), (2, 8.0)]).points);
        assert_eq!(x, 0..3);
        assert_eq!(y, -11.0..-7.0);

        let (_, y) = axis_ranges(&series(&[(1, 100.0), (4, 300.0)]).points);
        assert_eq!(y, -320.0..-80.0);
    }

    #[test]
    fn best_rank_is_highest_on_axis() {
        let (_, y) = axis_ranges(&series(&[(1, 1.0), (2, 50.0)]).points);
        // rank 1 is plotted at -1, near the top of the range
        assert!(y.end > -1.0 && y.start < -50.0);
        assert_eq!(rank_label(&-1.0), "1");
        assert_eq!(rank_label(&-12.5), "12.5");
    }

    #[test]
    fn svg_chart_has_title_and_legend() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("甲_年级排名折线图.svg");
        let renderer = PlottersRenderer::new(ChartFormat::Svg, 640, 480);
        renderer
            .render(&path, &series(&[(1, 10.0), (2, 8.0)]))
            .unwrap();

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("甲 年级排名折线图"));
        assert!(svg.contains("考试编号"));
    }

    #[test]
    fn png_chart_is_a_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.png");
        let renderer = PlottersRenderer::new(ChartFormat::Png, 320, 240);
        assert_eq!(renderer.extension(), "png");
        renderer.render(&path, &series(&[(3, 5.0)])).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn png_chart_draws_caption_and_axis_labels() {
        let (w, h) = (400usize, 300usize);
        let mut buf = vec![255u8; w * h * 3];
        font::install(None);
        let mut s = series(&[(1, 10.0), (2, 8.0), (3, 12.0)]);
        s.title = "Rank Trend".into();
        s.y_label = "Rank".into();
        draw_trend(
            BitMapBackend::with_buffer(&mut buf, (w as u32, h as u32)).into_drawing_area(),
            &s,
        )
        .unwrap();

        let dark = |x: usize, y: usize| buf[(y * w + x) * 3..][..3].iter().any(|&c| c < 100);
        // caption sits between the top margin and the plotting area
        assert!((20..50).any(|y| (0..w).any(|x| dark(x, y))), "no caption pixels");
        // rank labels and the y description sit left of the axis line
        assert!((60..h - 60).any(|y| (0..70).any(|x| dark(x, y))), "no y-axis labels");
    }

    #[test]
    fn extreme_exam_ids_do_not_overflow() {
        let (x, _) = axis_ranges(&series(&[(i64::MIN, 1.0), (i64::MAX, 2.0)]).points);
        assert_eq!(x, i64::MIN..i64::MAX);
        assert_eq!(x_label_count(&x), 21);
        assert_eq!(x_label_count(&(0..3)), 4);
        assert_eq!(x_label_count(&(5..5)), 2);
    }

    #[test]
    fn renderer_takes_font_from_config() {
        let config = ChartConfig {
            font: Some(PathBuf::from("fonts/msyh.ttc")),
            ..ChartConfig::default()
        };
        let renderer = PlottersRenderer::from_config(&config);
        assert_eq!(renderer.font.as_deref(), Some(Path::new("fonts/msyh.ttc")));
        assert_eq!(renderer.format(), config.format);
    }

    #[test]
    fn empty_series_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = PlottersRenderer::new(ChartFormat::Svg, 320, 240);
        let err = renderer
            .render(&dir.path().join("x.svg"), &series(&[]))
            .unwrap_err();
        assert!(err.to_string().contains("no data points"));
    }
}
