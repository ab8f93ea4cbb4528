//! Configuration file loading.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::RequiredColumns;
use crate::progress::ReportLayout;

/// Chart encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartFormat {
    /// Vector document.
    #[default]
    Svg,
    /// Raster image.
    Png,
}

impl ChartFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ChartFormat::Svg => "svg",
            ChartFormat::Png => "png",
        }
    }
}

impl fmt::Display for ChartFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ChartFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "svg" => Ok(ChartFormat::Svg),
            "png" => Ok(ChartFormat::Png),
            other => Err(format!("unknown chart format '{other}' (expected svg or png)")),
        }
    }
}

/// Top-level examtrend configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExamtrendConfig {
    /// Required input column names.
    #[serde(default)]
    pub columns: RequiredColumns,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub chart: ChartConfig,
    #[serde(default)]
    pub job: JobConfig,
}

/// Output naming and layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Where to write results. `None` means the caller must choose.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default = "default_progress_file")]
    pub progress_file: String,
    #[serde(default = "default_transcript_suffix")]
    pub transcript_suffix: String,
    #[serde(default = "default_chart_suffix")]
    pub chart_suffix: String,
    #[serde(default = "default_student_column")]
    pub student_column: String,
    #[serde(default = "default_rank_column_template")]
    pub rank_column_template: String,
    #[serde(default = "default_coefficient_column")]
    pub coefficient_column: String,
}

fn default_progress_file() -> String {
    "进退步系数".to_string()
}
fn default_transcript_suffix() -> String {
    "_成绩单".to_string()
}
fn default_chart_suffix() -> String {
    "_年级排名折线图".to_string()
}
fn default_student_column() -> String {
    ReportLayout::default().student_column
}
fn default_rank_column_template() -> String {
    ReportLayout::default().rank_column_template
}
fn default_coefficient_column() -> String {
    ReportLayout::default().coefficient_column
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: None,
            progress_file: default_progress_file(),
            transcript_suffix: default_transcript_suffix(),
            chart_suffix: default_chart_suffix(),
            student_column: default_student_column(),
            rank_column_template: default_rank_column_template(),
            coefficient_column: default_coefficient_column(),
        }
    }
}

impl OutputConfig {
    pub fn layout(&self) -> ReportLayout {
        ReportLayout {
            student_column: self.student_column.clone(),
            rank_column_template: self.rank_column_template.clone(),
            coefficient_column: self.coefficient_column.clone(),
        }
    }
}

/// Chart encoding and size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartConfig {
    #[serde(default)]
    pub format: ChartFormat,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Appended to the student's name to form the chart title.
    #[serde(default = "default_title_suffix")]
    pub title_suffix: String,
    #[serde(default = "default_y_label")]
    pub y_label: String,
    /// Font file for chart text (TTF, OTF, or TTC). Unset: look for a CJK
    /// system font, then fall back to the bundled Latin font.
    #[serde(default)]
    pub font: Option<PathBuf>,
}

fn default_width() -> u32 {
    1024
}
fn default_height() -> u32 {
    768
}
fn default_title_suffix() -> String {
    " 年级排名折线图".to_string()
}
fn default_y_label() -> String {
    "年级排名".to_string()
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            format: ChartFormat::default(),
            width: default_width(),
            height: default_height(),
            title_suffix: default_title_suffix(),
            y_label: default_y_label(),
            font: None,
        }
    }
}

/// Background job settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    /// How often the surface drains the diagnostics channel.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval() -> u64 {
    100
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
        }
    }
}

/// Commented sample written by `examtrend init`.
pub const SAMPLE_CONFIG: &str = r#"# examtrend configuration

[columns]
# Exact header names in the input spreadsheets.
exam_id = "考试编号"
student = "姓名"
rank = "级名"

[output]
# dir = "./examtrend-output"
progress_file = "进退步系数"
transcript_suffix = "_成绩单"
chart_suffix = "_年级排名折线图"
student_column = "学生姓名"
rank_column_template = "第{exam}次考试排名"
coefficient_column = "进退步系数"

[chart]
format = "svg"   # svg | png
width = 1024
height = 768
# font = "C:/Windows/Fonts/msyh.ttc"   # CJK-capable font for chart text

[job]
poll_interval_ms = 100
"#;

/// Resolve environment variable references like `${VAR_NAME}` in a string.
pub fn resolve_env_vars(s: &str) -> String {
    expand_vars(s, |name| std::env::var(name).ok())
}

/// Expand `${NAME}` references with `lookup`; unknown names expand to "".
///
/// Substituted values are copied verbatim and never rescanned, so a value
/// that itself contains `${...}` cannot recurse.
fn expand_vars<F>(s: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        let name = &rest[start + 2..start + len];
        result.push_str(&lookup(name).unwrap_or_default());
        rest = &rest[start + len + 1..];
    }
    result.push_str(rest);
    result
}

impl ExamtrendConfig {
    fn resolve_env_refs(mut self) -> Self {
        let strings = [
            &mut self.columns.exam_id,
            &mut self.columns.student,
            &mut self.columns.rank,
            &mut self.output.progress_file,
            &mut self.output.transcript_suffix,
            &mut self.output.chart_suffix,
            &mut self.output.student_column,
            &mut self.output.rank_column_template,
            &mut self.output.coefficient_column,
            &mut self.chart.title_suffix,
            &mut self.chart.y_label,
        ];
        for s in strings {
            *s = resolve_env_vars(s);
        }
        if let Some(dir) = &self.output.dir {
            self.output.dir = Some(PathBuf::from(resolve_env_vars(&dir.to_string_lossy())));
        }
        if let Some(font) = &self.chart.font {
            self.chart.font = Some(PathBuf::from(resolve_env_vars(&font.to_string_lossy())));
        }
        self
    }

    /// Apply `EXAMTREND_OUTPUT_DIR` and `EXAMTREND_CHART_FORMAT`.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("EXAMTREND_OUTPUT_DIR").filter(|d| !d.is_empty()) {
            self.output.dir = Some(PathBuf::from(dir));
        }
        if let Some(format) = lookup("EXAMTREND_CHART_FORMAT") {
            self.chart.format = format
                .parse()
                .map_err(anyhow::Error::msg)
                .context("invalid EXAMTREND_CHART_FORMAT")?;
        }
        Ok(self)
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `examtrend.toml` in the current directory
/// 2. `~/.config/examtrend/config.toml`
///
/// Environment variable overrides: `EXAMTREND_OUTPUT_DIR`, `EXAMTREND_CHART_FORMAT`.
pub fn load_config() -> Result<ExamtrendConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ExamtrendConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("examtrend.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|home| home.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let config = match config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ExamtrendConfig::default(),
    };

    config.apply_overrides(|key| std::env::var(key).ok())
}

/// Parse a TOML document and expand `${VAR}` references.
pub fn parse_config(content: &str) -> Result<ExamtrendConfig> {
    let config: ExamtrendConfig = toml::from_str(content)?;
    Ok(config.resolve_env_refs())
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("examtrend"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_EXAMTREND_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_EXAMTREND_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_EXAMTREND_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("no refs"), "no refs");
        std::env::remove_var("_EXAMTREND_TEST_VAR");
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let lookup = |name: &str| match name {
            "LOOP" => Some("${LOOP}".to_string()),
            "DIR" => Some("out".to_string()),
            _ => None,
        };
        assert_eq!(expand_vars("a${LOOP}b", lookup), "a${LOOP}b");
        assert_eq!(expand_vars("${DIR}/${MISSING}/${DIR}", lookup), "out//out");
        assert_eq!(expand_vars("open ${DIR", lookup), "open ${DIR");
    }

    #[test]
    fn default_config() {
        let config = ExamtrendConfig::default();
        assert_eq!(config.columns.rank, "级名");
        assert_eq!(config.output.dir, None);
        assert_eq!(config.chart.format, ChartFormat::Svg);
        assert_eq!(config.job.poll_interval_ms, 100);
        assert_eq!(config.output.layout(), ReportLayout::default());
    }

    #[test]
    fn sample_config_parses_to_defaults() {
        let config = parse_config(SAMPLE_CONFIG).unwrap();
        assert_eq!(config, ExamtrendConfig::default());
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let config = parse_config(
            r#"
[columns]
rank = "年级排名"

[chart]
format = "png"
"#,
        )
        .unwrap();
        assert_eq!(config.columns.rank, "年级排名");
        assert_eq!(config.columns.student, "姓名");
        assert_eq!(config.chart.format, ChartFormat::Png);
        assert_eq!(config.chart.width, 1024);
        assert_eq!(config.chart.font, None);
    }

    #[test]
    fn chart_font_is_read() {
        let config = parse_config("[chart]\nfont = \"fonts/msyh.ttc\"").unwrap();
        assert_eq!(config.chart.font, Some(PathBuf::from("fonts/msyh.ttc")));
    }

    #[test]
    fn unknown_chart_format_is_rejected() {
        assert!(parse_config("[chart]\nformat = \"pdf\"").is_err());
        assert!("PDF".parse::<ChartFormat>().is_err());
        assert_eq!("PNG".parse::<ChartFormat>(), Ok(ChartFormat::Png));
    }

    #[test]
    fn overrides_take_precedence() {
        let config = ExamtrendConfig::default()
            .apply_overrides(|key| match key {
                "EXAMTREND_OUTPUT_DIR" => Some("/tmp/out".into()),
                "EXAMTREND_CHART_FORMAT" => Some("png".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.output.dir, Some(PathBuf::from("/tmp/out")));
        assert_eq!(config.chart.format, ChartFormat::Png);

        let err = ExamtrendConfig::default()
            .apply_overrides(|key| (key == "EXAMTREND_CHART_FORMAT").then(|| "gif".into()))
            .unwrap_err();
        assert!(format!("{err:#}").contains("gif"));
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let err = load_config_from(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn rank_label_uses_template() {
        let layout = ExamtrendConfig::default().output.layout();
        assert_eq!(layout.rank_label(crate::model::ExamId(3)), "第3次考试排名");
    }
}
