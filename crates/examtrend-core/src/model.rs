//! Core data model types for examtrend.
//!
//! A `TabularReader` hands over a [`RecordSet`] of typed cells. The schema
//! gate turns it into a [`SourceBatch`] of [`ExamRecord`]s, which is what the
//! reconciler and the merged record set consume.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Ordinal identifying one exam sitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExamId(pub i64);

impl fmt::Display for ExamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ExamId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cell::from_text(s)
            .as_exam_id()
            .ok_or_else(|| format!("not an exam identifier: {s}"))
    }
}

/// One spreadsheet cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Cell {
    #[default]
    Empty,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl Cell {
    /// Infer a typed cell from raw text (CSV fields, workbook strings).
    pub fn from_text(raw: &str) -> Cell {
        let s = raw.trim();
        if s.is_empty() {
            return Cell::Empty;
        }
        if let Ok(i) = s.parse::<i64>() {
            return Cell::Int(i);
        }
        match s.parse::<f64>() {
            Ok(f) if f.is_finite() => Cell::Float(f),
            _ => Cell::Text(s.to_string()),
        }
    }

    /// A text cell exactly as the source stored it. Whitespace-only text is empty.
    ///
    /// Readers use this for string cells so identifiers like `007` keep their
    /// leading zeros; numeric coercion happens later, per column.
    pub fn raw(text: &str) -> Cell {
        if text.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(text.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Coerce to an exam identifier. Only integral values qualify.
    pub fn as_exam_id(&self) -> Option<ExamId> {
        match self {
            Cell::Int(i) => Some(ExamId(*i)),
            Cell::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(ExamId(*f as i64)),
            Cell::Text(s) => match Cell::from_text(s) {
                Cell::Text(_) => None,
                other => other.as_exam_id(),
            },
            _ => None,
        }
    }

    /// Coerce to a numeric value.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) if f.is_finite() => Some(*f),
            Cell::Text(s) => match Cell::from_text(s) {
                Cell::Text(_) => None,
                other => other.as_number(),
            },
            _ => None,
        }
    }

    /// Coerce to a student name. Text is taken verbatim; numeric cells use
    /// their display form.
    pub fn as_name(&self) -> Option<String> {
        match self {
            _ if self.is_empty() => None,
            Cell::Text(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Int(i) => write!(f, "{i}"),
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Text(s) => f.write_str(s),
            Cell::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

/// A loaded spreadsheet: header row plus data rows, exactly as read.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet {
    /// File the rows came from.
    pub source: PathBuf,
    /// Header names, trimmed.
    pub columns: Vec<String>,
    /// Data rows. A row may be shorter than the header.
    pub rows: Vec<Vec<Cell>>,
}

impl RecordSet {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// The three mandatory column names. Exact match, no fuzzy lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredColumns {
    #[serde(default = "default_exam_id_column")]
    pub exam_id: String,
    #[serde(default = "default_student_column")]
    pub student: String,
    #[serde(default = "default_rank_column")]
    pub rank: String,
}

fn default_exam_id_column() -> String {
    "考试编号".to_string()
}
fn default_student_column() -> String {
    "姓名".to_string()
}
fn default_rank_column() -> String {
    "级名".to_string()
}

impl Default for RequiredColumns {
    fn default() -> Self {
        Self {
            exam_id: default_exam_id_column(),
            student: default_student_column(),
            rank: default_rank_column(),
        }
    }
}

impl RequiredColumns {
    pub fn names(&self) -> [&str; 3] {
        [&self.exam_id, &self.student, &self.rank]
    }
}

/// One accepted row. Rank is lower-is-better.
#[derive(Debug, Clone, PartialEq)]
pub struct ExamRecord {
    pub exam: ExamId,
    pub student: String,
    pub rank: f64,
    /// The full original row, aligned to the batch's columns.
    pub cells: Vec<Cell>,
}

/// The validated contents of one input file.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceBatch {
    pub source: PathBuf,
    pub columns: Vec<String>,
    pub records: Vec<ExamRecord>,
    /// Rows dropped because a required field could not be coerced.
    pub dropped_rows: usize,
}

impl SourceBatch {
    /// The exam number this file represents.
    pub fn max_exam(&self) -> Option<ExamId> {
        self.records.iter().map(|r| r.exam).max()
    }

    /// Every distinct exam identifier present in the file.
    pub fn exam_ids(&self) -> BTreeSet<ExamId> {
        self.records.iter().map(|r| r.exam).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A header + rows table handed to a `TableWriter`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// Render a list of identifiers as `1, 2, 3`.
pub fn join_ids(ids: &[ExamId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
