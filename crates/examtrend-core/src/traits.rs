//! Collaborator traits.
//!
//! The engine only needs a tabular reader, a table writer, a chart renderer,
//! and a way to ask the operator a yes/no question. Implementations live in
//! `examtrend-sheets`, `examtrend-report`, and the CLI.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ReadFailure, WriteFailure};
use crate::model::{ExamId, RecordSet, Table};

// ---------------------------------------------------------------------------
// Tabular I/O
// ---------------------------------------------------------------------------

/// Loads one spreadsheet into memory.
pub trait TabularReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<RecordSet, ReadFailure>;
}

/// Persists a header + rows table.
pub trait TableWriter: Send + Sync {
    /// File extension the writer produces, without the dot.
    fn extension(&self) -> &str;

    fn write(&self, path: &Path, table: &Table) -> Result<(), WriteFailure>;
}

// ---------------------------------------------------------------------------
// Charts
// ---------------------------------------------------------------------------

/// Draws one student's rank trend.
pub trait ChartRenderer: Send + Sync {
    /// File extension of the configured encoding, without the dot.
    fn extension(&self) -> &str;

    fn render(&self, path: &Path, series: &TrendSeries) -> anyhow::Result<()>;
}

/// One point on a trend chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub exam: ExamId,
    pub rank: f64,
}

/// Everything needed to draw one student's chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSeries {
    pub student: String,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    /// Sorted by exam identifier, ascending.
    pub points: Vec<TrendPoint>,
}

// ---------------------------------------------------------------------------
// Operator confirmation
// ---------------------------------------------------------------------------

/// Asks the operator whether to continue past a skippable failure.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Always continues.
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _: &str) -> bool {
        true
    }
}

/// Never continues.
pub struct AssumeNo;

impl Confirm for AssumeNo {
    fn confirm(&self, _: &str) -> bool {
        false
    }
}
