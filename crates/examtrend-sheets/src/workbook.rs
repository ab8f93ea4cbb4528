//! Workbook reader backed by calamine.

use std::path::Path;

use calamine::{open_workbook_auto, Data, ExcelDateTime, Reader};
use chrono::NaiveTime;

use examtrend_core::error::ReadFailure;
use examtrend_core::model::{Cell, RecordSet};
use examtrend_core::traits::TabularReader;

use crate::error::SheetError;
use crate::tidy_rows;

/// Reads the first worksheet of a workbook. The first row is the header.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkbookReader;

/// Map a calamine cell onto the core cell type. String cells stay text;
/// date-formatted numbers become ISO dates.
pub fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::Int(i) => Cell::Int(*i),
        Data::Float(f) => Cell::Float(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::raw(s),
        Data::DateTime(dt) => datetime_cell(dt),
        other => Cell::Text(other.to_string()),
    }
}

fn datetime_cell(dt: &ExcelDateTime) -> Cell {
    if dt.is_duration() {
        if let Some(d) = dt.as_duration() {
            let secs = d.num_seconds();
            let sign = if secs < 0 { "-" } else { "" };
            let secs = secs.unsigned_abs();
            return Cell::Text(format!(
                "{sign}{}:{:02}:{:02}",
                secs / 3600,
                secs / 60 % 60,
                secs % 60
            ));
        }
    } else if let Some(ts) = dt.as_datetime() {
        let pattern = if ts.time() == NaiveTime::MIN {
            "%Y-%m-%d"
        } else {
            "%Y-%m-%d %H:%M:%S"
        };
        return Cell::Text(ts.format(pattern).to_string());
    }
    Cell::Float(dt.as_f64())
}

impl WorkbookReader {
    fn load(path: &Path) -> Result<RecordSet, SheetError> {
        let mut workbook =
            open_workbook_auto(path).map_err(|e| SheetError::Workbook(e.to_string()))?;

        let first = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or(SheetError::NoWorksheet)?;
        let range = workbook
            .worksheet_range(&first)
            .map_err(|e| SheetError::Workbook(e.to_string()))?;

        let mut rows = range.rows();
        let header = rows.next().ok_or(SheetError::NoHeader)?;
        let columns: Vec<String> = header
            .iter()
            .map(|cell| cell.to_string().trim().to_string())
            .collect();
        if columns.iter().all(|c| c.is_empty()) {
            return Err(SheetError::NoHeader);
        }

        let rows = rows
            .map(|row| row.iter().map(cell_from_data).collect())
            .collect();

        Ok(RecordSet {
            source: path.to_path_buf(),
            columns,
            rows: tidy_rows(rows),
        })
    }
}

impl TabularReader for WorkbookReader {
    fn read(&self, path: &Path) -> Result<RecordSet, ReadFailure> {
        tracing::debug!(path = %path.display(), "reading workbook");
        Self::load(path).map_err(|e| e.into_read_failure(path))
    }
}
