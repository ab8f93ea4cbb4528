//! examtrend-sheets — spreadsheet I/O.
//!
//! Implements `TabularReader` for workbooks (`.xlsx`, `.xlsm`, `.xlsb`,
//! `.xls`, `.ods`) and CSV, and `TableWriter` for CSV output.

pub mod csv_table;
pub mod discover;
pub mod error;
pub mod workbook;

use std::path::Path;

use examtrend_core::error::ReadFailure;
use examtrend_core::model::{Cell, RecordSet};
use examtrend_core::traits::TabularReader;

pub use csv_table::{CsvReader, CsvTableWriter};
pub use discover::{collect_inputs, is_supported};
pub use error::SheetError;
pub use workbook::WorkbookReader;

/// Workbook extensions handed to calamine.
pub const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Picks a reader by file extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct SheetReader;

impl TabularReader for SheetReader {
    fn read(&self, path: &Path) -> Result<RecordSet, ReadFailure> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "csv" => CsvReader.read(path),
            e if WORKBOOK_EXTENSIONS.contains(&e) => WorkbookReader.read(path),
            _ => Err(SheetError::UnsupportedFormat(ext).into_read_failure(path)),
        }
    }
}

/// Drop blank rows and trailing empty cells.
pub(crate) fn tidy_rows(rows: Vec<Vec<Cell>>) -> Vec<Vec<Cell>> {
    rows.into_iter()
        .filter(|row| !row.iter().all(|c| c.is_empty()))
        .map(|mut row| {
            while row.last().is_some_and(|c| c.is_empty()) {
                row.pop();
            }
            row
        })
        .collect()
}
