//! Spreadsheet error types.

use std::path::Path;

use thiserror::Error;

use examtrend_core::error::ReadFailure;

/// Errors that can occur while loading a spreadsheet.
#[derive(Debug, Error)]
pub enum SheetError {
    /// The file extension is not one we can read.
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// The workbook could not be opened or decoded.
    #[error("workbook error: {0}")]
    Workbook(String),

    /// The workbook has no worksheets.
    #[error("workbook has no worksheets")]
    NoWorksheet,

    /// The first row is missing or blank.
    #[error("no header row")]
    NoHeader,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SheetError {
    /// Attach the offending file.
    pub fn into_read_failure(self, path: &Path) -> ReadFailure {
        ReadFailure {
            path: path.to_path_buf(),
            cause: self.to_string(),
        }
    }
}
