//! CSV reader and writer.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};

use examtrend_core::error::{ReadFailure, WriteFailure};
use examtrend_core::model::{Cell, RecordSet, Table};
use examtrend_core::traits::{TableWriter, TabularReader};

use crate::error::SheetError;
use crate::tidy_rows;

/// Reads a headed CSV file. Fields are decoded lossily, so a stray
/// non-UTF-8 byte does not fail the whole file, and kept as text.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvReader;

impl CsvReader {
    fn load(path: &Path) -> Result<RecordSet, SheetError> {
        let file = File::open(path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let columns: Vec<String> = reader
            .byte_headers()?
            .iter()
            .map(|h| {
                String::from_utf8_lossy(h)
                    .trim_start_matches('\u{feff}')
                    .trim()
                    .to_string()
            })
            .collect();
        if columns.iter().all(|c| c.is_empty()) {
            return Err(SheetError::NoHeader);
        }

        let mut rows = Vec::new();
        for record in reader.byte_records() {
            let record = record?;
            rows.push(
                record
                    .iter()
                    .map(|field| Cell::raw(&String::from_utf8_lossy(field)))
                    .collect(),
            );
        }

        Ok(RecordSet {
            source: path.to_path_buf(),
            columns,
            rows: tidy_rows(rows),
        })
    }
}

impl TabularReader for CsvReader {
    fn read(&self, path: &Path) -> Result<RecordSet, ReadFailure> {
        tracing::debug!(path = %path.display(), "reading CSV");
        Self::load(path).map_err(|e| e.into_read_failure(path))
    }
}

/// Writes tables as UTF-8 CSV with a byte order mark, which spreadsheet
/// applications need to detect the encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvTableWriter;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

impl CsvTableWriter {
    fn classify(path: &Path, err: csv::Error) -> WriteFailure {
        match err.into_kind() {
            csv::ErrorKind::Io(io) => WriteFailure::from_io(path, &io),
            other => WriteFailure::Io {
                path: path.to_path_buf(),
                cause: format!("{other:?}"),
            },
        }
    }
}

impl TableWriter for CsvTableWriter {
    fn extension(&self) -> &str {
        "csv"
    }

    fn write(&self, path: &Path, table: &Table) -> Result<(), WriteFailure> {
        tracing::debug!(path = %path.display(), rows = table.rows.len(), "writing CSV");
        let mut file = File::create(path).map_err(|e| WriteFailure::from_io(path, &e))?;
        file.write_all(UTF8_BOM)
            .map_err(|e| WriteFailure::from_io(path, &e))?;
        let mut writer = WriterBuilder::new().flexible(true).from_writer(file);

        writer
            .write_record(&table.columns)
            .map_err(|e| Self::classify(path, e))?;
        for row in &table.rows {
            writer
                .write_record(row.iter().map(|c| c.to_string()))
                .map_err(|e| Self::classify(path, e))?;
        }
        writer
            .flush()
            .map_err(|e| WriteFailure::from_io(path, &e))?;
        Ok(())
    }
}
