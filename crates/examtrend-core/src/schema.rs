//! Schema gate: required columns, then row coercion into a `SourceBatch`.

use std::collections::HashSet;

use crate::error::SchemaFailure;
use crate::model::{Cell, ExamRecord, RecordSet, RequiredColumns, SourceBatch};

/// Required column names absent from `set`, in declaration order.
pub fn missing_columns(set: &RecordSet, required: &RequiredColumns) -> Vec<String> {
    required
        .names()
        .iter()
        .filter(|name| set.column_index(name).is_none())
        .map(|name| name.to_string())
        .collect()
}

/// Pass/fail check for the three mandatory fields.
pub fn validate(set: &RecordSet, required: &RequiredColumns) -> Result<(), SchemaFailure> {
    let missing = missing_columns(set, required);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(SchemaFailure {
            path: set.source.clone(),
            missing,
        })
    }
}

/// Validate `set` and coerce its rows.
///
/// Rows whose exam identifier, student name, or rank cannot be coerced are
/// counted in `dropped_rows` and left out.
pub fn into_batch(set: RecordSet, required: &RequiredColumns) -> Result<SourceBatch, SchemaFailure> {
    let (exam_col, student_col, rank_col) = match (
        set.column_index(&required.exam_id),
        set.column_index(&required.student),
        set.column_index(&required.rank),
    ) {
        (Some(e), Some(s), Some(r)) => (e, s, r),
        _ => {
            return Err(SchemaFailure {
                path: set.source.clone(),
                missing: missing_columns(&set, required),
            })
        }
    };

    let width = set.columns.len();
    let mut records = Vec::with_capacity(set.rows.len());
    let mut dropped_rows = 0usize;
    let empty = Cell::Empty;

    for mut row in set.rows {
        let exam = row.get(exam_col).unwrap_or(&empty).as_exam_id();
        let student = row.get(student_col).unwrap_or(&empty).as_name();
        let rank = row.get(rank_col).unwrap_or(&empty).as_number();

        match (exam, student, rank) {
            (Some(exam), Some(student), Some(rank)) => {
                row.resize(width.max(row.len()), Cell::Empty);
                records.push(ExamRecord {
                    exam,
                    student,
                    rank,
                    cells: row,
                });
            }
            _ => dropped_rows += 1,
        }
    }

    Ok(SourceBatch {
        source: set.source,
        columns: unique_columns(set.columns),
        records,
        dropped_rows,
    })
}

/// Rename repeated header names to `name.1`, `name.2`, ... so every column
/// survives merging. The first occurrence keeps its name, which is the one
/// the required-column lookup resolves to.
pub fn unique_columns(columns: Vec<String>) -> Vec<String> {
    let originals: HashSet<String> = columns.iter().cloned().collect();
    let mut taken: HashSet<String> = HashSet::with_capacity(columns.len());

    columns
        .into_iter()
        .map(|name| {
            if taken.insert(name.clone()) {
                return name;
            }
            let mut n = 1usize;
            loop {
                let candidate = format!("{name}.{n}");
                if !originals.contains(&candidate) && taken.insert(candidate.clone()) {
                    break candidate;
                }
                n += 1;
            }
        })
        .collect()
}
