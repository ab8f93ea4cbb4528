//! Exam reconciler and merged record set.
//!
//! Two views are built from the accepted sources:
//!
//! - [`StudentRankHistory`]: student → exam → rank, keyed on each file's
//!   maximum exam identifier. The progress calculator reads this.
//! - [`MergedTable`]: every accepted row with every original column. The
//!   chart and transcript emitters read this.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::error::IntegrityError;
use crate::model::{Cell, ExamId, SourceBatch, Table};
use crate::traits::TrendPoint;

/// Per-student, per-exam rank table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentRankHistory {
    ranks: BTreeMap<String, BTreeMap<ExamId, f64>>,
}

impl StudentRankHistory {
    /// Fold one batch in. The batch's maximum identifier is the exam every
    /// one of its rows is filed under.
    ///
    /// Setting the same (student, exam) pair twice is rejected.
    pub fn fold(mut self, batch: &SourceBatch) -> Result<Self, IntegrityError> {
        let Some(exam) = batch.max_exam() else {
            return Ok(self);
        };
        for record in &batch.records {
            let sittings = self.ranks.entry(record.student.clone()).or_default();
            if sittings.insert(exam, record.rank).is_some() {
                return Err(IntegrityError::ConflictingEntry {
                    student: record.student.clone(),
                    exam,
                });
            }
        }
        Ok(self)
    }

    /// Fold every batch, in order, starting from an empty history.
    pub fn reconcile(batches: &[SourceBatch]) -> Result<Self, IntegrityError> {
        batches
            .iter()
            .try_fold(Self::default(), |history, batch| history.fold(batch))
    }

    /// Student names, ascending.
    pub fn students(&self) -> impl Iterator<Item = &str> {
        self.ranks.keys().map(String::as_str)
    }

    /// `(exam, rank)` pairs for one student, ascending by exam.
    pub fn sittings(&self, student: &str) -> Vec<(ExamId, f64)> {
        self.ranks
            .get(student)
            .map(|m| m.iter().map(|(e, r)| (*e, *r)).collect())
            .unwrap_or_default()
    }

    pub fn rank(&self, student: &str, exam: ExamId) -> Option<f64> {
        self.ranks.get(student)?.get(&exam).copied()
    }

    /// Every exam identifier any student sat.
    pub fn exam_ids(&self) -> BTreeSet<ExamId> {
        self.ranks.values().flat_map(|m| m.keys().copied()).collect()
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

/// One row of the merged record set.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    pub exam: ExamId,
    pub student: String,
    pub rank: f64,
    /// Aligned to [`MergedTable::columns`]; empty where the source lacked a column.
    pub cells: Vec<Cell>,
}

/// All accepted rows across sources, under the union of their columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedTable {
    columns: Vec<String>,
    rows: Vec<MergedRow>,
}

impl MergedTable {
    /// Concatenate batches. Columns keep first-seen order.
    pub fn merge(batches: &[SourceBatch]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for batch in batches {
            for name in &batch.columns {
                if !columns.contains(name) {
                    columns.push(name.clone());
                }
            }
        }

        let mut rows = Vec::new();
        for batch in batches {
            let positions: Vec<Option<usize>> = columns
                .iter()
                .map(|name| batch.columns.iter().position(|c| c == name))
                .collect();
            for record in &batch.records {
                let cells = positions
                    .iter()
                    .map(|pos| {
                        pos.and_then(|i| record.cells.get(i))
                            .cloned()
                            .unwrap_or_default()
                    })
                    .collect();
                rows.push(MergedRow {
                    exam: record.exam,
                    student: record.student.clone(),
                    rank: record.rank,
                    cells,
                });
            }
        }

        Self { columns, rows }
    }

    /// Stable sort by exam identifier; ties keep source order.
    pub fn sorted_by_exam(mut self) -> Self {
        self.rows.sort_by_key(|r| r.exam);
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[MergedRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct student names in order of first appearance.
    pub fn students(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .map(|r| r.student.as_str())
            .filter(|s| seen.insert(*s))
            .collect()
    }

    fn rows_for<'a>(&'a self, student: &'a str) -> impl Iterator<Item = &'a MergedRow> + 'a {
        self.rows.iter().filter(move |r| r.student == student)
    }

    /// One student's points, in row order.
    pub fn trend(&self, student: &str) -> Vec<TrendPoint> {
        self.rows_for(student)
            .map(|r| TrendPoint {
                exam: r.exam,
                rank: r.rank,
            })
            .collect()
    }

    /// One student's rows with every merged column.
    pub fn transcript(&self, student: &str) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows_for(student).map(|r| r.cells.clone()).collect(),
        }
    }
}
