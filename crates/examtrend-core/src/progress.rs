//! Progress coefficient calculator and the report it produces.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProgressError;
use crate::job::JobContext;
use crate::model::{Cell, ExamId, Table};
use crate::reconcile::StudentRankHistory;

/// `(previous - current) / previous`. Positive means the rank number went
/// down, i.e. the student improved. `None` when `previous` is zero.
pub fn coefficient(previous: f64, current: f64) -> Option<f64> {
    if previous == 0.0 {
        None
    } else {
        Some((previous - current) / previous)
    }
}

/// A student's rank in one exam.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExamRank {
    pub exam: ExamId,
    pub rank: f64,
}

/// One row of the progress report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub student: String,
    /// Every exam the student sat, ascending.
    pub ranks: Vec<ExamRank>,
    pub previous_exam: ExamId,
    pub current_exam: ExamId,
    pub coefficient: f64,
}

impl ProgressEntry {
    pub fn rank_in(&self, exam: ExamId) -> Option<f64> {
        self.ranks.iter().find(|r| r.exam == exam).map(|r| r.rank)
    }
}

/// Why a student is absent from the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    InsufficientHistory,
    ZeroPreviousRank,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedStudent {
    pub student: String,
    pub reason: SkipReason,
    pub detail: String,
}

impl From<&ProgressError> for SkippedStudent {
    fn from(err: &ProgressError) -> Self {
        let (student, reason) = match err {
            ProgressError::InsufficientHistory { student, .. } => {
                (student.clone(), SkipReason::InsufficientHistory)
            }
            ProgressError::ZeroPreviousRank { student, .. } => {
                (student.clone(), SkipReason::ZeroPreviousRank)
            }
        };
        Self {
            student,
            reason,
            detail: err.to_string(),
        }
    }
}

/// Column labels of the exported progress table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLayout {
    pub student_column: String,
    /// `{exam}` is replaced by the exam identifier.
    pub rank_column_template: String,
    pub coefficient_column: String,
}

impl Default for ReportLayout {
    fn default() -> Self {
        Self {
            student_column: "学生姓名".to_string(),
            rank_column_template: "第{exam}次考试排名".to_string(),
            coefficient_column: "进退步系数".to_string(),
        }
    }
}

impl ReportLayout {
    pub fn rank_label(&self, exam: ExamId) -> String {
        self.rank_column_template
            .replace("{exam}", &exam.to_string())
    }
}

/// The progress coefficient report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub generated_at: DateTime<Utc>,
    /// Exams any reported student sat, ascending.
    pub exams: Vec<ExamId>,
    /// Ordered by student name.
    pub entries: Vec<ProgressEntry>,
    pub skipped: Vec<SkippedStudent>,
}

impl ProgressReport {
    /// Flatten into the exported spreadsheet layout.
    pub fn to_table(&self, layout: &ReportLayout) -> Table {
        let mut columns = Vec::with_capacity(self.exams.len() + 2);
        columns.push(layout.student_column.clone());
        columns.extend(self.exams.iter().map(|e| layout.rank_label(*e)));
        columns.push(layout.coefficient_column.clone());

        let rows = self
            .entries
            .iter()
            .map(|entry| {
                let mut row = Vec::with_capacity(columns.len());
                row.push(Cell::Text(entry.student.clone()));
                for exam in &self.exams {
                    row.push(entry.rank_in(*exam).map(Cell::Float).unwrap_or_default());
                }
                row.push(Cell::Float(entry.coefficient));
                row
            })
            .collect();

        Table { columns, rows }
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: ProgressReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Mean coefficient across reported students.
    pub fn mean_coefficient(&self) -> Option<f64> {
        if self.entries.is_empty() {
            return None;
        }
        let sum: f64 = self.entries.iter().map(|e| e.coefficient).sum();
        Some(sum / self.entries.len() as f64)
    }
}

/// Compute one student's entry from their ascending sittings.
pub fn entry_for(student: &str, sittings: &[(ExamId, f64)]) -> Result<ProgressEntry, ProgressError> {
    let [.., (previous_exam, previous), (current_exam, current)] = sittings else {
        return Err(ProgressError::InsufficientHistory {
            student: student.to_string(),
            sittings: sittings.len(),
        });
    };
    let coefficient =
        coefficient(*previous, *current).ok_or_else(|| ProgressError::ZeroPreviousRank {
            student: student.to_string(),
            exam: *previous_exam,
        })?;

    Ok(ProgressEntry {
        student: student.to_string(),
        ranks: sittings
            .iter()
            .map(|&(exam, rank)| ExamRank { exam, rank })
            .collect(),
        previous_exam: *previous_exam,
        current_exam: *current_exam,
        coefficient,
    })
}

/// Run the calculator over every student. `None` if canceled.
///
/// Students with fewer than two sittings get an info notice; a zero
/// previous rank is reported as an error. Both are left out of the report
/// and listed in [`ProgressReport::skipped`].
pub fn compute(history: &StudentRankHistory, ctx: &JobContext) -> Option<ProgressReport> {
    let total = history.len();
    let mut entries = Vec::new();
    let mut skipped = Vec::new();

    for (done, student) in history.students().enumerate() {
        if ctx.should_stop() {
            return None;
        }
        tracing::debug!(student, "computing progress coefficient");

        match entry_for(student, &history.sittings(student)) {
            Ok(entry) => entries.push(entry),
            Err(err) => {
                match err {
                    ProgressError::InsufficientHistory { .. } => {
                        ctx.diagnostics.info(err.to_string())
                    }
                    ProgressError::ZeroPreviousRank { .. } => {
                        ctx.diagnostics.error(err.to_string())
                    }
                }
                skipped.push(SkippedStudent::from(&err));
            }
        }
        ctx.diagnostics.progress(done + 1, total);
    }

    let mut exams: Vec<ExamId> = entries
        .iter()
        .flat_map(|e| e.ranks.iter().map(|r| r.exam))
        .collect();
    exams.sort();
    exams.dedup();

    Some(ProgressReport {
        generated_at: Utc::now(),
        exams,
        entries,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{drain, Diagnostic};
    use crate::model::{ExamRecord, SourceBatch};

    fn batch(exam: i64, rows: &[(&str, f64)]) -> SourceBatch {
        SourceBatch {
            source: format!("{exam}.csv").into(),
            columns: vec![],
            records: rows
                .iter()
                .map(|&(student, rank)| ExamRecord {
                    exam: ExamId(exam),
                    student: student.into(),
                    rank,
                    cells: vec![],
                })
                .collect(),
            dropped_rows: 0,
        }
    }

    fn history(batches: &[SourceBatch]) -> StudentRankHistory {
        StudentRankHistory::reconcile(batches).unwrap()
    }

    #[test]
    fn coefficient_sign_convention() {
        assert_eq!(coefficient(10.0, 8.0), Some(0.2));
        assert_eq!(coefficient(5.0, 6.0), Some(-0.2));
        assert_eq!(coefficient(4.0, 4.0), Some(0.0));
        assert_eq!(coefficient(0.0, 3.0), None);
    }

    #[test]
    fn two_file_scenario() {
        let h = history(&[
            batch(1, &[("甲", 10.0), ("乙", 5.0)]),
            batch(2, &[("甲", 8.0), ("乙", 6.0)]),
        ]);
        let (ctx, _rx) = JobContext::new();
        let report = compute(&h, &ctx).unwrap();

        assert_eq!(report.exams, vec![ExamId(1), ExamId(2)]);
        let by_name = |name: &str| report.entries.iter().find(|e| e.student == name).unwrap();
        assert_eq!(by_name("甲").coefficient, 0.2);
        assert_eq!(by_name("乙").coefficient, -0.2);
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn uses_two_highest_exams() {
        let h = history(&[
            batch(3, &[("甲", 4.0)]),
            batch(1, &[("甲", 20.0)]),
            batch(2, &[("甲", 8.0)]),
        ]);
        let entry = entry_for("甲", &h.sittings("甲")).unwrap();
        assert_eq!(entry.previous_exam, ExamId(2));
        assert_eq!(entry.current_exam, ExamId(3));
        assert_eq!(entry.coefficient, 0.5);
        assert_eq!(entry.ranks.len(), 3);
    }

    #[test]
    fn single_sitting_is_skipped_with_notice() {
        let h = history(&[batch(1, &[("甲", 10.0), ("丙", 1.0)]), batch(2, &[("甲", 8.0)])]);
        let (ctx, mut rx) = JobContext::new();
        let report = compute(&h, &ctx).unwrap();

        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].student, "丙");
        assert_eq!(report.skipped[0].reason, SkipReason::InsufficientHistory);

        let messages = drain(&mut rx);
        assert!(messages
            .iter()
            .any(|d| matches!(d, Diagnostic::Info(m) if m.contains("丙") && m.contains('1'))));
        assert_eq!(messages.last(), Some(&Diagnostic::Progress(100.0)));
    }

    #[test]
    fn zero_previous_rank_is_an_error_not_infinity() {
        let h = history(&[batch(1, &[("甲", 0.0)]), batch(2, &[("甲", 3.0)])]);
        let (ctx, mut rx) = JobContext::new();
        let report = compute(&h, &ctx).unwrap();

        assert!(report.entries.is_empty());
        assert_eq!(report.skipped[0].reason, SkipReason::ZeroPreviousRank);
        assert!(drain(&mut rx)
            .iter()
            .any(|d| matches!(d, Diagnostic::Error(m) if m.contains("甲"))));
    }

    #[test]
    fn canceled_compute_returns_none() {
        let h = history(&[batch(1, &[("甲", 1.0)])]);
        let (ctx, _rx) = JobContext::new();
        ctx.cancel.cancel();
        assert!(compute(&h, &ctx).is_none());
    }

    #[test]
    fn table_has_gap_for_missed_exam() {
        let h = history(&[
            batch(1, &[("甲", 10.0), ("乙", 5.0)]),
            batch(2, &[("甲", 8.0)]),
            batch(3, &[("乙", 4.0)]),
        ]);
        let (ctx, _rx) = JobContext::new();
        let report = compute(&h, &ctx).unwrap();
        let table = report.to_table(&ReportLayout::default());

        assert_eq!(
            table.columns,
            vec!["学生姓名", "第1次考试排名", "第2次考试排名", "第3次考试排名", "进退步系数"]
        );
        // 乙 sorts before 甲 by code point
        let yi = table.rows.iter().find(|r| r[0] == Cell::from("乙")).unwrap();
        assert_eq!(yi[2], Cell::Empty);
        assert_eq!(yi[4], Cell::Float(0.2));
        let jia = table.rows.iter().find(|r| r[0] == Cell::from("甲")).unwrap();
        assert_eq!(jia[3], Cell::Empty);
        assert_eq!(jia[1].to_string(), "10");
    }

    #[test]
    fn json_round_trip() {
        let h = history(&[batch(1, &[("甲", 10.0)]), batch(2, &[("甲", 8.0)])]);
        let (ctx, _rx) = JobContext::new();
        let report = compute(&h, &ctx).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");
        report.save_json(&path).unwrap();
        let loaded = ProgressReport::load_json(&path).unwrap();
        assert_eq!(loaded, report);
        assert_eq!(loaded.mean_coefficient(), Some(0.2));
    }
}
