//! Operation engine.
//!
//! Runs the three generators over the same intake → reconcile pipeline:
//! the progress report, per-student trend charts, and per-student
//! transcripts. Every operation is synchronous and is meant to run inside a
//! background job; it talks back only through the [`JobContext`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::config::ExamtrendConfig;
use crate::error::{ExamError, WriteFailure};
use crate::intake::{load_sources, Intake, IntakePolicy, IntakeSummary};
use crate::job::JobContext;
use crate::model::RequiredColumns;
use crate::progress::{self, ProgressReport, ReportLayout};
use crate::reconcile::{MergedTable, StudentRankHistory};
use crate::traits::{AssumeNo, AssumeYes, ChartRenderer, Confirm, TableWriter, TabularReader, TrendSeries};

/// How an operation ended.
#[derive(Debug)]
pub enum Outcome<T> {
    Completed(T),
    /// Stopped at a poll point or by the operator. Not an error.
    Canceled,
    /// Batch-fatal failure; the error was already pushed as a diagnostic.
    Failed(ExamError),
}

impl<T> Outcome<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Outcome::Canceled)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Completed(v) => Outcome::Completed(f(v)),
            Outcome::Canceled => Outcome::Canceled,
            Outcome::Failed(e) => Outcome::Failed(e),
        }
    }
}

/// Naming and layout the engine needs from the configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub columns: RequiredColumns,
    /// Progress report file stem.
    pub progress_file: String,
    pub transcript_suffix: String,
    pub chart_suffix: String,
    pub layout: ReportLayout,
    pub chart_title_suffix: String,
    pub chart_y_label: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&ExamtrendConfig::default())
    }
}

impl From<&ExamtrendConfig> for EngineConfig {
    fn from(config: &ExamtrendConfig) -> Self {
        Self {
            columns: config.columns.clone(),
            progress_file: config.output.progress_file.clone(),
            transcript_suffix: config.output.transcript_suffix.clone(),
            chart_suffix: config.output.chart_suffix.clone(),
            layout: config.output.layout(),
            chart_title_suffix: config.chart.title_suffix.clone(),
            chart_y_label: config.chart.y_label.clone(),
        }
    }
}

/// Result of a completed progress report run.
#[derive(Debug, Clone)]
pub struct ProgressRun {
    pub report: ProgressReport,
    /// `None` when no student had two sittings and nothing was written.
    pub path: Option<PathBuf>,
}

/// A student whose chart or transcript could not be produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmitFailure {
    pub student: String,
    pub message: String,
}

/// Result of a per-student emitter run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmitSummary {
    pub written: Vec<PathBuf>,
    pub failures: Vec<EmitFailure>,
    pub skipped_sources: Vec<PathBuf>,
}

/// Replace path separators, characters reserved on common filesystems, and
/// control characters with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

fn ensure_dir(dir: &Path) -> Result<(), WriteFailure> {
    std::fs::create_dir_all(dir).map_err(|e| WriteFailure::from_io(dir, &e))
}

fn fail<T>(ctx: &JobContext, err: impl Into<ExamError>) -> Outcome<T> {
    let err = err.into();
    ctx.diagnostics.error(err.to_string());
    Outcome::Failed(err)
}

/// The operation engine.
pub struct ExamEngine {
    reader: Arc<dyn TabularReader>,
    writer: Arc<dyn TableWriter>,
    renderer: Arc<dyn ChartRenderer>,
    config: EngineConfig,
}

impl ExamEngine {
    pub fn new(
        reader: Arc<dyn TabularReader>,
        writer: Arc<dyn TableWriter>,
        renderer: Arc<dyn ChartRenderer>,
        config: EngineConfig,
    ) -> Self {
        Self {
            reader,
            writer,
            renderer,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn intake(
        &self,
        inputs: &[PathBuf],
        policy: IntakePolicy,
        ctx: &JobContext,
        confirm: &dyn Confirm,
    ) -> Outcome<Intake> {
        load_sources(
            self.reader.as_ref(),
            inputs,
            &self.config.columns,
            policy,
            ctx,
            confirm,
        )
    }

    /// Compute progress coefficients and write the report once at the end.
    ///
    /// `output_dir = None` means no destination was chosen; the operation
    /// ends with the canceled notice and writes nothing.
    pub fn progress_report(
        &self,
        inputs: &[PathBuf],
        output_dir: Option<&Path>,
        ctx: &JobContext,
    ) -> Outcome<ProgressRun> {
        tracing::info!(inputs = inputs.len(), "building progress report");
        let intake = match self.intake(inputs, IntakePolicy::Fatal, ctx, &AssumeNo) {
            Outcome::Completed(intake) => intake,
            Outcome::Canceled => return Outcome::Canceled,
            Outcome::Failed(e) => return Outcome::Failed(e),
        };

        let history = match StudentRankHistory::reconcile(intake.batches()) {
            Ok(history) => history,
            Err(e) => return fail(ctx, e),
        };

        let Some(report) = progress::compute(&history, ctx) else {
            return Outcome::Canceled;
        };

        if report.entries.is_empty() {
            ctx.diagnostics
                .warning("no student sat at least two exams; no progress report written");
            return Outcome::Completed(ProgressRun { report, path: None });
        }

        let Some(dir) = output_dir else {
            ctx.diagnostics.canceled();
            return Outcome::Canceled;
        };
        if ctx.should_stop() {
            return Outcome::Canceled;
        }

        let path = dir.join(format!(
            "{}.{}",
            sanitize_file_name(&self.config.progress_file),
            self.writer.extension()
        ));
        let table = report.to_table(&self.config.layout);
        if let Err(e) = ensure_dir(dir).and_then(|()| self.writer.write(&path, &table)) {
            return fail(ctx, e);
        }

        ctx.diagnostics.info(format!(
            "progress report for {} student(s) saved to {}",
            report.entries.len(),
            path.display()
        ));
        Outcome::Completed(ProgressRun {
            report,
            path: Some(path),
        })
    }

    /// One rank-trend chart per student.
    ///
    /// Unreadable or malformed sources are skipped if `confirm` agrees;
    /// duplicate exam identifiers still abort. A failed chart is reported
    /// and the remaining students continue.
    pub fn trend_charts(
        &self,
        inputs: &[PathBuf],
        output_dir: &Path,
        ctx: &JobContext,
        confirm: &dyn Confirm,
    ) -> Outcome<EmitSummary> {
        tracing::info!(inputs = inputs.len(), "generating trend charts");
        let intake = match self.intake(inputs, IntakePolicy::SkipWithConfirmation, ctx, confirm) {
            Outcome::Completed(intake) => intake,
            Outcome::Canceled => return Outcome::Canceled,
            Outcome::Failed(e) => return Outcome::Failed(e),
        };
        let mut summary = EmitSummary {
            skipped_sources: intake.skipped().to_vec(),
            ..EmitSummary::default()
        };

        let merged = MergedTable::merge(intake.batches()).sorted_by_exam();
        if merged.is_empty() {
            ctx.diagnostics.warning("no valid data to chart");
            return Outcome::Completed(summary);
        }
        if let Err(e) = ensure_dir(output_dir) {
            return fail(ctx, e);
        }

        let students = merged.students();
        let total = students.len();
        for (done, student) in students.into_iter().enumerate() {
            if ctx.should_stop() {
                return Outcome::Canceled;
            }
            tracing::debug!(student, "drawing trend chart");

            let series = TrendSeries {
                student: student.to_string(),
                title: format!("{student}{}", self.config.chart_title_suffix),
                x_label: self.config.columns.exam_id.clone(),
                y_label: self.config.chart_y_label.clone(),
                points: merged.trend(student),
            };
            let path = output_dir.join(format!(
                "{}{}.{}",
                sanitize_file_name(student),
                self.config.chart_suffix,
                self.renderer.extension()
            ));

            match self.renderer.render(&path, &series) {
                Ok(()) => summary.written.push(path),
                Err(e) => {
                    let message = format!("failed to draw chart for {student}: {e:#}");
                    ctx.diagnostics.error(message.clone());
                    summary.failures.push(EmitFailure {
                        student: student.to_string(),
                        message,
                    });
                }
            }
            ctx.diagnostics.progress(done + 1, total);
        }

        ctx.diagnostics.info(format!(
            "{} chart(s) saved to {}",
            summary.written.len(),
            output_dir.display()
        ));
        Outcome::Completed(summary)
    }

    /// One full-history table per student, rows ascending by exam.
    pub fn transcripts(
        &self,
        inputs: &[PathBuf],
        output_dir: &Path,
        ctx: &JobContext,
    ) -> Outcome<EmitSummary> {
        tracing::info!(inputs = inputs.len(), "generating transcripts");
        let intake = match self.intake(inputs, IntakePolicy::Fatal, ctx, &AssumeNo) {
            Outcome::Completed(intake) => intake,
            Outcome::Canceled => return Outcome::Canceled,
            Outcome::Failed(e) => return Outcome::Failed(e),
        };
        let mut summary = EmitSummary::default();

        let merged = MergedTable::merge(intake.batches()).sorted_by_exam();
        if merged.is_empty() {
            ctx.diagnostics.warning("no valid data for transcripts");
            return Outcome::Completed(summary);
        }
        if let Err(e) = ensure_dir(output_dir) {
            return fail(ctx, e);
        }

        let students = merged.students();
        let total = students.len();
        for (done, student) in students.into_iter().enumerate() {
            if ctx.should_stop() {
                return Outcome::Canceled;
            }
            tracing::debug!(student, "writing transcript");

            let path = output_dir.join(format!(
                "{}{}.{}",
                sanitize_file_name(student),
                self.config.transcript_suffix,
                self.writer.extension()
            ));
            match self.writer.write(&path, &merged.transcript(student)) {
                Ok(()) => summary.written.push(path),
                Err(e) => {
                    ctx.diagnostics.error(e.to_string());
                    summary.failures.push(EmitFailure {
                        student: student.to_string(),
                        message: e.to_string(),
                    });
                }
            }
            ctx.diagnostics.progress(done + 1, total);
        }

        ctx.diagnostics.info(format!(
            "{} transcript(s) saved to {}",
            summary.written.len(),
            output_dir.display()
        ));
        Outcome::Completed(summary)
    }

    /// Dry run of the per-source gate and reconciliation. Writes nothing.
    ///
    /// Every unreadable or malformed source is reported and listed as
    /// skipped; duplicate identifiers and conflicting entries still fail.
    pub fn inspect(&self, inputs: &[PathBuf], ctx: &JobContext) -> Outcome<IntakeSummary> {
        tracing::info!(inputs = inputs.len(), "inspecting sources");
        let intake = match self.intake(inputs, IntakePolicy::SkipWithConfirmation, ctx, &AssumeYes) {
            Outcome::Completed(intake) => intake,
            Outcome::Canceled => return Outcome::Canceled,
            Outcome::Failed(e) => return Outcome::Failed(e),
        };
        if let Err(e) = StudentRankHistory::reconcile(intake.batches()) {
            return fail(ctx, e);
        }

        let summary = intake.summary();
        ctx.diagnostics.info(format!(
            "{} source(s) accepted, {} skipped, {} exam(s), {} student(s)",
            summary.sources.len(),
            summary.skipped.len(),
            summary.exams.len(),
            summary.students
        ));
        Outcome::Completed(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{drain, Diagnostic, CANCELED_NOTICE};
    use crate::error::{IntegrityError, ReadFailure};
    use crate::model::{Cell, RecordSet, Table};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MapReader(HashMap<PathBuf, RecordSet>);

    impl TabularReader for MapReader {
        fn read(&self, path: &Path) -> Result<RecordSet, ReadFailure> {
            self.0.get(path).cloned().ok_or_else(|| ReadFailure {
                path: path.to_path_buf(),
                cause: "no such file".into(),
            })
        }
    }

    /// Keeps written tables in memory; refuses students listed in `locked`.
    #[derive(Default)]
    struct MemoryWriter {
        tables: Mutex<Vec<(PathBuf, Table)>>,
        locked: Vec<&'static str>,
    }

    impl TableWriter for MemoryWriter {
        fn extension(&self) -> &str {
            "csv"
        }

        fn write(&self, path: &Path, table: &Table) -> Result<(), WriteFailure> {
            let name = path.to_string_lossy();
            if self.locked.iter().any(|s| name.contains(s)) {
                return Err(WriteFailure::Locked {
                    path: path.to_path_buf(),
                });
            }
            self.tables
                .lock()
                .unwrap()
                .push((path.to_path_buf(), table.clone()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingRenderer {
        series: Mutex<Vec<TrendSeries>>,
        broken: Vec<&'static str>,
    }

    impl ChartRenderer for RecordingRenderer {
        fn extension(&self) -> &str {
            "svg"
        }

        fn render(&self, _path: &Path, series: &TrendSeries) -> anyhow::Result<()> {
            if self.broken.iter().any(|s| *s == series.student) {
                anyhow::bail!("backend refused");
            }
            self.series.lock().unwrap().push(series.clone());
            Ok(())
        }
    }

    fn scores(name: &str, rows: &[(i64, &str, i64)]) -> (PathBuf, RecordSet) {
        (
            name.into(),
            RecordSet {
                source: name.into(),
                columns: vec!["考试编号".into(), "姓名".into(), "级名".into(), "班级".into()],
                rows: rows
                    .iter()
                    .map(|&(exam, student, rank)| {
                        vec![Cell::Int(exam), student.into(), Cell::Int(rank), Cell::Int(3)]
                    })
                    .collect(),
            },
        )
    }

    fn two_exams() -> HashMap<PathBuf, RecordSet> {
        HashMap::from([
            scores("a.csv", &[(1, "甲", 10), (1, "乙", 5)]),
            scores("b.csv", &[(2, "甲", 8), (2, "乙", 6)]),
        ])
    }

    struct Fixture {
        engine: ExamEngine,
        writer: Arc<MemoryWriter>,
        renderer: Arc<RecordingRenderer>,
    }

    fn fixture(files: HashMap<PathBuf, RecordSet>, writer: MemoryWriter, renderer: RecordingRenderer) -> Fixture {
        let writer = Arc::new(writer);
        let renderer = Arc::new(renderer);
        let engine = ExamEngine::new(
            Arc::new(MapReader(files)),
            writer.clone(),
            renderer.clone(),
            EngineConfig::default(),
        );
        Fixture {
            engine,
            writer,
            renderer,
        }
    }

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn sanitize_replaces_reserved_characters() {
        assert_eq!(sanitize_file_name("a/b\\c:d*e?f\"g<h>i|j"), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_file_name("张\t三"), "张_三");
        assert_eq!(sanitize_file_name("甲"), "甲");
    }

    #[test]
    fn progress_report_writes_one_table() {
        let f = fixture(two_exams(), MemoryWriter::default(), RecordingRenderer::default());
        let dir = tempfile::tempdir().unwrap();
        let (ctx, mut rx) = JobContext::new();
        let run = f
            .engine
            .progress_report(&paths(&["a.csv", "b.csv"]), Some(dir.path()), &ctx)
            .completed()
            .unwrap();

        assert_eq!(run.path, Some(dir.path().join("进退步系数.csv")));
        let tables = f.writer.tables.lock().unwrap();
        assert_eq!(tables.len(), 1);
        let table = &tables[0].1;
        assert_eq!(table.columns.len(), 4);
        let jia = table.rows.iter().find(|r| r[0] == Cell::from("甲")).unwrap();
        assert_eq!(jia[3], Cell::Float(0.2));
        let yi = table.rows.iter().find(|r| r[0] == Cell::from("乙")).unwrap();
        assert_eq!(yi[3], Cell::Float(-0.2));
        assert!(matches!(drain(&mut rx).last(), Some(Diagnostic::Info(m)) if m.contains("saved")));
    }

    #[test]
    fn duplicate_exam_blocks_every_operation() {
        let files = HashMap::from([
            scores("a.csv", &[(1, "甲", 10)]),
            scores("b.csv", &[(1, "甲", 8)]),
        ]);
        let f = fixture(files, MemoryWriter::default(), RecordingRenderer::default());
        let inputs = paths(&["a.csv", "b.csv"]);
        let dir = Path::new("out");

        let (ctx, mut rx) = JobContext::new();
        assert!(matches!(
            f.engine.progress_report(&inputs, Some(dir), &ctx),
            Outcome::Failed(ExamError::Integrity(IntegrityError::DuplicateExamIdentifier { .. }))
        ));
        assert!(matches!(f.engine.trend_charts(&inputs, dir, &ctx, &AssumeYes), Outcome::Failed(_)));
        assert!(matches!(f.engine.transcripts(&inputs, dir, &ctx), Outcome::Failed(_)));

        assert!(f.writer.tables.lock().unwrap().is_empty());
        assert!(f.renderer.series.lock().unwrap().is_empty());
        let errors: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|d| matches!(d, Diagnostic::Error(_)))
            .collect();
        assert_eq!(errors.len(), 3);
        assert!(matches!(&errors[0], Diagnostic::Error(m) if m.ends_with(": 1")));
    }

    #[test]
    fn missing_output_dir_cancels_progress_report() {
        let f = fixture(two_exams(), MemoryWriter::default(), RecordingRenderer::default());
        let (ctx, mut rx) = JobContext::new();
        let outcome = f.engine.progress_report(&paths(&["a.csv", "b.csv"]), None, &ctx);

        assert!(outcome.is_canceled());
        assert!(f.writer.tables.lock().unwrap().is_empty());
        assert_eq!(drain(&mut rx).last(), Some(&Diagnostic::Info(CANCELED_NOTICE.into())));
    }

    #[test]
    fn locked_progress_file_is_terminal() {
        let writer = MemoryWriter {
            locked: vec!["进退步系数"],
            ..MemoryWriter::default()
        };
        let f = fixture(two_exams(), writer, RecordingRenderer::default());
        let (ctx, _rx) = JobContext::new();
        let dir = tempfile::tempdir().unwrap();
        let outcome = f
            .engine
            .progress_report(&paths(&["a.csv", "b.csv"]), Some(dir.path()), &ctx);
        assert!(matches!(outcome, Outcome::Failed(ExamError::Write(WriteFailure::Locked { .. }))));
    }

    #[test]
    fn no_two_sittings_writes_nothing() {
        let files = HashMap::from([scores("a.csv", &[(1, "甲", 10)])]);
        let f = fixture(files, MemoryWriter::default(), RecordingRenderer::default());
        let (ctx, _rx) = JobContext::new();
        let run = f
            .engine
            .progress_report(&paths(&["a.csv"]), Some(Path::new("out")), &ctx)
            .completed()
            .unwrap();
        assert_eq!(run.path, None);
        assert_eq!(run.report.skipped.len(), 1);
        assert!(f.writer.tables.lock().unwrap().is_empty());
    }

    #[test]
    fn charts_continue_past_a_failed_student() {
        let renderer = RecordingRenderer {
            broken: vec!["甲"],
            ..RecordingRenderer::default()
        };
        let f = fixture(two_exams(), MemoryWriter::default(), renderer);
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _rx) = JobContext::new();
        let summary = f
            .engine
            .trend_charts(&paths(&["b.csv", "a.csv"]), dir.path(), &ctx, &AssumeNo)
            .completed()
            .unwrap();

        assert_eq!(summary.written, vec![dir.path().join("乙_年级排名折线图.svg")]);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].student, "甲");

        let series = f.renderer.series.lock().unwrap();
        assert_eq!(series[0].title, "乙 年级排名折线图");
        assert_eq!(series[0].x_label, "考试编号");
        let exams: Vec<i64> = series[0].points.iter().map(|p| p.exam.0).collect();
        assert_eq!(exams, vec![1, 2]);
    }

    #[test]
    fn charts_skip_unreadable_file_when_confirmed() {
        let f = fixture(two_exams(), MemoryWriter::default(), RecordingRenderer::default());
        let dir = tempfile::tempdir().unwrap();
        let inputs = paths(&["a.csv", "broken.xlsx", "b.csv"]);

        let (ctx, _rx) = JobContext::new();
        let summary = f
            .engine
            .trend_charts(&inputs, dir.path(), &ctx, &AssumeYes)
            .completed()
            .unwrap();
        assert_eq!(summary.written.len(), 2);
        assert_eq!(summary.skipped_sources, vec![PathBuf::from("broken.xlsx")]);

        let (ctx, _rx) = JobContext::new();
        assert!(f
            .engine
            .trend_charts(&inputs, dir.path(), &ctx, &AssumeNo)
            .is_canceled());
    }

    #[test]
    fn transcripts_fail_on_unreadable_file() {
        let f = fixture(two_exams(), MemoryWriter::default(), RecordingRenderer::default());
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _rx) = JobContext::new();
        let outcome = f
            .engine
            .transcripts(&paths(&["a.csv", "broken.xlsx"]), dir.path(), &ctx);
        assert!(matches!(outcome, Outcome::Failed(ExamError::Read(_))));
        assert!(f.writer.tables.lock().unwrap().is_empty());
    }

    #[test]
    fn transcripts_keep_all_columns_and_skip_locked_students() {
        let writer = MemoryWriter {
            locked: vec!["甲"],
            ..MemoryWriter::default()
        };
        let f = fixture(two_exams(), writer, RecordingRenderer::default());
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _rx) = JobContext::new();
        let summary = f
            .engine
            .transcripts(&paths(&["b.csv", "a.csv"]), dir.path(), &ctx)
            .completed()
            .unwrap();

        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.written, vec![dir.path().join("乙_成绩单.csv")]);
        let tables = f.writer.tables.lock().unwrap();
        let table = &tables[0].1;
        assert_eq!(table.columns, vec!["考试编号", "姓名", "级名", "班级"]);
        assert_eq!(table.rows[0][0], Cell::Int(1));
        assert_eq!(table.rows[1][0], Cell::Int(2));
        assert_eq!(table.rows[0][3], Cell::Int(3));
    }

    #[test]
    fn canceled_before_start_writes_nothing() {
        let f = fixture(two_exams(), MemoryWriter::default(), RecordingRenderer::default());
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _rx) = JobContext::new();
        ctx.cancel.cancel();
        assert!(f
            .engine
            .transcripts(&paths(&["a.csv", "b.csv"]), dir.path(), &ctx)
            .is_canceled());
        assert!(f.writer.tables.lock().unwrap().is_empty());
    }

    #[test]
    fn inspect_lists_skipped_sources() {
        let f = fixture(two_exams(), MemoryWriter::default(), RecordingRenderer::default());
        let (ctx, _rx) = JobContext::new();
        let summary = f
            .engine
            .inspect(&paths(&["a.csv", "gone.csv", "b.csv"]), &ctx)
            .completed()
            .unwrap();
        assert_eq!(summary.sources.len(), 2);
        assert_eq!(summary.skipped, vec![PathBuf::from("gone.csv")]);
        assert_eq!(summary.students, 2);
    }
}
