//! Per-source gate: read → schema → duplicate check.
//!
//! [`Intake`] is the accumulator threaded through the gate. Each accepted
//! source is folded in with [`Intake::admit`], which returns the updated
//! value, so the gate has no state outside what the caller holds.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::engine::Outcome;
use crate::error::{ExamError, IntegrityError};
use crate::job::JobContext;
use crate::model::{ExamId, RequiredColumns, SourceBatch};
use crate::registry::ExamRegistry;
use crate::schema;
use crate::traits::{Confirm, TabularReader};

/// What to do when a source cannot be read or lacks required columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakePolicy {
    /// Abort the whole operation.
    Fatal,
    /// Ask the operator; skip the file if they agree, cancel otherwise.
    SkipWithConfirmation,
}

/// Accepted sources so far, plus the exam identifiers they claim.
#[derive(Debug, Clone, Default)]
pub struct Intake {
    registry: ExamRegistry,
    batches: Vec<SourceBatch>,
    skipped: Vec<PathBuf>,
}

impl Intake {
    /// Fold one schema-checked batch in, rejecting reused exam identifiers.
    pub fn admit(mut self, batch: SourceBatch) -> Result<Self, IntegrityError> {
        let duplicates = self.registry.claim(&batch.exam_ids());
        if !duplicates.is_empty() {
            return Err(IntegrityError::DuplicateExamIdentifier {
                path: batch.source,
                ids: duplicates.into_iter().collect(),
            });
        }
        self.batches.push(batch);
        Ok(self)
    }

    /// Record a source the operator chose to skip.
    pub fn skip(mut self, path: PathBuf) -> Self {
        self.skipped.push(path);
        self
    }

    pub fn batches(&self) -> &[SourceBatch] {
        &self.batches
    }

    pub fn skipped(&self) -> &[PathBuf] {
        &self.skipped
    }

    pub fn claimed(&self) -> &BTreeSet<ExamId> {
        self.registry.claimed()
    }

    pub fn summary(&self) -> IntakeSummary {
        let students: BTreeSet<&str> = self
            .batches
            .iter()
            .flat_map(|b| b.records.iter().map(|r| r.student.as_str()))
            .collect();
        IntakeSummary {
            sources: self
                .batches
                .iter()
                .map(|b| SourceSummary {
                    path: b.source.clone(),
                    exam: b.max_exam(),
                    rows: b.records.len(),
                    dropped_rows: b.dropped_rows,
                })
                .collect(),
            skipped: self.skipped.clone(),
            exams: self.registry.claimed().iter().copied().collect(),
            students: students.len(),
        }
    }
}

/// Result of a dry-run intake.
#[derive(Debug, Clone, Serialize)]
pub struct IntakeSummary {
    pub sources: Vec<SourceSummary>,
    pub skipped: Vec<PathBuf>,
    pub exams: Vec<ExamId>,
    pub students: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub path: PathBuf,
    /// The exam number the file represents; `None` if no row survived coercion.
    pub exam: Option<ExamId>,
    pub rows: usize,
    pub dropped_rows: usize,
}

/// Run every input through the gate in order.
pub fn load_sources(
    reader: &dyn TabularReader,
    inputs: &[PathBuf],
    required: &RequiredColumns,
    policy: IntakePolicy,
    ctx: &JobContext,
    confirm: &dyn Confirm,
) -> Outcome<Intake> {
    let mut intake = Intake::default();

    for path in inputs {
        if ctx.should_stop() {
            return Outcome::Canceled;
        }
        tracing::debug!(path = %path.display(), "reading source");

        let batch = match read_batch(reader, path, required) {
            Ok(batch) => batch,
            Err(err) => match policy {
                IntakePolicy::Fatal => {
                    ctx.diagnostics.error(err.to_string());
                    return Outcome::Failed(err);
                }
                IntakePolicy::SkipWithConfirmation => {
                    ctx.diagnostics.warning(err.to_string());
                    let prompt = format!("skip {} and continue?", path.display());
                    if confirm.confirm(&prompt) {
                        ctx.diagnostics
                            .info(format!("skipped {}", path.display()));
                        intake = intake.skip(path.clone());
                        continue;
                    }
                    ctx.diagnostics.canceled();
                    return Outcome::Canceled;
                }
            },
        };

        if batch.dropped_rows > 0 {
            ctx.diagnostics.warning(format!(
                "{}: dropped {} row(s) with an unusable exam identifier, name, or rank",
                path.display(),
                batch.dropped_rows
            ));
        }

        match intake.admit(batch) {
            Ok(next) => intake = next,
            Err(err) => {
                ctx.diagnostics.error(err.to_string());
                return Outcome::Failed(err.into());
            }
        }
    }

    Outcome::Completed(intake)
}

fn read_batch(
    reader: &dyn TabularReader,
    path: &Path,
    required: &RequiredColumns,
) -> Result<SourceBatch, ExamError> {
    let set = reader.read(path)?;
    Ok(schema::into_batch(set, required)?)
}
