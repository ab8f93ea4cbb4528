//! Error taxonomy for examtrend operations.
//!
//! Each failure class maps to one row of the operator-facing taxonomy:
//! unreadable sources, missing columns, cross-source integrity violations,
//! per-student calculation problems, and output write failures. Whether a
//! given error is batch-fatal depends on the operation, not on the type.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::model::{join_ids, ExamId};

/// A source file could not be opened or parsed.
#[derive(Debug, Clone, Error)]
#[error("cannot read {}: {cause}", .path.display())]
pub struct ReadFailure {
    pub path: PathBuf,
    pub cause: String,
}

/// A source file lacks one or more required columns.
#[derive(Debug, Clone, Error)]
#[error("{} is missing required column(s): {}", .path.display(), .missing.join(", "))]
pub struct SchemaFailure {
    pub path: PathBuf,
    pub missing: Vec<String>,
}

/// Violations that corrupt reconciliation across sources.
#[derive(Debug, Clone, Error)]
pub enum IntegrityError {
    /// Exam identifiers already claimed by an earlier source.
    #[error("duplicate exam identifier(s) found in {}: {}", .path.display(), join_ids(.ids))]
    DuplicateExamIdentifier { path: PathBuf, ids: Vec<ExamId> },

    /// The same student was given two ranks for one exam.
    #[error("student {student} has more than one rank for exam {exam}")]
    ConflictingEntry { student: String, exam: ExamId },
}

/// Per-student problems while computing the progress coefficient.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProgressError {
    #[error("student {student} sat only {sittings} exam(s); skipped")]
    InsufficientHistory { student: String, sittings: usize },

    #[error("student {student} has rank 0 in exam {exam}; progress coefficient is undefined")]
    ZeroPreviousRank { student: String, exam: ExamId },
}

/// An output file could not be written.
#[derive(Debug, Clone, Error)]
pub enum WriteFailure {
    #[error("cannot save {}: the file is locked or open in another program", .path.display())]
    Locked { path: PathBuf },

    #[error("cannot save {}: {cause}", .path.display())]
    Io { path: PathBuf, cause: String },
}

impl WriteFailure {
    /// Classify an I/O error raised while writing `path`.
    pub fn from_io(path: impl Into<PathBuf>, err: &io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            io::ErrorKind::PermissionDenied => WriteFailure::Locked { path },
            _ => WriteFailure::Io {
                path,
                cause: err.to_string(),
            },
        }
    }

    pub fn path(&self) -> &PathBuf {
        match self {
            WriteFailure::Locked { path } | WriteFailure::Io { path, .. } => path,
        }
    }
}

/// Errors that end an operation.
#[derive(Debug, Clone, Error)]
pub enum ExamError {
    #[error(transparent)]
    Read(#[from] ReadFailure),

    #[error(transparent)]
    Schema(#[from] SchemaFailure),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error(transparent)]
    Write(#[from] WriteFailure),
}
