//! Duplicate-exam detector.

use std::collections::BTreeSet;

use crate::model::ExamId;

/// Exam identifiers already claimed by earlier sources in one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExamRegistry {
    claimed: BTreeSet<ExamId>,
}

impl ExamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `ids` for a newly read source.
    ///
    /// Returns the identifiers that were already claimed; the registry
    /// includes all of `ids` afterwards either way.
    pub fn claim(&mut self, ids: &BTreeSet<ExamId>) -> BTreeSet<ExamId> {
        let duplicates: BTreeSet<ExamId> = ids.intersection(&self.claimed).copied().collect();
        self.claimed.extend(ids.iter().copied());
        duplicates
    }

    pub fn contains(&self, id: ExamId) -> bool {
        self.claimed.contains(&id)
    }

    pub fn claimed(&self) -> &BTreeSet<ExamId> {
        &self.claimed
    }

    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }
}
