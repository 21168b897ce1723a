use abkit_changes::RecordId;
use abkit_editor::{ApplyError, ApplyOutcome, Owner, RevertOutcome};

/// What happened to one record during enable, disable or a retry
#[derive(Debug, Clone, PartialEq)]
pub enum RecordStatus {
    Applied(ApplyOutcome),
    /// Waits for an element that is not on the page yet
    Pending,
    /// Switched off in the payload
    Disabled,
    Failed(ApplyError),
    Reverted(RevertOutcome),
    /// No marker of the record was found
    NotPresent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordReport {
    pub record_id: RecordId,
    pub status: RecordStatus,
}

/// Per-record results for one variant. A failing record never stops the
/// records after it.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewReport {
    pub owner: Owner,
    pub records: Vec<RecordReport>,
    /// Leftover tokens cleaned up after the per-record reverts
    pub swept: RevertOutcome,
}

impl PreviewReport {
    pub(crate) fn new(owner: Owner) -> Self {
        Self {
            owner,
            records: Vec::new(),
            swept: RevertOutcome::default(),
        }
    }

    pub(crate) fn push(&mut self, record_id: &RecordId, status: RecordStatus) {
        self.records.push(RecordReport {
            record_id: record_id.clone(),
            status,
        });
    }

    /// Elements mutated across all records
    pub fn applied_count(&self) -> usize {
        self.records
            .iter()
            .map(|r| match &r.status {
                RecordStatus::Applied(outcome) => outcome.applied_count,
                _ => 0,
            })
            .sum()
    }

    /// Elements restored, the final sweep included
    pub fn reverted_count(&self) -> usize {
        let per_record: usize = self
            .records
            .iter()
            .map(|r| match &r.status {
                RecordStatus::Reverted(outcome) => outcome.reverted_count,
                _ => 0,
            })
            .sum();
        per_record + self.swept.reverted_count
    }

    pub fn failures(&self) -> impl Iterator<Item = (&RecordId, &ApplyError)> {
        self.records.iter().filter_map(|r| match &r.status {
            RecordStatus::Failed(err) => Some((&r.record_id, err)),
            _ => None,
        })
    }

    pub fn pending(&self) -> impl Iterator<Item = &RecordId> {
        self.records
            .iter()
            .filter(|r| r.status == RecordStatus::Pending)
            .map(|r| &r.record_id)
    }
}
