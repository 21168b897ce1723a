//! # Undo/Redo History
//!
//! Linear history of recorded changes with a cursor.
//!
//! ## Design
//!
//! - `record` drops every entry after the cursor, applies the change and
//!   appends it
//! - `undo` reverts the entry before the cursor through the applier's stored
//!   original state; `redo` re-applies the entry at the cursor
//! - Consecutive edits of the same selector with the same change type squash
//!   into one entry until a commit signal (`commit`, `undo` or `redo`). The
//!   entry's record becomes the merge of the run (see `ChangeRecord::merge`),
//!   so a style run keeps every property it touched. Inserts never squash.
//! - A squashed entry keeps the originals of the first edit, so one undo
//!   returns to the state before the run started
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut history = History::new(owner, 100);
//!
//! history.record(ChangeRecord::text("#title", "H")?, &mut page)?;
//! history.record(ChangeRecord::text("#title", "Hi")?, &mut page)?;
//! assert_eq!(history.len(), 1);
//!
//! history.undo(&mut page);
//! history.redo(&mut page)?;
//! ```

use crate::applier::ApplyOutcome;
use crate::errors::ApplyResult;
use crate::marker::Owner;
use crate::originals::OriginalState;
use crate::page::Page;
use abkit_changes::ChangeRecord;
use tracing::debug;

/// One undo step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// The record of the run, merged when edits were squashed
    pub record: ChangeRecord,

    /// States captured when the run was first applied
    pub originals: Vec<OriginalState>,

    /// Elements the entry's record applied to
    pub applied_count: usize,

    /// Records collapsed into this entry (1 when nothing was squashed)
    pub squashed: usize,
}

impl HistoryEntry {
    fn new(record: ChangeRecord, outcome: ApplyOutcome) -> Self {
        Self {
            record,
            originals: outcome.originals,
            applied_count: outcome.applied_count,
            squashed: 1,
        }
    }
}

/// Undo/redo history for one edit session
#[derive(Debug)]
pub struct History {
    owner: Owner,

    entries: Vec<HistoryEntry>,

    /// Number of entries currently applied
    cursor: usize,

    /// Maximum number of undo levels (0 = unlimited)
    max_levels: usize,

    /// Set by a commit signal, cleared by the next record
    committed: bool,
}

impl History {
    pub fn new(owner: Owner, max_levels: usize) -> Self {
        Self {
            owner,
            entries: Vec::new(),
            cursor: 0,
            max_levels,
            committed: true,
        }
    }

    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    /// Apply `record` and add it to the history, squashing into the last
    /// entry when it continues the current edit.
    ///
    /// On error neither the history nor the page changes.
    pub fn record(&mut self, record: ChangeRecord, page: &mut Page) -> ApplyResult<()> {
        if let Some(merged) = self.squash_candidate(&record) {
            return self.squash(merged, page);
        }

        let outcome = page.apply(&self.owner, &record)?;

        // Entries after the cursor have already been reverted by undo
        self.entries.truncate(self.cursor);
        self.entries.push(HistoryEntry::new(record, outcome));
        self.cursor += 1;

        if self.max_levels > 0 && self.entries.len() > self.max_levels {
            // The dropped change stays applied; it just can't be undone
            self.entries.remove(0);
            self.cursor -= 1;
        }

        self.committed = false;
        debug!(cursor = self.cursor, len = self.entries.len(), "Recorded change");
        Ok(())
    }

    /// Same selector, same type, cursor at the end, no commit since, and the
    /// two records merge into one
    fn squash_candidate(&self, record: &ChangeRecord) -> Option<ChangeRecord> {
        if self.committed || self.cursor != self.entries.len() {
            return None;
        }
        let last = self.entries.last()?;
        if last.record.change_type() != record.change_type() {
            return None;
        }
        last.record.merge(record)
    }

    fn squash(&mut self, record: ChangeRecord, page: &mut Page) -> ApplyResult<()> {
        let Some(last) = self.entries.last_mut() else {
            return Ok(());
        };

        page.revert(&self.owner, &last.record);
        let outcome = match page.apply(&self.owner, &record) {
            Ok(outcome) => outcome,
            Err(e) => {
                // Put the previous edit back so the failed call changes nothing
                page.apply(&self.owner, &last.record)?;
                return Err(e);
            }
        };

        last.record = record;
        last.applied_count = outcome.applied_count;
        last.squashed += 1;
        if last.originals.is_empty() {
            last.originals = outcome.originals;
        }

        debug!(squashed = last.squashed, "Squashed change into last entry");
        Ok(())
    }

    /// End the current edit run; the next record starts a new entry
    pub fn commit(&mut self) {
        self.committed = true;
    }

    /// Revert the entry before the cursor
    pub fn undo(&mut self, page: &mut Page) -> bool {
        self.committed = true;
        if self.cursor == 0 {
            return false;
        }

        self.cursor -= 1;
        let entry = &self.entries[self.cursor];
        let outcome = page.revert(&self.owner, &entry.record);
        debug!(
            cursor = self.cursor,
            reverted = outcome.reverted_count,
            mismatches = outcome.mismatches,
            "Undo"
        );
        true
    }

    /// Re-apply the entry at the cursor
    pub fn redo(&mut self, page: &mut Page) -> ApplyResult<bool> {
        self.committed = true;
        let Some(entry) = self.entries.get_mut(self.cursor) else {
            return Ok(false);
        };

        let outcome = page.apply(&self.owner, &entry.record)?;
        entry.applied_count = outcome.applied_count;
        self.cursor += 1;
        debug!(cursor = self.cursor, applied = outcome.applied_count, "Redo");
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    /// Position of the cursor (entries currently applied)
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Records currently in effect, oldest first
    pub fn changes(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.entries[..self.cursor].iter().map(|e| &e.record)
    }

    /// Revert everything still applied and forget all entries
    pub fn clear(&mut self, page: &mut Page) {
        while self.undo(page) {}
        self.entries.clear();
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn setup() -> (History, Page) {
        let page = Page::parse(
            r#"<h1 id="title">Welcome</h1><p id="p">Body</p>"#,
            "https://x/",
            &EngineConfig::default(),
        )
        .unwrap();
        (History::new(Owner::new("e", "v").unwrap(), 100), page)
    }

    fn title(page: &Page) -> String {
        let doc = page.document();
        doc.text_content(doc.get_element_by_id("title").unwrap())
    }

    #[test]
    fn test_history_creation() {
        let (history, _) = setup();
        assert_eq!(history.len(), 0);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_record_undo_redo() {
        let (mut history, mut page) = setup();
        history
            .record(ChangeRecord::text("#title", "Hello").unwrap(), &mut page)
            .unwrap();
        assert_eq!(title(&page), "Hello");

        assert!(history.undo(&mut page));
        assert_eq!(title(&page), "Welcome");
        assert!(history.can_redo());

        assert!(history.redo(&mut page).unwrap());
        assert_eq!(title(&page), "Hello");
        assert!(!history.can_redo());
    }

    #[test]
    fn test_new_record_clears_redo() {
        let (mut history, mut page) = setup();
        history
            .record(ChangeRecord::text("#title", "A").unwrap(), &mut page)
            .unwrap();
        history.undo(&mut page);
        assert!(history.can_redo());

        history
            .record(ChangeRecord::text("#p", "B").unwrap(), &mut page)
            .unwrap();
        assert!(!history.can_redo());
        assert_eq!(history.len(), 1);
        assert_eq!(title(&page), "Welcome");
    }

    #[test]
    fn test_commit_stops_squashing() {
        let (mut history, mut page) = setup();
        history
            .record(ChangeRecord::text("#title", "A").unwrap(), &mut page)
            .unwrap();
        history
            .record(ChangeRecord::text("#title", "AB").unwrap(), &mut page)
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.entries()[0].squashed, 2);

        history.commit();
        history
            .record(ChangeRecord::text("#title", "ABC").unwrap(), &mut page)
            .unwrap();
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_different_type_starts_new_entry() {
        let (mut history, mut page) = setup();
        history
            .record(ChangeRecord::text("#title", "A").unwrap(), &mut page)
            .unwrap();
        history
            .record(
                ChangeRecord::style("#title", [("color", "red")]).unwrap(),
                &mut page,
            )
            .unwrap();
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_max_levels_enforced() {
        let (_, mut page) = setup();
        let mut history = History::new(Owner::new("e", "v").unwrap(), 2);

        for i in 0..3 {
            history
                .record(
                    ChangeRecord::text("#title", format!("Text {}", i)).unwrap(),
                    &mut page,
                )
                .unwrap();
            history.commit();
        }

        assert_eq!(history.len(), 2);
        assert_eq!(history.cursor(), 2);
        assert_eq!(title(&page), "Text 2");
    }

    #[test]
    fn test_failed_record_changes_nothing() {
        let (mut history, mut page) = setup();
        let before = page.to_html();
        let bad = ChangeRecord::attribute("#title", [("data-abkit-key", None)]).unwrap();

        assert!(history.record(bad, &mut page).is_err());
        assert!(history.is_empty());
        assert_eq!(page.to_html(), before);
    }
}
