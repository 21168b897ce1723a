//! # Edit Session Management
//!
//! Tracks one operator's editing of one variant.
//!
//! An EditSession is an explicit value owned by whoever starts the edit: it
//! holds the history, the experiment/variant being edited and the current
//! selection. Nothing about the session lives in global state, so two
//! sessions (or a finished one and a new one) never see each other.

use crate::config::EngineConfig;
use crate::errors::{EditorError, EditorResult};
use crate::history::History;
use crate::marker::Owner;
use crate::page::Page;
use abkit_changes::{ChangeRecord, VariantChangeSet};
use tracing::{debug, info};

/// Single edit session
#[derive(Debug)]
pub struct EditSession {
    /// Unique session identifier
    pub id: String,

    history: History,

    /// Selector of the element being edited
    selection: Option<String>,
}

impl EditSession {
    /// Start editing `owner`'s variant
    pub fn new(id: impl Into<String>, owner: Owner, config: &EngineConfig) -> EditorResult<Self> {
        config.validate()?;
        let id = id.into();
        info!(session = %id, owner = %owner, "Starting edit session");

        Ok(Self {
            id,
            history: History::new(owner, config.max_history),
            selection: None,
        })
    }

    pub fn owner(&self) -> &Owner {
        self.history.owner()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Apply a change and record it for undo
    pub fn record(&mut self, record: ChangeRecord, page: &mut Page) -> EditorResult<()> {
        self.history.record(record, page)?;
        Ok(())
    }

    pub fn undo(&mut self, page: &mut Page) -> bool {
        self.history.undo(page)
    }

    pub fn redo(&mut self, page: &mut Page) -> EditorResult<bool> {
        Ok(self.history.redo(page)?)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Explicit end of the current edit (blur)
    pub fn commit(&mut self) {
        self.history.commit();
    }

    /// Select an element to edit; changing the selection ends the current edit
    pub fn select(&mut self, selector: impl Into<String>) {
        let selector = selector.into();
        if self.selection.as_deref() != Some(selector.as_str()) {
            self.history.commit();
        }
        debug!(selector = %selector, "Selected element");
        self.selection = Some(selector);
    }

    pub fn deselect(&mut self) {
        self.history.commit();
        self.selection = None;
    }

    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    /// Current history cursor position
    pub fn cursor(&self) -> usize {
        self.history.cursor()
    }

    /// Records currently in effect, in order
    pub fn changes(&self) -> Vec<ChangeRecord> {
        self.history.changes().cloned().collect()
    }

    /// The session's changes as a savable change set
    pub fn to_change_set(&self) -> EditorResult<VariantChangeSet> {
        let owner = self.owner();
        let set = VariantChangeSet::new(owner.experiment_id.clone(), owner.variant_id.clone())
            .map_err(EditorError::from)?;
        Ok(set.with_changes(self.changes()))
    }

    /// Revert everything the session applied and drop its history
    pub fn discard(mut self, page: &mut Page) {
        info!(session = %self.id, "Discarding edit session");
        self.history.clear(page);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> (EditSession, Page) {
        let config = EngineConfig::default();
        let page = Page::parse(
            r#"<h1 id="title">Welcome</h1><a id="cta" href="/buy">Buy</a>"#,
            "https://x/",
            &config,
        )
        .unwrap();
        let owner = Owner::new("exp", "b").unwrap();
        (EditSession::new("client-1", owner, &config).unwrap(), page)
    }

    #[test]
    fn test_session_creation() {
        let (session, _) = session();
        assert_eq!(session.id, "client-1");
        assert_eq!(session.cursor(), 0);
        assert!(session.selection().is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig::default().with_marker_prefix("abkit");
        let owner = Owner::new("exp", "b").unwrap();
        assert!(EditSession::new("s", owner, &config).is_err());
    }

    #[test]
    fn test_reselecting_same_element_keeps_squashing() {
        let (mut session, mut page) = session();
        session.select("#title");
        session
            .record(ChangeRecord::text("#title", "H").unwrap(), &mut page)
            .unwrap();
        session.select("#title");
        session
            .record(ChangeRecord::text("#title", "Hi").unwrap(), &mut page)
            .unwrap();
        assert_eq!(session.history().len(), 1);

        session.deselect();
        session
            .record(ChangeRecord::text("#title", "Hey").unwrap(), &mut page)
            .unwrap();
        assert_eq!(session.history().len(), 2);
    }

    #[test]
    fn test_change_set_reflects_cursor() {
        let (mut session, mut page) = session();
        session
            .record(ChangeRecord::text("#title", "Hello").unwrap(), &mut page)
            .unwrap();
        session.commit();
        session
            .record(
                ChangeRecord::attribute("#cta", [("href", Some("/buy-now".to_string()))])
                    .unwrap(),
                &mut page,
            )
            .unwrap();
        session.undo(&mut page);

        let set = session.to_change_set().unwrap();
        assert_eq!(set.experiment_id, "exp");
        assert_eq!(set.changes.len(), 1);
        assert_eq!(set.changes[0].selector(), "#title");
    }

    #[test]
    fn test_discard_restores_page() {
        let (mut session, mut page) = session();
        let before = page.to_html();
        session
            .record(ChangeRecord::text("#title", "Hello").unwrap(), &mut page)
            .unwrap();
        session.commit();
        session
            .record(ChangeRecord::delete("#cta").unwrap(), &mut page)
            .unwrap();

        session.discard(&mut page);
        assert_eq!(page.to_html(), before);
    }
}
