use crate::applier::{Applier, ApplyOutcome, RevertOutcome};
use crate::config::EngineConfig;
use crate::errors::{ApplyResult, EditorResult};
use crate::marker::{Markers, Owner};
use abkit_changes::ChangeRecord;
use abkit_dom::Document;
use tracing::debug;

/// A document together with the applier that owns its change markers.
///
/// Everything that mutates the page for a variant goes through here, so the
/// original-state store always lives exactly as long as the document.
#[derive(Debug)]
pub struct Page {
    document: Document,
    applier: Applier,
}

impl Page {
    /// Wrap a document. Fails when `config` is invalid, so markers are
    /// never written under a prefix the engine can't recognize later.
    pub fn new(document: Document, config: &EngineConfig) -> EditorResult<Self> {
        config.validate()?;
        debug!(prefix = %config.marker_prefix, url = %document.url(), "Opening page");
        Ok(Self {
            document,
            applier: Applier::new(config),
        })
    }

    pub fn parse(html: &str, url: &str, config: &EngineConfig) -> EditorResult<Self> {
        config.validate()?;
        Self::new(Document::parse(html, url)?, config)
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Direct access for host-side edits (SPA re-renders, foreign scripts)
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn applier(&self) -> &Applier {
        &self.applier
    }

    pub fn markers(&self) -> &Markers {
        self.applier.markers()
    }

    pub fn url(&self) -> &str {
        self.document.url()
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.document.set_url(url);
    }

    pub fn apply(&mut self, owner: &Owner, record: &ChangeRecord) -> ApplyResult<ApplyOutcome> {
        self.applier.apply(owner, record, &mut self.document)
    }

    pub fn revert(&mut self, owner: &Owner, record: &ChangeRecord) -> RevertOutcome {
        self.applier.revert(owner, record, &mut self.document)
    }

    pub fn revert_owner(&mut self, owner: &Owner) -> RevertOutcome {
        self.applier.revert_owner(owner, &mut self.document)
    }

    pub fn is_applied(&self, owner: &Owner, record: &ChangeRecord) -> bool {
        self.applier.is_applied(owner, record, &self.document)
    }

    pub fn to_html(&self) -> String {
        self.document.to_html()
    }
}
