//! # abkit Editor
//!
//! Core change engine: applies change records to a page, reverts them, and
//! keeps the undo history of an edit session.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ changes: ChangeRecord, VariantChangeSet     │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: session + history + applier         │
//! │  - Apply/revert records with markers        │
//! │  - Original state keyed by marker + key     │
//! │  - Linear undo/redo with squashing          │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ dom: Document (the page being edited)       │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Markers are the source of truth**: revert follows the marker tokens
//!    on the page, not an in-memory list of touched elements
//! 2. **Idempotent apply**: an element already carrying a record's token is
//!    never mutated again by that record
//! 3. **Reversible**: every mutation, delete included, can be undone exactly
//! 4. **Explicit sessions**: no ambient editor state
//!
//! ## Usage
//!
//! ```rust,ignore
//! use abkit_editor::{EditSession, EngineConfig, Owner, Page};
//! use abkit_changes::ChangeRecord;
//!
//! let config = EngineConfig::default();
//! let mut page = Page::parse(html, "https://shop.test/", &config)?;
//! let mut session = EditSession::new("s1", Owner::new("exp", "b")?, &config)?;
//!
//! session.record(ChangeRecord::text("#title", "Hello")?, &mut page)?;
//! session.undo(&mut page);
//! session.redo(&mut page)?;
//! ```

mod applier;
mod config;
mod errors;
mod history;
mod marker;
mod originals;
mod page;
mod session;

pub use applier::{Applier, ApplyOutcome, RevertOutcome};
pub use config::{EngineConfig, DEFAULT_MARKER_PREFIX, DEFAULT_MAX_HISTORY};
pub use errors::{ApplyError, ApplyResult, EditorError, EditorResult};
pub use history::{History, HistoryEntry};
pub use marker::{Markers, Owner};
pub use originals::{ElementKey, OriginalState, OriginalStore, PriorAttribute};
pub use page::Page;
pub use session::EditSession;
