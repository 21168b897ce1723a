//! # abkit Preview
//!
//! Turns whole variants on and off on a live page, and keeps them in step
//! with client-side navigation.
//!
//! ## Architecture
//!
//! ```text
//! NavigationEvent (pushState, replaceState, popstate, hashchange)
//!          ↓
//! ┌─────────────────────────────────────────────┐
//! │ NavigationWatcher                           │
//! │  - URL filter per variant (compiled, cached)│
//! │  - suspend / resume transitions             │
//! └─────────────────────────────────────────────┘
//!          ↓
//! ┌─────────────────────────────────────────────┐
//! │ PreviewController                           │
//! │  - meant-to-be-active vs applied            │
//! │  - per-record reports, pending retries      │
//! └─────────────────────────────────────────────┘
//!          ↓
//!    abkit_editor::Page
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use abkit_preview::{NavigationEvent, NavigationWatcher, PreviewController};
//!
//! let mut controller = PreviewController::new();
//! let mut watcher = NavigationWatcher::new();
//!
//! controller.activate(&set, &mut page)?;
//! watcher.sync(&mut controller, &mut page);
//! watcher.handle(&NavigationEvent::push_state("/checkout"), &mut controller, &mut page);
//! ```

mod controller;
mod errors;
mod navigation;
mod report;

pub use controller::PreviewController;
pub use errors::{PreviewError, PreviewResult};
pub use navigation::{NavigationEvent, NavigationKind, NavigationWatcher, Transition, TransitionKind};
pub use report::{PreviewReport, RecordReport, RecordStatus};
