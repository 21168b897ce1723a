//! # Change Records
//!
//! The serializable unit of one DOM mutation intent, and the per-variant set
//! of them.
//!
//! ## Design
//!
//! - A [`ChangeRecord`] is immutable once built; editing produces a new record
//! - Every constructor validates its payload; there is no unchecked path
//! - The JSON wire format goes through the same validation, so an unknown
//!   `type` is an error rather than a silently dropped mutation
//! - Nothing here touches a document
//!
//! ## Wire format
//!
//! ```json
//! {
//!   "id": "4f1c…",
//!   "selector": ".price",
//!   "type": "style",
//!   "value": { "color": "red" },
//!   "trigger": "immediate",
//!   "createdAt": 12,
//!   "enabled": true,
//!   "important": false,
//!   "waitForElement": false
//! }
//! ```

mod errors;
mod raw;
mod record;
mod value;
mod variant;

pub use errors::{ValidationError, ValidationResult};
pub use record::{ChangeRecord, RecordId, Trigger};
pub use value::{ChangeType, ChangeValue, ClassChange, InsertContent, MoveTarget, Position};
pub use variant::{validate_owner_id, VariantChangeSet};

pub use abkit_url_filter::UrlFilter;
