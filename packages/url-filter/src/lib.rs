//! # URL Filters
//!
//! Decides whether a variant's changes are in scope for a page location.
//!
//! ## Evaluation
//!
//! 1. Extract the part of the URL named by [`MatchType`]
//! 2. Any matching `exclude` pattern → no match
//! 3. Empty `include` → match
//! 4. Otherwise match iff some `include` pattern matches
//!
//! Patterns are globs (`*`, `?`) in [`FilterMode::Simple`] and raw regular
//! expressions in [`FilterMode::Regex`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use abkit_url_filter::{matches, UrlFilter};
//!
//! let filter = UrlFilter::include(["/products/*"]);
//! assert!(matches(&filter, "https://shop.test/products/123"));
//! assert!(!matches(&filter, "https://shop.test/checkout"));
//! ```

mod error;
mod filter;
mod matcher;

pub use error::FilterError;
pub use filter::{FilterMode, MatchType, UrlFilter};
pub use matcher::{extract, glob_to_regex, matches, CompiledFilter};
