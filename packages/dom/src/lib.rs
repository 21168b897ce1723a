//! # abkit DOM
//!
//! A small in-memory HTML document used as the live page the variant engine
//! mutates.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ html: HTML text ⇄ Document (html5ever)      │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ document: arena tree of nodes               │
//! │  - attributes, class list, inline style     │
//! │  - text / inner HTML replacement            │
//! │  - detach and reattach at exact positions   │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ selector: CSS selector parsing + matching   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Nodes are never freed. A detached node keeps its id and subtree so it can
//! be put back where it came from, which is what revertible mutations need.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use abkit_dom::Document;
//!
//! let mut doc = Document::parse("<h1 id=\"title\">Hi</h1>", "https://shop.test/")?;
//! let title = doc.query_selector("#title")?.unwrap();
//! doc.set_text_content(title, "Hello");
//! assert_eq!(doc.text_content(title), "Hello");
//! ```

mod document;
mod error;
mod html;
mod node;
mod selector;
mod style;

pub use document::{Descendants, Document};
pub use error::{DomError, DomResult, SelectorError};
pub use node::{Attribute, ElementData, Node, NodeData, NodeId};
pub use selector::{
    AttributeOperator, AttributeSelector, Combinator, ComplexSelector, CompoundSelector,
    NthExpression, PseudoClass, SelectorList,
};
pub use style::{Declaration, StyleDeclarations};
