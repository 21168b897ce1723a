//! # Change Markers
//!
//! The only on-page artifact the engine leaves behind. Three attributes,
//! all sharing the configured prefix:
//!
//! - `{prefix}-change`: whitespace-separated tokens
//!   `experiment/variant/record`, one per active change on the element
//! - `{prefix}-key`: a generated key indexing the original-state store
//! - `{prefix}-created`: the token of the insert that created the element
//!
//! Nothing outside the applier writes these.

use abkit_changes::{validate_owner_id, RecordId, ValidationResult};
use abkit_dom::{Document, DomResult, NodeId};
use std::collections::BTreeSet;
use std::fmt;

/// The experiment/variant pair a change belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Owner {
    pub experiment_id: String,
    pub variant_id: String,
}

impl Owner {
    pub fn new(
        experiment_id: impl Into<String>,
        variant_id: impl Into<String>,
    ) -> ValidationResult<Self> {
        let experiment_id = experiment_id.into();
        let variant_id = variant_id.into();
        validate_owner_id("experiment", &experiment_id)?;
        validate_owner_id("variant", &variant_id)?;
        Ok(Self {
            experiment_id,
            variant_id,
        })
    }

    /// Marker token for one record of this owner
    pub fn token(&self, record: &RecordId) -> String {
        format!("{}/{}/{}", self.experiment_id, self.variant_id, record)
    }

    /// Prefix shared by every token of this owner
    pub fn token_prefix(&self) -> String {
        format!("{}/{}/", self.experiment_id, self.variant_id)
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.experiment_id, self.variant_id)
    }
}

/// Marker attribute names derived from a prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    prefix: String,
    change: String,
    key: String,
    created: String,
}

impl Markers {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: format!("{}-", prefix),
            change: format!("{}-change", prefix),
            key: format!("{}-key", prefix),
            created: format!("{}-created", prefix),
        }
    }

    pub fn change_attr(&self) -> &str {
        &self.change
    }

    pub fn key_attr(&self) -> &str {
        &self.key
    }

    pub fn created_attr(&self) -> &str {
        &self.created
    }

    /// Attribute changes must not touch anything under the marker prefix
    pub fn is_reserved(&self, attribute: &str) -> bool {
        attribute.to_ascii_lowercase().starts_with(&self.prefix)
    }

    pub fn tokens<'a>(&self, doc: &'a Document, id: NodeId) -> impl Iterator<Item = &'a str> {
        doc.attr(id, &self.change)
            .unwrap_or_default()
            .split_ascii_whitespace()
    }

    pub fn has_token(&self, doc: &Document, id: NodeId, token: &str) -> bool {
        self.tokens(doc, id).any(|t| t == token)
    }

    pub fn add_token(&self, doc: &mut Document, id: NodeId, token: &str) -> DomResult<()> {
        if self.has_token(doc, id, token) {
            return Ok(());
        }
        let value = match doc.attr(id, &self.change) {
            Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), token),
            _ => token.to_string(),
        };
        doc.set_attr(id, &self.change, value)
    }

    /// Remove `token`; once no token is left the key attribute goes too
    pub fn remove_token(&self, doc: &mut Document, id: NodeId, token: &str) -> DomResult<()> {
        let remaining: Vec<&str> = self.tokens(doc, id).filter(|t| *t != token).collect();
        if remaining.is_empty() {
            doc.remove_attr(id, &self.change);
            doc.remove_attr(id, &self.key);
            return Ok(());
        }
        let value = remaining.join(" ");
        doc.set_attr(id, &self.change, value)
    }

    /// Connected elements carrying `token`, in document order
    pub fn find(&self, doc: &Document, token: &str) -> Vec<NodeId> {
        doc.elements()
            .filter(|id| self.has_token(doc, *id, token))
            .collect()
    }

    /// Every distinct token starting with `prefix`, detached elements included
    pub fn tokens_with_prefix(&self, doc: &Document, prefix: &str) -> BTreeSet<String> {
        doc.arena_elements()
            .flat_map(|id| self.tokens(doc, id))
            .filter(|t| t.starts_with(prefix))
            .map(str::to_string)
            .collect()
    }

    pub fn is_created(&self, doc: &Document, id: NodeId) -> bool {
        doc.has_attr(id, &self.created)
    }

    /// True if any marker attribute is left anywhere in the document
    pub fn any_present(&self, doc: &Document) -> bool {
        doc.elements().any(|id| {
            doc.has_attr(id, &self.change)
                || doc.has_attr(id, &self.key)
                || doc.has_attr(id, &self.created)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> (Document, NodeId) {
        let doc = Document::parse(r#"<p id="p">x</p>"#, "https://x/").unwrap();
        let p = doc.get_element_by_id("p").unwrap();
        (doc, p)
    }

    #[test]
    fn test_tokens_accumulate_and_clear() {
        let markers = Markers::new("data-abkit");
        let (mut doc, p) = doc();

        markers.add_token(&mut doc, p, "e/v/1").unwrap();
        markers.add_token(&mut doc, p, "e/v/2").unwrap();
        markers.add_token(&mut doc, p, "e/v/1").unwrap();
        doc.set_attr(p, markers.key_attr(), "1").unwrap();
        assert_eq!(doc.attr(p, "data-abkit-change"), Some("e/v/1 e/v/2"));

        markers.remove_token(&mut doc, p, "e/v/1").unwrap();
        assert_eq!(doc.attr(p, "data-abkit-change"), Some("e/v/2"));
        assert!(doc.has_attr(p, "data-abkit-key"));

        markers.remove_token(&mut doc, p, "e/v/2").unwrap();
        assert!(!markers.any_present(&doc));
    }

    #[test]
    fn test_reserved_attributes() {
        let markers = Markers::new("data-abkit");
        assert!(markers.is_reserved("data-abkit-change"));
        assert!(markers.is_reserved("DATA-ABKIT-key"));
        assert!(!markers.is_reserved("data-abkitten"));
        assert!(!markers.is_reserved("data-testid"));
    }

    #[test]
    fn test_owner_token() {
        let owner = Owner::new("exp", "b").unwrap();
        let id = RecordId::parse("r1").unwrap();
        assert_eq!(owner.token(&id), "exp/b/r1");
        assert!(owner.token(&id).starts_with(&owner.token_prefix()));
        assert!(Owner::new("e/x", "b").is_err());
    }
}
