//! # Original State Store
//!
//! What an element looked like before a change touched it, indexed by
//! `(marker token, element key)`. The key is the value of the element's key
//! attribute, so the index survives the element being moved around and never
//! holds an element reference as its identity.

use abkit_dom::{Declaration, NodeId};
use std::collections::HashMap;

/// Value of the `{prefix}-key` attribute
pub type ElementKey = String;

/// Pre-change state of one element under one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginalState {
    /// `text` / `html`: the original children, detached but kept alive
    Content { children: Vec<NodeId> },

    /// `style` / `delete`
    Style {
        /// The `style` attribute before apply (`None` if absent)
        attribute: Option<String>,
        /// Each touched property and its prior declaration
        properties: Vec<(String, Option<Declaration>)>,
        /// The attribute value apply wrote
        written: String,
    },

    /// `attribute`: each touched attribute, in the order apply wrote them
    Attribute { values: Vec<PriorAttribute> },

    /// `class`
    Class {
        attribute: Option<String>,
        added: Vec<String>,
        removed: Vec<String>,
        /// `None` when apply did not need to change anything
        written: Option<String>,
    },

    /// `move`: where the element was
    Move {
        parent: NodeId,
        index: usize,
        next_sibling: Option<NodeId>,
    },

    /// `insert`: the nodes the insert created
    Insert { created: Vec<NodeId> },
}

/// An attribute as it was before an attribute change wrote it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorAttribute {
    pub name: String,
    /// Value and position in the attribute list, `None` if absent
    pub previous: Option<(usize, String)>,
}

#[derive(Debug, Clone)]
struct StoredState {
    /// Application order, used to revert newest first
    sequence: u64,
    state: OriginalState,
}

#[derive(Debug, Default)]
pub struct OriginalStore {
    entries: HashMap<(String, ElementKey), StoredState>,
    next_sequence: u64,
}

impl OriginalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token: &str, key: &str, state: OriginalState) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.insert(
            (token.to_string(), key.to_string()),
            StoredState { sequence, state },
        );
    }

    pub fn get(&self, token: &str, key: &str) -> Option<&OriginalState> {
        self.entries
            .get(&(token.to_string(), key.to_string()))
            .map(|s| &s.state)
    }

    pub fn contains(&self, token: &str, key: &str) -> bool {
        self.get(token, key).is_some()
    }

    /// Remove an entry, returning it with its application sequence
    pub(crate) fn take(&mut self, token: &str, key: &str) -> Option<(u64, OriginalState)> {
        self.entries
            .remove(&(token.to_string(), key.to_string()))
            .map(|s| (s.sequence, s.state))
    }

    /// Remove every remaining entry of `token`
    pub(crate) fn take_all(&mut self, token: &str) -> Vec<OriginalState> {
        let keys: Vec<(String, ElementKey)> = self
            .entries
            .keys()
            .filter(|(t, _)| t == token)
            .cloned()
            .collect();
        keys.into_iter()
            .filter_map(|k| self.entries.remove(&k))
            .map(|s| s.state)
            .collect()
    }

    /// Distinct tokens with entries, restricted to `prefix`
    pub fn tokens_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut tokens: Vec<String> = self
            .entries
            .keys()
            .filter(|(t, _)| t.starts_with(prefix))
            .map(|(t, _)| t.clone())
            .collect();
        tokens.sort();
        tokens.dedup();
        tokens
    }

    /// Every node an entry refers to (kept-aside children, move anchors,
    /// inserted nodes)
    pub(crate) fn referenced_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entries
            .values()
            .flat_map(|stored| match &stored.state {
                OriginalState::Content { children } => children.clone(),
                OriginalState::Insert { created } => created.clone(),
                OriginalState::Move {
                    parent,
                    next_sibling,
                    ..
                } => std::iter::once(*parent).chain(*next_sibling).collect(),
                _ => Vec::new(),
            })
    }

    /// Entries held for `token`
    pub fn count_for(&self, token: &str) -> usize {
        self.entries.keys().filter(|(t, _)| t == token).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_keyed_by_token_and_key() {
        let mut store = OriginalStore::new();
        store.insert("e/v/1", "k1", OriginalState::Insert { created: vec![] });
        store.insert("e/v/1", "k2", OriginalState::Insert { created: vec![] });
        store.insert("e/v/2", "k1", OriginalState::Insert { created: vec![] });

        assert_eq!(store.len(), 3);
        assert_eq!(store.count_for("e/v/1"), 2);
        assert_eq!(store.tokens_with_prefix("e/v/"), vec!["e/v/1", "e/v/2"]);

        let (first, _) = store.take("e/v/1", "k1").unwrap();
        assert_eq!(first, 0);
        assert!(!store.contains("e/v/1", "k1"));
        assert!(store.contains("e/v/2", "k1"));

        assert_eq!(store.take_all("e/v/1").len(), 1);
        assert_eq!(store.len(), 1);
    }
}
