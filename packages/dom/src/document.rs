//! # Document
//!
//! Arena-backed node tree.
//!
//! ## Design
//!
//! - Every node lives in `nodes` and is addressed by [`NodeId`]
//! - Parent/child links are plain ids; a node has at most one parent
//! - Detaching a node only unlinks it, so its id stays valid until the
//!   owner of the detached subtree hands it back with [`Document::release`]
//! - Released slots are reused by the next created nodes
//! - Only nodes reachable from the root are "connected"; queries never
//!   return detached nodes

use crate::error::{DomError, DomResult};
use crate::node::{ElementData, Node, NodeData, NodeId};
use crate::selector::SelectorList;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    nodes: Vec<Node>,
    /// Released slots, reused lowest first
    free: BTreeSet<NodeId>,
    url: String,
}

impl Document {
    /// Create an empty document at `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            nodes: vec![Node::new(NodeData::Document)],
            free: BTreeSet::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Update the location (client-side navigation does not rebuild the tree)
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Number of live nodes, detached ones included
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 1
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        if let Some(id) = self.free.pop_first() {
            if let Some(slot) = self.nodes.get_mut(id.index()) {
                *slot = Node::new(data);
                return id;
            }
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(data));
        id
    }

    /// Free a detached subtree so its slots can be reused.
    ///
    /// Does nothing (returns 0) for the root, for attached nodes and for
    /// nodes already released. Ids inside the subtree must not be used
    /// afterwards. Returns the number of nodes freed.
    pub fn release(&mut self, id: NodeId) -> usize {
        if id == NodeId::ROOT
            || self.free.contains(&id)
            || self.node(id).map_or(true, |n| n.parent.is_some())
        {
            return 0;
        }

        let mut stack = vec![id];
        let mut released = 0;
        while let Some(next) = stack.pop() {
            let Some(node) = self.nodes.get_mut(next.index()) else {
                continue;
            };
            stack.append(&mut node.children);
            *node = Node::new(NodeData::Text(String::new()));
            self.free.insert(next);
            released += 1;
        }
        released
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element(ElementData::new(tag)))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeData::Text(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeData::Comment(text.into()))
    }

    pub fn create_doctype(&mut self, name: impl Into<String>) -> NodeId {
        self.push(NodeData::Doctype { name: name.into() })
    }

    // ------------------------------------------------------------------
    // Tree structure
    // ------------------------------------------------------------------

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        self.children(parent).get(index + 1).copied()
    }

    /// Nearest ancestor that is an element
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|p| self.is_element(*p))
    }

    pub fn previous_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        self.children(parent)[..index]
            .iter()
            .rev()
            .copied()
            .find(|c| self.is_element(*c))
    }

    /// Element siblings of `id` (including `id`) in document order
    pub fn element_siblings(&self, id: NodeId) -> Vec<NodeId> {
        match self.parent(id) {
            Some(parent) => self
                .children(parent)
                .iter()
                .copied()
                .filter(|c| self.is_element(*c))
                .collect(),
            None => vec![id],
        }
    }

    /// True if `node` is `ancestor` or one of its descendants
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// True if the node is reachable from the document root
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.contains(NodeId::ROOT, id)
    }

    /// Unlink a node from its parent, returning where it was
    pub fn detach(&mut self, id: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        if let Some(p) = self.node_mut(parent) {
            p.children.remove(index);
        }
        if let Some(n) = self.node_mut(id) {
            n.parent = None;
        }
        Some((parent, index))
    }

    fn check_insert(&self, parent: NodeId, child: NodeId) -> DomResult<()> {
        if self.node(parent).is_none() {
            return Err(DomError::NodeNotFound(parent));
        }
        if self.node(child).is_none() || child == NodeId::ROOT {
            return Err(DomError::NodeNotFound(child));
        }
        if self.contains(child, parent) {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<()> {
        let len = self.children(parent).len();
        self.insert_child(parent, len, child)
    }

    /// Insert `child` at `index` among `parent`'s children (clamped).
    /// The index is interpreted after `child` has been detached.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> DomResult<()> {
        self.check_insert(parent, child)?;
        self.detach(child);

        let Some(p) = self.node_mut(parent) else {
            return Err(DomError::NodeNotFound(parent));
        };
        let index = index.min(p.children.len());
        p.children.insert(index, child);
        if let Some(c) = self.node_mut(child) {
            c.parent = Some(parent);
        }
        Ok(())
    }

    /// Insert `child` before `reference`, or append when `reference` is `None`
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> DomResult<()> {
        self.check_insert(parent, child)?;
        if reference == Some(child) {
            return Ok(());
        }
        self.detach(child);

        let index = match reference {
            Some(r) => self
                .children(parent)
                .iter()
                .position(|c| *c == r)
                .ok_or(DomError::NodeNotFound(r))?,
            None => self.children(parent).len(),
        };
        self.insert_child(parent, index, child)
    }

    /// Detach every child and return them in order
    pub fn take_children(&mut self, id: NodeId) -> Vec<NodeId> {
        let children = match self.node_mut(id) {
            Some(n) => std::mem::take(&mut n.children),
            None => return Vec::new(),
        };
        for child in &children {
            if let Some(c) = self.node_mut(*child) {
                c.parent = None;
            }
        }
        children
    }

    /// Replace all children, returning the previous ones (detached)
    pub fn replace_children(&mut self, id: NodeId, children: Vec<NodeId>) -> DomResult<Vec<NodeId>> {
        if self.node(id).is_none() {
            return Err(DomError::NodeNotFound(id));
        }
        for child in &children {
            self.check_insert(id, *child)?;
        }
        let previous = self.take_children(id);
        for child in children {
            self.append_child(id, child)?;
        }
        Ok(previous)
    }

    /// Deep copy of a subtree; the copy is detached
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let data = match self.node(id) {
            Some(n) => n.data.clone(),
            None => return id,
        };
        let copy = self.push(data);
        let children = self.children(id).to_vec();
        for child in children {
            let child_copy = self.clone_subtree(child);
            // `copy` is fresh and detached, so this cannot form a cycle.
            let _ = self.append_child(copy, child_copy);
        }
        copy
    }

    /// Pre-order traversal of the descendants of `id` (excluding `id`)
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.children(id).to_vec();
        stack.reverse();
        Descendants { doc: self, stack }
    }

    /// Every connected element in document order
    pub fn elements(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.descendants(NodeId::ROOT).filter(|id| self.is_element(*id))
    }

    /// Every element in the arena, detached ones included, in creation order
    pub fn arena_elements(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32)
            .map(NodeId)
            .filter(|id| self.is_element(*id))
    }

    // ------------------------------------------------------------------
    // Elements and attributes
    // ------------------------------------------------------------------

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.node(id).map(|n| &n.data), Some(NodeData::Element(_)))
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.node(id)?.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.node_mut(id)?.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag.as_str())
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|e| e.attr(name))
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.element(id).is_some_and(|e| e.has_attr(name))
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) -> DomResult<()> {
        let elem = self.element_mut(id).ok_or(DomError::NotAnElement(id))?;
        elem.set_attr(name, value);
        Ok(())
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Option<String> {
        self.element_mut(id).and_then(|e| e.remove_attr(name))
    }

    pub fn attr_position(&self, id: NodeId, name: &str) -> Option<usize> {
        self.element(id).and_then(|e| e.attr_position(name))
    }

    /// Re-add an attribute at the position it had before it was removed
    pub fn insert_attr(
        &mut self,
        id: NodeId,
        index: usize,
        name: &str,
        value: impl Into<String>,
    ) -> DomResult<()> {
        let elem = self.element_mut(id).ok_or(DomError::NotAnElement(id))?;
        elem.insert_attr(index, name, value);
        Ok(())
    }

    /// Set or remove an attribute in one call
    pub fn restore_attr(&mut self, id: NodeId, name: &str, value: Option<&str>) -> DomResult<()> {
        match value {
            Some(v) => self.set_attr(id, name, v),
            None => {
                self.remove_attr(id, name);
                Ok(())
            }
        }
    }

    pub fn class_list(&self, id: NodeId) -> Vec<String> {
        self.element(id)
            .map(|e| e.classes().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id).is_some_and(|e| e.has_class(class))
    }

    // ------------------------------------------------------------------
    // Text
    // ------------------------------------------------------------------

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(Node {
            data: NodeData::Text(t),
            ..
        }) = self.node(id)
        {
            return t.clone();
        }
        let mut out = String::new();
        for desc in self.descendants(id) {
            if let Some(Node {
                data: NodeData::Text(t),
                ..
            }) = self.node(desc)
            {
                out.push_str(t);
            }
        }
        out
    }

    /// Replace all children with a single text node (none for an empty
    /// string), returning the previous children detached
    pub fn set_text_content(&mut self, id: NodeId, text: &str) -> Vec<NodeId> {
        if let Some(Node {
            data: NodeData::Text(t),
            ..
        }) = self.node_mut(id)
        {
            *t = text.to_string();
            return Vec::new();
        }
        let previous = self.take_children(id);
        if !text.is_empty() {
            let text_node = self.create_text(text);
            // Fresh detached node under an existing parent.
            let _ = self.append_child(id, text_node);
        }
        previous
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// All connected elements matching `selector`, in document order
    pub fn query_selector_all(&self, selector: &str) -> DomResult<Vec<NodeId>> {
        let list = SelectorList::parse(selector)?;
        Ok(self.select(&list))
    }

    pub fn query_selector(&self, selector: &str) -> DomResult<Option<NodeId>> {
        let list = SelectorList::parse(selector)?;
        Ok(self.elements().find(|id| list.matches(self, *id)))
    }

    pub fn select(&self, selector: &SelectorList) -> Vec<NodeId> {
        self.elements()
            .filter(|id| selector.matches(self, *id))
            .collect()
    }

    pub fn get_element_by_id(&self, element_id: &str) -> Option<NodeId> {
        self.elements()
            .find(|id| self.element(*id).and_then(|e| e.id()) == Some(element_id))
    }

    pub fn body(&self) -> Option<NodeId> {
        self.elements().find(|id| self.tag_name(*id) == Some("body"))
    }
}

/// Pre-order iterator returned by [`Document::descendants`]
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.doc.children(id).iter().rev().copied());
        Some(id)
    }
}
