//! # Mutation Applier
//!
//! Maps change records onto document elements and back.
//!
//! ## Design
//!
//! - Every element the selector matches receives the change
//! - Before the first mutation of an element under a record, its original
//!   state is stored and the record's marker token is added to the element
//! - An element that already carries the token is skipped, so applying the
//!   same record twice never compounds
//! - Revert finds elements by scanning for the token, never by re-running
//!   the selector against a DOM that may have changed since
//! - Everything that can fail is checked before the first element is touched
//! - Markup is parsed against each target's context element (its own tag for
//!   `html` and child inserts, its parent's tag for sibling inserts)
//! - Nodes a revert leaves detached and unreferenced (replaced content,
//!   inserted nodes, unused parsed copies) are released back to the arena
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut applier = Applier::new(&EngineConfig::default());
//! let owner = Owner::new("exp", "b")?;
//! let record = ChangeRecord::text("#title", "Hello")?;
//!
//! let outcome = applier.apply(&owner, &record, &mut doc)?;
//! assert_eq!(outcome.applied_count, 1);
//!
//! applier.revert(&owner, &record, &mut doc);
//! ```

use crate::config::EngineConfig;
use crate::errors::{ApplyError, ApplyResult};
use crate::marker::{Markers, Owner};
use crate::originals::{OriginalState, OriginalStore, PriorAttribute};
use abkit_changes::{ChangeRecord, ChangeValue, ClassChange, Position};
use abkit_dom::{Document, DomResult, NodeId, SelectorList, StyleDeclarations};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, instrument, warn};

/// Result of applying one record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Elements mutated by this call
    pub applied_count: usize,
    /// Matched elements that already carried the record's marker
    pub skipped_count: usize,
    /// States captured by this call, in application order
    pub originals: Vec<OriginalState>,
}

/// Result of reverting one record (or every record of an owner)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RevertOutcome {
    pub reverted_count: usize,
    /// Markers found without a stored original state
    pub mismatches: usize,
}

impl RevertOutcome {
    pub fn merge(&mut self, other: RevertOutcome) {
        self.reverted_count += other.reverted_count;
        self.mismatches += other.mismatches;
    }
}

/// Payload prepared before any element is touched
enum Prepared<'a> {
    Text(&'a str),
    Html(Fragments),
    Style(Vec<(&'a str, &'a str)>, bool),
    Attribute(Vec<(&'a str, Option<&'a str>)>),
    Class(&'a ClassChange),
    Move(NodeId, Position),
    Insert(Fragments, Position),
}

/// Markup parsed once per distinct context element. The first target with a
/// context takes the parsed nodes, later ones get deep copies.
struct Fragments {
    parsed: Vec<ParsedFragment>,
}

struct ParsedFragment {
    context: String,
    nodes: Vec<NodeId>,
    taken: bool,
}

impl Fragments {
    fn parse<I>(doc: &mut Document, html: &str, contexts: I) -> ApplyResult<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed: Vec<ParsedFragment> = Vec::new();
        for context in contexts {
            if parsed.iter().any(|p| p.context == context) {
                continue;
            }
            let nodes = doc
                .parse_fragment_in(&context, html)
                .map_err(|e| ApplyError::Html(e.to_string()))?;
            parsed.push(ParsedFragment {
                context,
                nodes,
                taken: false,
            });
        }
        Ok(Self { parsed })
    }

    /// Nodes for one target whose context is `context`
    fn take(&mut self, doc: &mut Document, context: &str) -> Vec<NodeId> {
        let index = self
            .parsed
            .iter()
            .position(|p| p.context == context)
            .unwrap_or(0);
        let Some(fragment) = self.parsed.get_mut(index) else {
            return Vec::new();
        };
        if !fragment.taken {
            fragment.taken = true;
            return fragment.nodes.clone();
        }
        fragment
            .nodes
            .iter()
            .map(|&n| doc.clone_subtree(n))
            .collect()
    }

    /// Free parsed nodes no target took
    fn release_unused(self, doc: &mut Document) {
        for fragment in self.parsed.into_iter().filter(|p| !p.taken) {
            for node in fragment.nodes {
                doc.release(node);
            }
        }
    }
}

/// The sole writer of marker attributes, and owner of the original states
#[derive(Debug)]
pub struct Applier {
    markers: Markers,
    store: OriginalStore,
}

impl Applier {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            markers: Markers::new(&config.marker_prefix),
            store: OriginalStore::new(),
        }
    }

    pub fn markers(&self) -> &Markers {
        &self.markers
    }

    pub fn store(&self) -> &OriginalStore {
        &self.store
    }

    /// True if any connected element carries the record's token
    pub fn is_applied(&self, owner: &Owner, record: &ChangeRecord, doc: &Document) -> bool {
        let token = owner.token(record.id());
        doc.elements()
            .any(|id| self.markers.has_token(doc, id, &token))
    }

    /// Apply `record` to every element its selector matches
    #[instrument(
        skip_all,
        fields(owner = %owner, record = %record.id(), change_type = %record.change_type())
    )]
    pub fn apply(
        &mut self,
        owner: &Owner,
        record: &ChangeRecord,
        doc: &mut Document,
    ) -> ApplyResult<ApplyOutcome> {
        let mut outcome = ApplyOutcome::default();
        if !record.is_enabled() {
            debug!("Record disabled, not applying");
            return Ok(outcome);
        }

        let selector = SelectorList::parse(record.selector())
            .map_err(|e| ApplyError::selector(record.selector(), e))?;
        let token = owner.token(record.id());

        let mut targets = doc.select(&selector);
        if matches!(record.value(), ChangeValue::Insert(_)) {
            targets.retain(|id| !self.markers.is_created(doc, *id));
        }
        if targets.is_empty() {
            debug!(selector = %record.selector(), "Selector matched no elements");
            return Ok(outcome);
        }

        let (pending, marked): (Vec<NodeId>, Vec<NodeId>) = targets
            .into_iter()
            .partition(|id| !self.markers.has_token(doc, *id, &token));
        outcome.skipped_count = marked.len();
        if pending.is_empty() {
            debug!(skipped = outcome.skipped_count, "Record already applied");
            return Ok(outcome);
        }

        let Some(prepared) = self.prepare(record, &pending, doc)? else {
            return Ok(outcome);
        };

        let states = self.mutate(prepared, &pending, &token, doc)?;
        for (id, state) in states {
            self.mark(doc, id, &token, state.clone())?;
            outcome.originals.push(state);
            outcome.applied_count += 1;
        }

        debug!(
            applied = outcome.applied_count,
            skipped = outcome.skipped_count,
            "Applied change"
        );
        Ok(outcome)
    }

    /// Validate against the document and build what the mutation needs.
    /// `None` means there is nothing to do (a move target that is absent).
    fn prepare<'a>(
        &self,
        record: &'a ChangeRecord,
        pending: &[NodeId],
        doc: &mut Document,
    ) -> ApplyResult<Option<Prepared<'a>>> {
        let prepared = match record.value() {
            ChangeValue::Text(text) => Prepared::Text(text),

            ChangeValue::Html(html) => {
                let contexts: Vec<String> =
                    pending.iter().map(|&id| inner_context(&*doc, id)).collect();
                Prepared::Html(Fragments::parse(doc, html, contexts)?)
            }

            ChangeValue::Style(properties) => Prepared::Style(
                properties
                    .iter()
                    .map(|(p, v)| (p.as_str(), v.as_str()))
                    .collect(),
                record.is_important(),
            ),

            ChangeValue::Delete => Prepared::Style(vec![("display", "none")], true),

            ChangeValue::Attribute(attributes) => {
                if let Some(reserved) = attributes.keys().find(|n| self.markers.is_reserved(n)) {
                    return Err(ApplyError::ReservedAttribute(reserved.clone()));
                }
                Prepared::Attribute(
                    attributes
                        .iter()
                        .map(|(n, v)| (n.as_str(), v.as_deref()))
                        .collect(),
                )
            }

            ChangeValue::Class(change) => Prepared::Class(change),

            ChangeValue::Move(target) => {
                let found = doc
                    .query_selector(&target.target_selector)
                    .map_err(|e| match e {
                        abkit_dom::DomError::Selector(source) => {
                            ApplyError::selector(&target.target_selector, source)
                        }
                        other => ApplyError::Dom(other),
                    })?;
                let Some(found) = found else {
                    debug!(target = %target.target_selector, "Move target matched no element");
                    return Ok(None);
                };
                for &element in pending {
                    if doc.contains(element, found) {
                        return Err(ApplyError::InvalidMoveTarget {
                            element,
                            target: found,
                        });
                    }
                }
                let beside = matches!(target.position, Position::Before | Position::After);
                if beside && doc.parent(found).is_none() {
                    return Err(ApplyError::DetachedMoveTarget(found));
                }
                Prepared::Move(found, target.position)
            }

            ChangeValue::Insert(content) => {
                let contexts: Vec<String> = pending
                    .iter()
                    .map(|&id| insert_context(&*doc, id, content.position))
                    .collect();
                Prepared::Insert(
                    Fragments::parse(doc, &content.html, contexts)?,
                    content.position,
                )
            }
        };
        Ok(Some(prepared))
    }

    fn mutate(
        &self,
        prepared: Prepared<'_>,
        pending: &[NodeId],
        token: &str,
        doc: &mut Document,
    ) -> ApplyResult<Vec<(NodeId, OriginalState)>> {
        let mut states = Vec::with_capacity(pending.len());

        match prepared {
            Prepared::Text(text) => {
                for &id in pending {
                    let children = doc.set_text_content(id, text);
                    states.push((id, OriginalState::Content { children }));
                }
            }

            Prepared::Html(mut fragments) => {
                for &id in pending {
                    if !doc.is_connected(id) {
                        continue;
                    }
                    let context = inner_context(doc, id);
                    let nodes = fragments.take(doc, &context);
                    let children = doc.replace_children(id, nodes)?;
                    states.push((id, OriginalState::Content { children }));
                }
                fragments.release_unused(doc);
            }

            Prepared::Style(properties, important) => {
                for &id in pending {
                    let state = apply_style(doc, id, &properties, important)?;
                    states.push((id, state));
                }
            }

            Prepared::Attribute(attributes) => {
                for &id in pending {
                    let mut values = Vec::with_capacity(attributes.len());
                    for &(name, value) in &attributes {
                        let previous = doc
                            .attr_position(id, name)
                            .zip(doc.attr(id, name).map(str::to_string));
                        values.push(PriorAttribute {
                            name: name.to_string(),
                            previous,
                        });
                        doc.restore_attr(id, name, value)?;
                    }
                    states.push((id, OriginalState::Attribute { values }));
                }
            }

            Prepared::Class(change) => {
                for &id in pending {
                    let state = apply_class(doc, id, change)?;
                    states.push((id, state));
                }
            }

            Prepared::Move(target, position) => {
                let mut previous: Option<NodeId> = None;
                for &id in pending {
                    let (Some(parent), Some(index)) = (doc.parent(id), doc.index_in_parent(id))
                    else {
                        continue;
                    };
                    let next_sibling = doc.next_sibling(id);
                    move_element(doc, id, target, position, previous)?;
                    previous = Some(id);
                    states.push((
                        id,
                        OriginalState::Move {
                            parent,
                            index,
                            next_sibling,
                        },
                    ));
                }
            }

            Prepared::Insert(mut fragments, position) => {
                for &id in pending {
                    let Some(parent) = doc.parent(id) else {
                        continue;
                    };
                    let context = insert_context(doc, id, position);
                    let created = fragments.take(doc, &context);
                    for &node in &created {
                        if doc.is_element(node) {
                            doc.set_attr(node, self.markers.created_attr(), token)?;
                        }
                    }
                    insert_nodes(doc, id, parent, &created, position)?;
                    states.push((id, OriginalState::Insert { created }));
                }
                fragments.release_unused(doc);
            }
        }

        Ok(states)
    }

    fn mark(
        &mut self,
        doc: &mut Document,
        id: NodeId,
        token: &str,
        state: OriginalState,
    ) -> DomResult<()> {
        let has_tokens = self.markers.tokens(doc, id).next().is_some();
        let key = match doc.attr(id, self.markers.key_attr()) {
            Some(existing) if has_tokens => existing.to_string(),
            _ => id.index().to_string(),
        };
        doc.set_attr(id, self.markers.key_attr(), key.as_str())?;
        self.markers.add_token(doc, id, token)?;
        self.store.insert(token, &key, state);
        Ok(())
    }

    /// Revert `record` wherever its marker is present
    #[instrument(skip_all, fields(owner = %owner, record = %record.id()))]
    pub fn revert(&mut self, owner: &Owner, record: &ChangeRecord, doc: &mut Document) -> RevertOutcome {
        self.revert_tokens(&[owner.token(record.id())], doc)
    }

    /// Revert every change of `owner` still present in the document
    #[instrument(skip_all, fields(owner = %owner))]
    pub fn revert_owner(&mut self, owner: &Owner, doc: &mut Document) -> RevertOutcome {
        let prefix = owner.token_prefix();
        let mut tokens: BTreeSet<String> = self.markers.tokens_with_prefix(doc, &prefix);
        tokens.extend(self.store.tokens_with_prefix(&prefix));
        let tokens: Vec<String> = tokens.into_iter().collect();
        self.revert_tokens(&tokens, doc)
    }

    fn revert_tokens(&mut self, tokens: &[String], doc: &mut Document) -> RevertOutcome {
        let mut outcome = RevertOutcome::default();
        let mut restores = Vec::new();

        // Detached elements are scanned too: a newer change may have taken an
        // element out of the tree, and it comes back once that one is undone.
        let marked: Vec<(NodeId, &String)> = doc
            .arena_elements()
            .flat_map(|id| {
                let element_tokens: Vec<&str> = self.markers.tokens(doc, id).collect();
                tokens
                    .iter()
                    .filter(move |t| element_tokens.contains(&t.as_str()))
                    .map(move |t| (id, t))
            })
            .collect();

        for (id, token) in marked {
            let entry = doc
                .attr(id, self.markers.key_attr())
                .map(str::to_string)
                .and_then(|key| self.store.take(token, &key));

            match entry {
                Some((sequence, state)) => restores.push((sequence, id, token, state)),
                None => {
                    warn!(token = %token, element = ?id, "Marker without original state, removing marker");
                    if let Err(e) = self.markers.remove_token(doc, id, token) {
                        warn!(error = %e, "Failed to remove marker");
                    }
                    outcome.mismatches += 1;
                }
            }
        }

        // Newest first, so stacked changes unwind in reverse
        restores.sort_by(|a, b| b.0.cmp(&a.0));
        let mut displaced = Vec::new();
        for (_, id, token, state) in restores {
            match restore(doc, id, state) {
                Ok(nodes) => displaced.extend(nodes),
                Err(e) => {
                    warn!(token = %token, element = ?id, error = %e, "Failed to restore element")
                }
            }
            if let Err(e) = self.markers.remove_token(doc, id, token) {
                warn!(error = %e, "Failed to remove marker");
            }
            outcome.reverted_count += 1;
        }

        // States whose element lost its marker since apply
        let mut stale = 0;
        for token in tokens {
            for state in self.store.take_all(token) {
                match state {
                    OriginalState::Insert { created } => {
                        for &node in &created {
                            doc.detach(node);
                        }
                        displaced.extend(created);
                    }
                    OriginalState::Content { children } => displaced.extend(children),
                    _ => {}
                }
                stale += 1;
            }
        }
        if stale > 0 {
            debug!(stale, "Dropped original states without a marked element");
        }

        let released = self.release_unused(doc, displaced);
        if released > 0 {
            debug!(released, "Released detached nodes");
        }

        debug!(
            reverted = outcome.reverted_count,
            mismatches = outcome.mismatches,
            "Reverted change"
        );
        outcome
    }

    /// Release each detached subtree in `candidates` that no stored state
    /// refers to and that carries no marker
    fn release_unused(&self, doc: &mut Document, candidates: Vec<NodeId>) -> usize {
        if candidates.is_empty() {
            return 0;
        }
        let referenced: HashSet<NodeId> = self.store.referenced_nodes().collect();

        let mut released = 0;
        for node in candidates {
            if doc.node(node).is_none() || doc.parent(node).is_some() {
                continue;
            }
            let in_use = std::iter::once(node)
                .chain(doc.descendants(node))
                .any(|n| {
                    referenced.contains(&n)
                        || doc.has_attr(n, self.markers.change_attr())
                        || doc.has_attr(n, self.markers.key_attr())
                });
            if !in_use {
                released += doc.release(node);
            }
        }
        released
    }
}

/// Context element for markup that becomes the children of `id`
fn inner_context(doc: &Document, id: NodeId) -> String {
    doc.tag_name(id).unwrap_or("body").to_string()
}

/// Context element for markup inserted relative to `id`
fn insert_context(doc: &Document, id: NodeId, position: Position) -> String {
    match position {
        Position::FirstChild | Position::LastChild => inner_context(doc, id),
        Position::Before | Position::After => match doc.parent_element(id) {
            Some(parent) => inner_context(doc, parent),
            None => "body".to_string(),
        },
    }
}

fn apply_style(
    doc: &mut Document,
    id: NodeId,
    properties: &[(&str, &str)],
    important: bool,
) -> DomResult<OriginalState> {
    let attribute = doc.attr(id, "style").map(str::to_string);
    let mut declarations = StyleDeclarations::parse(attribute.as_deref().unwrap_or_default());

    let mut previous = Vec::with_capacity(properties.len());
    for &(property, value) in properties {
        previous.push((property.to_string(), declarations.get(property).cloned()));
        declarations.set(property, value, important);
    }

    let written = declarations.to_css_text();
    doc.set_attr(id, "style", written.as_str())?;

    Ok(OriginalState::Style {
        attribute,
        properties: previous,
        written,
    })
}

fn apply_class(doc: &mut Document, id: NodeId, change: &ClassChange) -> DomResult<OriginalState> {
    let attribute = doc.attr(id, "class").map(str::to_string);
    let before = doc.class_list(id);

    let mut classes = before.clone();
    for class in &change.add {
        if !classes.contains(class) {
            classes.push(class.clone());
        }
    }
    classes.retain(|c| !change.remove.contains(c));

    let added: Vec<String> = classes.iter().filter(|c| !before.contains(c)).cloned().collect();
    let removed: Vec<String> = before.iter().filter(|c| !classes.contains(c)).cloned().collect();

    let written = if added.is_empty() && removed.is_empty() {
        None
    } else {
        let value = classes.join(" ");
        doc.set_attr(id, "class", value.as_str())?;
        Some(value)
    };

    Ok(OriginalState::Class {
        attribute,
        added,
        removed,
        written,
    })
}

/// Several elements moved to one target keep their document order
fn move_element(
    doc: &mut Document,
    id: NodeId,
    target: NodeId,
    position: Position,
    previous: Option<NodeId>,
) -> DomResult<()> {
    match position {
        Position::Before => {
            let parent = doc.parent(target).ok_or(abkit_dom::DomError::NodeNotFound(target))?;
            doc.insert_before(parent, id, Some(target))
        }
        Position::After => {
            let anchor = previous.unwrap_or(target);
            let parent = doc.parent(anchor).ok_or(abkit_dom::DomError::NodeNotFound(anchor))?;
            let reference = doc.next_sibling(anchor);
            doc.insert_before(parent, id, reference)
        }
        Position::FirstChild => match previous {
            Some(prev) => {
                let reference = doc.next_sibling(prev);
                doc.insert_before(target, id, reference)
            }
            None => doc.insert_child(target, 0, id),
        },
        Position::LastChild => doc.append_child(target, id),
    }
}

fn insert_nodes(
    doc: &mut Document,
    anchor: NodeId,
    parent: NodeId,
    nodes: &[NodeId],
    position: Position,
) -> DomResult<()> {
    let (container, reference) = match position {
        Position::Before => (parent, Some(anchor)),
        Position::After => (parent, doc.next_sibling(anchor)),
        Position::FirstChild => (anchor, doc.children(anchor).first().copied()),
        Position::LastChild => (anchor, None),
    };
    for &node in nodes {
        doc.insert_before(container, node, reference)?;
    }
    Ok(())
}

/// Put `id` back the way `state` recorded it. Returns the nodes the restore
/// took out of the document.
fn restore(doc: &mut Document, id: NodeId, state: OriginalState) -> DomResult<Vec<NodeId>> {
    match state {
        OriginalState::Content { children } => {
            return doc.replace_children(id, children);
        }

        OriginalState::Style {
            attribute,
            properties,
            written,
        } => {
            let current = doc.attr(id, "style").map(str::to_string);
            if current.as_deref() == Some(written.as_str()) {
                doc.restore_attr(id, "style", attribute.as_deref())?;
            } else {
                let mut declarations =
                    StyleDeclarations::parse(current.as_deref().unwrap_or_default());
                for (property, previous) in properties.iter().rev() {
                    declarations.restore(property, previous.as_ref());
                }
                if declarations.is_empty() && attribute.is_none() {
                    doc.remove_attr(id, "style");
                } else {
                    doc.set_attr(id, "style", declarations.to_css_text())?;
                }
            }
        }

        OriginalState::Attribute { values } => {
            for prior in values.iter().rev() {
                match &prior.previous {
                    Some((position, value)) => {
                        doc.insert_attr(id, *position, &prior.name, value.as_str())?
                    }
                    None => {
                        doc.remove_attr(id, &prior.name);
                    }
                }
            }
        }

        OriginalState::Class {
            attribute,
            added,
            removed,
            written,
        } => {
            let Some(written) = written else {
                return Ok(Vec::new());
            };
            if doc.attr(id, "class") == Some(written.as_str()) {
                doc.restore_attr(id, "class", attribute.as_deref())?;
            } else {
                let mut classes = doc.class_list(id);
                classes.retain(|c| !added.contains(c));
                for class in removed {
                    if !classes.contains(&class) {
                        classes.push(class);
                    }
                }
                if classes.is_empty() && attribute.is_none() {
                    doc.remove_attr(id, "class");
                } else {
                    doc.set_attr(id, "class", classes.join(" "))?;
                }
            }
        }

        OriginalState::Move {
            parent,
            index,
            next_sibling,
        } => {
            let reference = next_sibling.filter(|n| doc.parent(*n) == Some(parent));
            match reference {
                Some(reference) => doc.insert_before(parent, id, Some(reference))?,
                None => doc.insert_child(parent, index, id)?,
            }
        }

        OriginalState::Insert { created } => {
            for &node in &created {
                doc.detach(node);
            }
            return Ok(created);
        }
    }
    Ok(Vec::new())
}
