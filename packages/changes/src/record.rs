//! # Change Record
//!
//! One declarative mutation: selector + type + value, plus the metadata the
//! engine needs (id, ordering, flags).

use crate::errors::{ValidationError, ValidationResult};
use crate::raw::RawChange;
use crate::value::{ChangeType, ChangeValue, ClassChange, InsertContent, MoveTarget, Position};
use abkit_dom::SelectorList;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_sequence() -> u64 {
    NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// Keep the counter ahead of sequence numbers loaded from payloads
pub(crate) fn observe_sequence(seen: u64) {
    NEXT_SEQUENCE.fetch_max(seen.saturating_add(1), Ordering::Relaxed);
}

/// Opaque record identifier, stable across undo/redo
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Fresh random id
    pub fn generate() -> Self {
        RecordId(uuid::Uuid::new_v4().to_string())
    }

    /// Accept an id from a stored payload
    pub fn parse(id: impl Into<String>) -> ValidationResult<Self> {
        let id = id.into();
        crate::variant::validate_owner_id("record", &id)?;
        Ok(RecordId(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// When a record is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// On load
    #[default]
    Immediate,
}

impl Trigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Trigger::Immediate => "immediate",
        }
    }

    pub(crate) fn parse(s: &str) -> ValidationResult<Self> {
        match s {
            "immediate" => Ok(Trigger::Immediate),
            other => Err(ValidationError::UnknownTrigger(other.to_string())),
        }
    }
}

pub(crate) fn validate_selector(selector: &str) -> ValidationResult<()> {
    if selector.trim().is_empty() {
        return Err(ValidationError::EmptySelector);
    }
    SelectorList::parse(selector).map_err(|source| ValidationError::InvalidSelector {
        selector: selector.to_string(),
        source,
    })?;
    Ok(())
}

/// A single DOM mutation intent. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawChange", into = "RawChange")]
pub struct ChangeRecord {
    id: RecordId,
    selector: String,
    value: ChangeValue,
    trigger: Trigger,
    created_at: u64,
    enabled: bool,
    important: bool,
    wait_for_element: bool,
}

impl ChangeRecord {
    /// Build a validated record with a fresh id and sequence number
    pub fn new(selector: impl Into<String>, value: ChangeValue) -> ValidationResult<Self> {
        let selector = selector.into();
        validate_selector(&selector)?;
        value.validate()?;

        Ok(Self {
            id: RecordId::generate(),
            selector,
            value,
            trigger: Trigger::Immediate,
            created_at: next_sequence(),
            enabled: true,
            important: false,
            wait_for_element: false,
        })
    }

    pub fn text(selector: impl Into<String>, text: impl Into<String>) -> ValidationResult<Self> {
        Self::new(selector, ChangeValue::Text(text.into()))
    }

    pub fn html(selector: impl Into<String>, html: impl Into<String>) -> ValidationResult<Self> {
        Self::new(selector, ChangeValue::Html(html.into()))
    }

    pub fn style<I, K, V>(selector: impl Into<String>, properties: I) -> ValidationResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let properties: IndexMap<String, String> = properties
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::new(selector, ChangeValue::Style(properties))
    }

    /// `None` values remove the attribute
    pub fn attribute<I, K>(selector: impl Into<String>, attributes: I) -> ValidationResult<Self>
    where
        I: IntoIterator<Item = (K, Option<String>)>,
        K: Into<String>,
    {
        let attributes: IndexMap<String, Option<String>> = attributes
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .collect();
        Self::new(selector, ChangeValue::Attribute(attributes))
    }

    pub fn class<A, R, S>(selector: impl Into<String>, add: A, remove: R) -> ValidationResult<Self>
    where
        A: IntoIterator<Item = S>,
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            selector,
            ChangeValue::Class(ClassChange {
                add: add.into_iter().map(Into::into).collect(),
                remove: remove.into_iter().map(Into::into).collect(),
            }),
        )
    }

    pub fn move_to(
        selector: impl Into<String>,
        target_selector: impl Into<String>,
        position: Position,
    ) -> ValidationResult<Self> {
        Self::new(
            selector,
            ChangeValue::Move(MoveTarget {
                target_selector: target_selector.into(),
                position,
            }),
        )
    }

    pub fn insert(
        selector: impl Into<String>,
        html: impl Into<String>,
        position: Position,
    ) -> ValidationResult<Self> {
        Self::new(
            selector,
            ChangeValue::Insert(InsertContent {
                html: html.into(),
                position,
            }),
        )
    }

    pub fn delete(selector: impl Into<String>) -> ValidationResult<Self> {
        Self::new(selector, ChangeValue::Delete)
    }

    /// Write style values with `!important` (style and delete only)
    pub fn with_important(mut self, important: bool) -> Self {
        self.important = important;
        self
    }

    /// Keep retrying when the selector matches nothing yet
    pub fn with_wait_for_element(mut self, wait: bool) -> Self {
        self.wait_for_element = wait;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = id;
        self
    }

    pub(crate) fn from_parts(
        id: RecordId,
        selector: String,
        value: ChangeValue,
        trigger: Trigger,
        created_at: Option<u64>,
    ) -> ValidationResult<Self> {
        validate_selector(&selector)?;
        value.validate()?;

        let created_at = match created_at {
            Some(seq) => {
                observe_sequence(seq);
                seq
            }
            None => next_sequence(),
        };

        Ok(Self {
            id,
            selector,
            value,
            trigger,
            created_at,
            enabled: true,
            important: false,
            wait_for_element: false,
        })
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn change_type(&self) -> ChangeType {
        self.value.change_type()
    }

    pub fn value(&self) -> &ChangeValue {
        &self.value
    }

    pub fn trigger(&self) -> Trigger {
        self.trigger
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_important(&self) -> bool {
        self.important
    }

    pub fn waits_for_element(&self) -> bool {
        self.wait_for_element
    }

    /// Fold a follow-up edit of the same selector into one record.
    ///
    /// Properties, attributes and class names from `next` win over this
    /// record's where both set them; the rest of this record is kept. The
    /// result takes `next`'s id and flags. `None` when the two edits can't
    /// be expressed as one record: different selectors or types, inserts,
    /// moves to a different target, style runs that differ in importance.
    pub fn merge(&self, next: &ChangeRecord) -> Option<ChangeRecord> {
        if self.selector != next.selector {
            return None;
        }

        let value = match (&self.value, &next.value) {
            (ChangeValue::Text(_), ChangeValue::Text(_))
            | (ChangeValue::Html(_), ChangeValue::Html(_))
            | (ChangeValue::Delete, ChangeValue::Delete) => next.value.clone(),
            (ChangeValue::Style(first), ChangeValue::Style(then))
                if self.important == next.important =>
            {
                let mut properties = first.clone();
                for (property, value) in then {
                    properties.insert(property.clone(), value.clone());
                }
                ChangeValue::Style(properties)
            }
            (ChangeValue::Attribute(first), ChangeValue::Attribute(then)) => {
                let mut attributes = first.clone();
                for (name, value) in then {
                    attributes.insert(name.clone(), value.clone());
                }
                ChangeValue::Attribute(attributes)
            }
            (ChangeValue::Class(first), ChangeValue::Class(then)) => {
                ChangeValue::Class(first.merge(then))
            }
            (ChangeValue::Move(first), ChangeValue::Move(then)) if first == then => {
                next.value.clone()
            }
            _ => return None,
        };

        value.validate().ok()?;
        Some(ChangeRecord {
            value,
            ..next.clone()
        })
    }

    /// Parse one record from a JSON value
    pub fn from_json_value(value: serde_json::Value) -> ValidationResult<Self> {
        let raw: RawChange = serde_json::from_value(value)?;
        Self::try_from(raw)
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::Value::from(RawChange::from(self.clone()))
    }
}
