use crate::errors::{ValidationError, ValidationResult};
use abkit_dom::StyleDeclarations;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of mutation a record performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Text,
    Html,
    Style,
    Attribute,
    Class,
    Move,
    Insert,
    Delete,
}

impl ChangeType {
    pub const ALL: [ChangeType; 8] = [
        ChangeType::Text,
        ChangeType::Html,
        ChangeType::Style,
        ChangeType::Attribute,
        ChangeType::Class,
        ChangeType::Move,
        ChangeType::Insert,
        ChangeType::Delete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ChangeType::Text => "text",
            ChangeType::Html => "html",
            ChangeType::Style => "style",
            ChangeType::Attribute => "attribute",
            ChangeType::Class => "class",
            ChangeType::Move => "move",
            ChangeType::Insert => "insert",
            ChangeType::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChangeType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownType(s.to_string()))
    }
}

/// Where a moved or inserted node lands relative to its reference element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Position {
    Before,
    After,
    FirstChild,
    LastChild,
}

impl Position {
    pub fn as_str(self) -> &'static str {
        match self {
            Position::Before => "before",
            Position::After => "after",
            Position::FirstChild => "firstChild",
            Position::LastChild => "lastChild",
        }
    }
}

impl FromStr for Position {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "before" => Ok(Position::Before),
            "after" => Ok(Position::After),
            "firstChild" => Ok(Position::FirstChild),
            "lastChild" => Ok(Position::LastChild),
            other => Err(ValidationError::UnknownPosition(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassChange {
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

impl ClassChange {
    /// Apply `then` on top of this change: a later add cancels an earlier
    /// remove of the same class and vice versa
    pub fn merge(&self, then: &ClassChange) -> ClassChange {
        let mut add: Vec<String> = self
            .add
            .iter()
            .filter(|c| !then.remove.contains(c))
            .cloned()
            .collect();
        let mut remove: Vec<String> = self
            .remove
            .iter()
            .filter(|c| !then.add.contains(c))
            .cloned()
            .collect();
        for class in &then.add {
            if !add.contains(class) {
                add.push(class.clone());
            }
        }
        for class in &then.remove {
            if !remove.contains(class) {
                remove.push(class.clone());
            }
        }
        ClassChange { add, remove }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveTarget {
    /// Reference element (first match wins)
    pub target_selector: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertContent {
    pub html: String,
    /// Relative to each element the record's selector matches
    pub position: Position,
}

/// Type-specific payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeValue {
    /// Replace text content
    Text(String),

    /// Replace inner HTML
    Html(String),

    /// Inline style properties (property → value)
    Style(IndexMap<String, String>),

    /// Attributes (name → value, `None` removes)
    Attribute(IndexMap<String, Option<String>>),

    Class(ClassChange),

    Move(MoveTarget),

    Insert(InsertContent),

    /// Reversible hide
    Delete,
}

impl ChangeValue {
    pub fn change_type(&self) -> ChangeType {
        match self {
            ChangeValue::Text(_) => ChangeType::Text,
            ChangeValue::Html(_) => ChangeType::Html,
            ChangeValue::Style(_) => ChangeType::Style,
            ChangeValue::Attribute(_) => ChangeType::Attribute,
            ChangeValue::Class(_) => ChangeType::Class,
            ChangeValue::Move(_) => ChangeType::Move,
            ChangeValue::Insert(_) => ChangeType::Insert,
            ChangeValue::Delete => ChangeType::Delete,
        }
    }

    /// Check structural constraints that do not need a document
    pub fn validate(&self) -> ValidationResult<()> {
        let change_type = self.change_type();
        let invalid = |reason: &str| Err(ValidationError::invalid_value(change_type, reason));

        match self {
            ChangeValue::Text(_) | ChangeValue::Html(_) | ChangeValue::Delete => Ok(()),

            ChangeValue::Style(properties) => {
                if properties.is_empty() {
                    return invalid("at least one property is required");
                }
                for (property, value) in properties {
                    if property.trim().is_empty() {
                        return invalid("property names must be non-empty");
                    }
                    if property.contains([':', ';']) {
                        return invalid(&format!("property '{}' contains ':' or ';'", property));
                    }
                    if value.trim().is_empty() {
                        return invalid(&format!("property '{}' has an empty value", property));
                    }
                    if !StyleDeclarations::is_single_value(value) {
                        return invalid(&format!(
                            "value of '{}' contains ';' outside quotes or parentheses",
                            property
                        ));
                    }
                }
                Ok(())
            }

            ChangeValue::Attribute(attributes) => {
                if attributes.is_empty() {
                    return invalid("at least one attribute is required");
                }
                for name in attributes.keys() {
                    if !is_valid_attribute_name(name) {
                        return invalid(&format!("'{}' is not a valid attribute name", name));
                    }
                }
                Ok(())
            }

            ChangeValue::Class(ClassChange { add, remove }) => {
                if add.is_empty() && remove.is_empty() {
                    return invalid("'add' or 'remove' must list at least one class");
                }
                for class in add.iter().chain(remove) {
                    if class.is_empty() || class.chars().any(char::is_whitespace) {
                        return invalid(&format!("'{}' is not a valid class name", class));
                    }
                }
                Ok(())
            }

            ChangeValue::Move(target) => {
                crate::record::validate_selector(&target.target_selector)?;
                Ok(())
            }

            ChangeValue::Insert(content) => {
                if content.html.trim().is_empty() {
                    return invalid("'html' must be non-empty");
                }
                Ok(())
            }
        }
    }
}

fn is_valid_attribute_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '"' | '\'' | '>' | '/' | '='))
}
