//! JSON wire shape of a change record

use crate::errors::{ValidationError, ValidationResult};
use crate::record::{ChangeRecord, RecordId, Trigger};
use crate::value::{ChangeType, ChangeValue, ClassChange, InsertContent, MoveTarget, Position};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub selector: String,
    #[serde(rename = "type")]
    pub change_type: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<u64>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub important: bool,
    #[serde(default)]
    pub wait_for_element: bool,
}

impl TryFrom<RawChange> for ChangeRecord {
    type Error = ValidationError;

    fn try_from(raw: RawChange) -> ValidationResult<Self> {
        let change_type: ChangeType = raw.change_type.parse()?;
        let value = parse_value(change_type, raw.value)?;
        let trigger = match raw.trigger.as_deref() {
            Some(t) => Trigger::parse(t)?,
            None => Trigger::Immediate,
        };
        let id = match raw.id {
            Some(id) => RecordId::parse(id)?,
            None => RecordId::generate(),
        };

        Ok(
            ChangeRecord::from_parts(id, raw.selector, value, trigger, raw.created_at)?
                .with_enabled(raw.enabled)
                .with_important(raw.important)
                .with_wait_for_element(raw.wait_for_element),
        )
    }
}

impl From<ChangeRecord> for RawChange {
    fn from(record: ChangeRecord) -> Self {
        RawChange {
            id: Some(record.id().to_string()),
            selector: record.selector().to_string(),
            change_type: record.change_type().as_str().to_string(),
            value: value_to_json(record.value()),
            trigger: Some(record.trigger().as_str().to_string()),
            created_at: Some(record.created_at()),
            enabled: record.is_enabled(),
            important: record.is_important(),
            wait_for_element: record.waits_for_element(),
        }
    }
}

impl From<RawChange> for Value {
    fn from(raw: RawChange) -> Self {
        serde_json::to_value(raw).unwrap_or(Value::Null)
    }
}

fn value_to_json(value: &ChangeValue) -> Value {
    match value {
        ChangeValue::Text(s) | ChangeValue::Html(s) => Value::String(s.clone()),
        ChangeValue::Style(props) => Value::Object(
            props
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        ),
        ChangeValue::Attribute(attrs) => Value::Object(
            attrs
                .iter()
                .map(|(k, v)| (k.clone(), v.clone().map_or(Value::Null, Value::String)))
                .collect(),
        ),
        ChangeValue::Class(ClassChange { add, remove }) => json!({ "add": add, "remove": remove }),
        ChangeValue::Move(target) => json!({
            "targetSelector": target.target_selector,
            "position": target.position.as_str(),
        }),
        ChangeValue::Insert(content) => json!({
            "html": content.html,
            "position": content.position.as_str(),
        }),
        ChangeValue::Delete => Value::Null,
    }
}

fn parse_value(change_type: ChangeType, value: Value) -> ValidationResult<ChangeValue> {
    let invalid = |reason: &str| ValidationError::invalid_value(change_type, reason);

    match change_type {
        ChangeType::Text | ChangeType::Html => {
            let Value::String(s) = value else {
                return Err(invalid("expected a string"));
            };
            Ok(if change_type == ChangeType::Text {
                ChangeValue::Text(s)
            } else {
                ChangeValue::Html(s)
            })
        }

        ChangeType::Style => {
            let object = expect_object(value).ok_or_else(|| invalid("expected an object"))?;
            let mut properties = IndexMap::with_capacity(object.len());
            for (property, v) in object {
                let Value::String(v) = v else {
                    return Err(invalid(&format!("property '{}' must be a string", property)));
                };
                properties.insert(property, v);
            }
            Ok(ChangeValue::Style(properties))
        }

        ChangeType::Attribute => {
            let object = expect_object(value).ok_or_else(|| invalid("expected an object"))?;
            let mut attributes = IndexMap::with_capacity(object.len());
            for (name, v) in object {
                let v = match v {
                    Value::String(s) => Some(s),
                    Value::Null => None,
                    _ => {
                        return Err(invalid(&format!(
                            "attribute '{}' must be a string or null",
                            name
                        )))
                    }
                };
                attributes.insert(name, v);
            }
            Ok(ChangeValue::Attribute(attributes))
        }

        ChangeType::Class => {
            let mut object = expect_object(value).ok_or_else(|| invalid("expected an object"))?;
            let mut names = |key: &str| -> ValidationResult<Vec<String>> {
                match object.remove(key) {
                    None | Some(Value::Null) => Ok(Vec::new()),
                    Some(Value::Array(items)) => items
                        .into_iter()
                        .map(|item| match item {
                            Value::String(s) => Ok(s),
                            _ => Err(invalid(&format!("'{}' must list strings", key))),
                        })
                        .collect(),
                    Some(_) => Err(invalid(&format!("'{}' must be an array", key))),
                }
            };
            let add = names("add")?;
            let remove = names("remove")?;
            Ok(ChangeValue::Class(ClassChange { add, remove }))
        }

        ChangeType::Move => {
            let mut object = expect_object(value).ok_or_else(|| invalid("expected an object"))?;
            let target_selector = take_string(&mut object, "targetSelector")
                .ok_or_else(|| invalid("'targetSelector' is required"))?;
            let position = take_string(&mut object, "position")
                .ok_or_else(|| invalid("'position' is required"))?
                .parse::<Position>()?;
            Ok(ChangeValue::Move(MoveTarget {
                target_selector,
                position,
            }))
        }

        ChangeType::Insert => {
            let mut object = expect_object(value).ok_or_else(|| invalid("expected an object"))?;
            let html =
                take_string(&mut object, "html").ok_or_else(|| invalid("'html' is required"))?;
            let position = take_string(&mut object, "position")
                .ok_or_else(|| invalid("'position' is required"))?
                .parse::<Position>()?;
            Ok(ChangeValue::Insert(InsertContent { html, position }))
        }

        ChangeType::Delete => Ok(ChangeValue::Delete),
    }
}

fn expect_object(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn take_string(object: &mut Map<String, Value>, key: &str) -> Option<String> {
    match object.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: Value) -> ValidationResult<ChangeRecord> {
        ChangeRecord::from_json_value(value)
    }

    #[test]
    fn test_defaults_applied() {
        let r = record(json!({ "selector": "#t", "type": "text", "value": "Hi" })).unwrap();
        assert!(r.is_enabled());
        assert!(!r.is_important());
        assert!(!r.waits_for_element());
        assert_eq!(r.trigger(), Trigger::Immediate);
        assert_eq!(r.value(), &ChangeValue::Text("Hi".to_string()));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = record(json!({ "selector": "#t", "type": "javascript", "value": "x" }));
        assert_eq!(err.unwrap_err(), ValidationError::UnknownType("javascript".into()));
    }

    #[test]
    fn test_attribute_null_means_remove() {
        let r = record(json!({
            "selector": "a",
            "type": "attribute",
            "value": { "href": "/new", "target": null }
        }))
        .unwrap();
        let ChangeValue::Attribute(attrs) = r.value() else {
            panic!("expected attribute value");
        };
        assert_eq!(attrs["href"], Some("/new".to_string()));
        assert_eq!(attrs["target"], None);
    }

    #[test]
    fn test_move_requires_known_position() {
        let err = record(json!({
            "selector": "#a",
            "type": "move",
            "value": { "targetSelector": "#b", "position": "inside" }
        }));
        assert_eq!(err.unwrap_err(), ValidationError::UnknownPosition("inside".into()));
    }

    #[test]
    fn test_loaded_sequence_keeps_counter_ahead() {
        let loaded = record(json!({
            "selector": "#t", "type": "delete", "createdAt": 1_000_000
        }))
        .unwrap();
        let fresh = ChangeRecord::delete("#t").unwrap();
        assert!(fresh.created_at() > loaded.created_at());
    }

    #[test]
    fn test_wire_shape_preserved() {
        let original = json!({
            "id": "r1",
            "selector": ".cta",
            "type": "class",
            "value": { "add": ["big"], "remove": ["small"] },
            "trigger": "immediate",
            "createdAt": 7,
            "enabled": false,
            "important": false,
            "waitForElement": true
        });
        let r = record(original.clone()).unwrap();
        assert_eq!(r.to_json_value(), original);
    }
}
