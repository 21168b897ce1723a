//! Loading stored variant payloads

use abkit_changes::{
    ChangeRecord, ChangeType, ChangeValue, Position, ValidationError, VariantChangeSet,
};
use abkit_url_filter::MatchType;

const PAYLOAD: &str = r##"{
    "experimentId": "checkout-redesign",
    "variantId": "b",
    "urlFilter": { "include": ["/products/*"], "matchType": "path" },
    "changes": [
        { "id": "c1", "selector": "#title", "type": "text", "value": "Buy now" },
        { "id": "c2", "selector": ".price", "type": "style",
          "value": { "color": "red", "font-weight": "bold" }, "important": true },
        { "id": "c3", "selector": "#promo", "type": "insert",
          "value": { "html": "<p>Free shipping</p>", "position": "after" } },
        { "id": "c4", "selector": "#old", "type": "delete", "enabled": false }
    ]
}"##;

#[test]
fn test_payload_loads_in_order() {
    let set = VariantChangeSet::from_json(PAYLOAD).unwrap();
    assert_eq!(set.experiment_id, "checkout-redesign");
    assert_eq!(set.variant_id, "b");

    let types: Vec<ChangeType> = set.changes.iter().map(|c| c.change_type()).collect();
    assert_eq!(
        types,
        vec![
            ChangeType::Text,
            ChangeType::Style,
            ChangeType::Insert,
            ChangeType::Delete
        ]
    );

    let filter = set.url_filter.as_ref().unwrap();
    assert_eq!(filter.match_type, MatchType::Path);
    assert_eq!(filter.include, vec!["/products/*".to_string()]);
}

#[test]
fn test_style_property_order_kept() {
    let set = VariantChangeSet::from_json(PAYLOAD).unwrap();
    let ChangeValue::Style(props) = set.changes[1].value() else {
        panic!("expected style value");
    };
    let keys: Vec<&str> = props.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["color", "font-weight"]);
    assert!(set.changes[1].is_important());
}

#[test]
fn test_disabled_changes_skipped_by_enabled_iter() {
    let set = VariantChangeSet::from_json(PAYLOAD).unwrap();
    let ids: Vec<&str> = set.enabled_changes().map(|c| c.id().as_str()).collect();
    assert_eq!(ids, vec!["c1", "c2", "c3"]);
}

#[test]
fn test_serialized_set_loads_back_equal() {
    let set = VariantChangeSet::new("exp", "control")
        .unwrap()
        .with_change(ChangeRecord::text("h1", "Hello").unwrap())
        .with_change(ChangeRecord::move_to("#a", "#b", Position::FirstChild).unwrap())
        .with_change(ChangeRecord::class(".cta", ["primary"], []).unwrap());

    let json = set.to_json_pretty().unwrap();
    let loaded = VariantChangeSet::from_json(&json).unwrap();
    assert_eq!(loaded, set);
}

#[test]
fn test_bad_owner_id_rejected() {
    let json = r#"{ "experimentId": "a/b", "variantId": "v", "changes": [] }"#;
    assert!(matches!(
        VariantChangeSet::from_json(json).unwrap_err(),
        ValidationError::InvalidId { kind: "experiment", .. }
    ));
}

#[test]
fn test_not_json_is_malformed() {
    assert!(matches!(
        VariantChangeSet::from_json("{ nope").unwrap_err(),
        ValidationError::Malformed(_)
    ));
}
