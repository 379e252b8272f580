//! Wire-format checks for the serializable tree and query types.

use serde_json::json;

use crate::backend::{ElementSpec, MutationBatch};
use crate::Selector;

#[test]
fn element_spec_omits_empty_fields() {
    let spec = ElementSpec::new("button").class("anysphere-icon-button");
    assert_eq!(
        serde_json::to_value(&spec).expect("serialize"),
        json!({
            "role": "button",
            "attrs": { "class": "anysphere-icon-button" },
        })
    );

    let bare = ElementSpec::new("group");
    assert_eq!(
        serde_json::to_value(&bare).expect("serialize"),
        json!({ "role": "group" })
    );
}

#[test]
fn mutation_batch_deserializes_with_defaults() {
    let batch: MutationBatch = serde_json::from_value(json!({ "added": [3] })).expect("deserialize");
    assert_eq!(batch.added.len(), 1);
    assert!(batch.removed.is_empty());
}

#[test]
fn selector_round_trips_through_json() {
    let selector = Selector::from("class:full-input-box >> role:button && label:Try again");
    let encoded = serde_json::to_string(&selector).expect("serialize");
    let decoded: Selector = serde_json::from_str(&encoded).expect("deserialize");
    assert_eq!(decoded, selector);
}
