//! Detects whether a decoded field arrived as a patch (`{"dirty": true,
//! "value": ...}`-shaped map) or a full replacement, so the projector can
//! overlay rather than clobber record-like fields.

use serde_json::Value;

pub fn is_patch(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map.contains_key("dirty"))
}

/// Applies `incoming` onto `current`: if `incoming` is a patch, overlay its
/// `value` field (or every non-`dirty` key, for multi-field patches) onto
/// `current`; otherwise treat `incoming` as a full replacement.
pub fn merge(current: &Value, incoming: &Value) -> Value {
    if !is_patch(incoming) {
        return incoming.clone();
    }
    let Value::Object(patch_map) = incoming else {
        return incoming.clone();
    };
    if let Some(v) = patch_map.get("value") {
        return v.clone();
    }
    let mut merged = current.clone();
    if let Value::Object(ref mut cur_map) = merged {
        for (k, v) in patch_map {
            if k != "dirty" {
                cur_map.insert(k.clone(), v.clone());
            }
        }
        merged
    } else {
        incoming.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_replacement_when_not_a_patch() {
        let current = json!({"coin": 10});
        let incoming = json!({"coin": 99});
        assert_eq!(merge(&current, &incoming), incoming);
    }

    #[test]
    fn patch_with_value_key_overlays_the_value() {
        let current = json!(10);
        let incoming = json!({"dirty": true, "value": 42});
        assert_eq!(merge(&current, &incoming), json!(42));
    }

    #[test]
    fn patch_without_value_key_overlays_fields() {
        let current = json!({"coin": 10, "level": 1});
        let incoming = json!({"dirty": true, "coin": 20});
        assert_eq!(merge(&current, &incoming), json!({"coin": 20, "level": 1}));
    }
}
