//! Structural search over JSON trees.
//!
//! GraphQL responses nest their paginated collection at a different depth for
//! every query, so the pagination container is located by searching for the
//! first object that carries a `pageInfo` key rather than by a fixed path.

use serde_json::{Map, Value};

/// Find the first object in `value` (depth-first, object-entry order) that
/// has `key` as a direct member.
#[must_use]
pub fn find_object_with_key<'a>(value: &'a Value, key: &str) -> Option<&'a Map<String, Value>> {
    let obj = value.as_object()?;
    if obj.contains_key(key) {
        return Some(obj);
    }
    obj.values().find_map(|v| find_object_with_key(v, key))
}

/// Mutable variant of [`find_object_with_key`], same traversal order.
pub fn find_object_with_key_mut<'a>(
    value: &'a mut Value,
    key: &str,
) -> Option<&'a mut Map<String, Value>> {
    let obj = value.as_object_mut()?;
    if obj.contains_key(key) {
        return Some(obj);
    }
    obj.values_mut()
        .find_map(|v| find_object_with_key_mut(v, key))
}
