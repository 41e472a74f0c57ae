//! Structural operations on the JSON property tree.
//!
//! The authoritative data and the delta overlay are both plain
//! `serde_json` trees; everything here works on them without knowing about
//! nodes or validators.

use serde_json::{Map, Value};

use super::{PathKey, PropertyPath};

/// Identity key of a trace; never stripped by overlap removal.
pub const TRACE_IDENTITY_KEY: &str = "uid";

/// Sentinel string the surface uses for "no value".
pub const UNDEFINED_SENTINEL: &str = "_undefined_";

#[must_use]
pub fn get_in<'a>(root: &'a Value, path: &PropertyPath) -> Option<&'a Value> {
    let mut current = root;
    for key in path.keys() {
        current = match (key, current) {
            (PathKey::Key(key), Value::Object(map)) => map.get(key)?,
            (PathKey::Index(index), Value::Array(items)) => items.get(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

#[must_use]
pub fn get_in_map<'a>(root: &'a Map<String, Value>, path: &PropertyPath) -> Option<&'a Value> {
    let (first, rest) = path.keys().split_first()?;
    let value = root.get(first.as_key()?)?;
    let rest: PropertyPath = rest.iter().collect();
    get_in(value, &rest)
}

/// Mutable lookup that does not create anything.
pub fn get_in_mut<'a>(root: &'a mut Value, keys: &[PathKey]) -> Option<&'a mut Value> {
    let mut current = root;
    for key in keys {
        current = match (key, current) {
            (PathKey::Key(key), Value::Object(map)) => map.get_mut(key)?,
            (PathKey::Index(index), Value::Array(items)) => items.get_mut(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Mutable lookup that extends intermediate mappings/lists to reach `keys`.
///
/// Missing or scalar intermediates are replaced by the container the next key
/// needs; short lists are padded with `null`.
pub fn ensure_path<'a>(root: &'a mut Value, keys: &[PathKey]) -> &'a mut Value {
    let mut current = root;
    for key in keys {
        current = match key {
            PathKey::Key(key) => {
                if !current.is_object() {
                    *current = Value::Object(Map::new());
                }
                let Value::Object(map) = current else {
                    unreachable!("container was just installed")
                };
                map.entry(key.clone()).or_insert(Value::Null)
            }
            PathKey::Index(index) => {
                if !current.is_array() {
                    *current = Value::Array(Vec::new());
                }
                let Value::Array(items) = current else {
                    unreachable!("container was just installed")
                };
                if items.len() <= *index {
                    items.resize(*index + 1, Value::Null);
                }
                &mut items[*index]
            }
        };
    }
    current
}

/// Assigns (`Some`) or deletes (`None`) the value at `path` inside a mapping.
///
/// `Some(Value::Null)` is treated as a deletion. Returns `true` when the tree
/// actually changed.
pub fn set_in(root: &mut Map<String, Value>, path: &PropertyPath, value: Option<Value>) -> bool {
    let Some((first, rest)) = path.keys().split_first() else {
        return false;
    };
    let Some(first) = first.as_key() else {
        return false;
    };

    match value {
        Some(value) if !value.is_null() => {
            let slot = ensure_path(root.entry(first.to_owned()).or_insert(Value::Null), rest);
            if values_equal(slot, &value) {
                false
            } else {
                *slot = value;
                true
            }
        }
        _ => {
            let Some((last, parents)) = rest.split_last() else {
                return root.shift_remove(first).is_some();
            };
            let Some(container) = root.get_mut(first) else {
                return false;
            };
            match (get_in_mut(container, parents), last) {
                (Some(Value::Object(map)), PathKey::Key(key)) => map.shift_remove(key).is_some(),
                (Some(Value::Array(items)), PathKey::Index(index)) => match items.get_mut(*index) {
                    Some(slot) if !slot.is_null() => {
                        *slot = Value::Null;
                        true
                    }
                    _ => false,
                },
                _ => false,
            }
        }
    }
}

/// Value equality that treats numerically equal integers and floats as equal.
#[must_use]
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => match (l.as_f64(), r.as_f64()) {
            (Some(l), Some(r)) => l == r,
            _ => l == r,
        },
        (Value::Array(l), Value::Array(r)) => {
            l.len() == r.len() && l.iter().zip(r).all(|(l, r)| values_equal(l, r))
        }
        (Value::Object(l), Value::Object(r)) => {
            l.len() == r.len()
                && l
                    .iter()
                    .all(|(key, lv)| r.get(key).is_some_and(|rv| values_equal(lv, rv)))
        }
        _ => left == right,
    }
}

/// A list whose every element is a mapping (an array of compound values).
#[must_use]
pub fn is_mapping_list(value: &Value) -> bool {
    matches!(value, Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object))
}

#[must_use]
pub fn is_compound_value(value: &Value) -> bool {
    value.is_object() || is_mapping_list(value)
}

/// `null` or the surface's undefined sentinel.
#[must_use]
pub fn is_deletion(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s == UNDEFINED_SENTINEL,
        _ => false,
    }
}

/// Recursively merges `delta` into `target`.
///
/// Mappings merge key by key, lists of mappings merge element-wise, and
/// every other value replaces what was there.
pub fn deep_merge(target: &mut Map<String, Value>, delta: &Map<String, Value>) {
    for (key, delta_value) in delta {
        match target.get_mut(key) {
            Some(existing) => merge_value(existing, delta_value),
            None => {
                target.insert(key.clone(), delta_value.clone());
            }
        }
    }
}

fn merge_value(existing: &mut Value, delta: &Value) {
    match (existing, delta) {
        (Value::Object(existing), Value::Object(delta)) => deep_merge(existing, delta),
        (Value::Array(existing), Value::Array(delta))
            if !delta.is_empty() && delta.iter().all(Value::is_object) =>
        {
            for (index, delta_item) in delta.iter().enumerate() {
                match existing.get_mut(index) {
                    Some(existing_item) => merge_value(existing_item, delta_item),
                    None => existing.push(delta_item.clone()),
                }
            }
        }
        (existing, delta) => *existing = delta.clone(),
    }
}

/// Strips authoritative values now owned by the delta overlay.
///
/// Walks `input` and `delta` in lock-step. Compound delta values recurse, and
/// compound input values emptied by the recursion are removed as well. Scalar
/// delta values remove the matching input key, except the trace identity key.
/// Returns every removed path, prefixed with `prefix`.
pub fn remove_overlapping(
    input: &mut Map<String, Value>,
    delta: &Map<String, Value>,
    prefix: &PropertyPath,
) -> Vec<PropertyPath> {
    let mut removed = Vec::new();
    for (key, delta_value) in delta {
        let path = prefix.child(key.as_str());
        if is_compound_value(delta_value) {
            let Some(input_value) = input.get_mut(key) else {
                continue;
            };
            removed.extend(remove_overlapping_value(input_value, delta_value, &path));
            if is_empty_container(input_value) {
                input.shift_remove(key);
                removed.push(path);
            }
        } else if key != TRACE_IDENTITY_KEY && input.shift_remove(key).is_some() {
            removed.push(path);
        }
    }
    removed
}

fn remove_overlapping_value(
    input: &mut Value,
    delta: &Value,
    path: &PropertyPath,
) -> Vec<PropertyPath> {
    match (input, delta) {
        (Value::Object(input), Value::Object(delta)) => remove_overlapping(input, delta, path),
        (Value::Array(input), Value::Array(delta)) => {
            let mut removed = Vec::new();
            for (index, delta_item) in delta.iter().enumerate() {
                let Some(input_item) = input.get_mut(index) else {
                    break;
                };
                if !input_item.is_null() && is_compound_value(delta_item) {
                    removed.extend(remove_overlapping_value(
                        input_item,
                        delta_item,
                        &path.child(index),
                    ));
                }
            }
            removed
        }
        _ => Vec::new(),
    }
}

fn is_empty_container(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Flattens a delta mapping into the paths it touches.
///
/// Mappings and lists of mappings are descended; any other value is a leaf.
#[must_use]
pub fn leaf_paths(delta: &Map<String, Value>) -> Vec<PropertyPath> {
    let mut paths = Vec::new();
    for (key, value) in delta {
        collect_leaf_paths(value, PropertyPath::from_keys([key.as_str()]), &mut paths);
    }
    paths
}

fn collect_leaf_paths(value: &Value, path: PropertyPath, out: &mut Vec<PropertyPath>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                collect_leaf_paths(child, path.child(key.as_str()), out);
            }
        }
        Value::Array(items) if is_mapping_list(value) => {
            for (index, child) in items.iter().enumerate() {
                collect_leaf_paths(child, path.child(index), out);
            }
        }
        _ => out.push(path),
    }
}
