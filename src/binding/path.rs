//! Dot-separated path access over JSON values.

use serde_json::{Map, Value};

/// Strip the evaluation sigils and the leading `bindings.` segment from a
/// binding path, leaving a plain dot-path into the value store.
///
/// `$(user.name)`, `$user.name`, `bindings.user.name` and `user.name` all
/// normalize to `user.name`.
pub fn normalize(path: &str) -> &str {
    let path = path.trim();
    let path = if let Some(inner) = path.strip_prefix("$(").and_then(|rest| rest.strip_suffix(')')) {
        inner.trim()
    } else {
        path.strip_prefix('$').unwrap_or(path)
    };
    match path.split_once('.') {
        Some(("bindings", rest)) => rest,
        _ => path,
    }
}

/// Split a normalized path into segments.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('.').filter(|segment| !segment.is_empty()).collect()
}

/// Read the value at a dot-path. Numeric segments index into arrays.
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in segments(path) {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Write `new_value` at a dot-path inside `target`, which must be an object.
///
/// A single-segment path always writes. For deeper paths, a missing or
/// non-object intermediate segment is only bridged with a fresh object when
/// `recursive` is set; otherwise the write is skipped and `false` is
/// returned.
pub fn set_path(target: &mut Map<String, Value>, path: &str, new_value: Value, recursive: bool) -> bool {
    let segments = segments(path);
    let Some((last, intermediate)) = segments.split_last() else {
        return false;
    };
    let mut current = target;
    for &segment in intermediate {
        let needs_bridge = !matches!(current.get(segment), Some(Value::Object(_)));
        if needs_bridge {
            if !recursive {
                return false;
            }
            current.insert(segment.to_owned(), Value::Object(Map::new()));
        }
        current = match current.get_mut(segment) {
            Some(Value::Object(map)) => map,
            _ => return false,
        };
    }
    current.insert((*last).to_owned(), new_value);
    true
}

// ===========================================================================
// Tests
// ===========================================================================
