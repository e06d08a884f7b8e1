//! Dot-path access into nested JSON values
//!
//! Paths such as `event.returnValues.from` are split on `.`; empty segments
//! are ignored. Objects are indexed by key and arrays by decimal index.
//! Reads never fail: anything that cannot be reached resolves to `None`.
//! A value that is present but falsy (`0`, `""`, `false`, `null` as a leaf)
//! is still returned.

use serde_json::Value;
use thiserror::Error;

/// Errors raised when writing through a path
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PathError {
    /// The path has no non-empty segments
    #[error("Empty path")]
    Empty,

    /// An intermediate segment does not exist
    #[error("Parent of '{path}' does not exist")]
    MissingParent { path: String },

    /// The leaf cannot be written into the value found at its parent
    #[error("Cannot write '{segment}' into a non-container value in '{path}'")]
    NotAContainer { path: String, segment: String },
}

/// Split a path into its non-empty segments
pub fn segments(path: &str) -> Vec<&str> {
    path.split('.').filter(|segment| !segment.is_empty()).collect()
}

fn child<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn child_mut<'a>(value: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(move |i| items.get_mut(i)),
        _ => None,
    }
}

/// Resolve `path` against `root`
///
/// Returns `None` for an empty path.
pub fn get<'a>(path: &str, root: &'a Value) -> Option<&'a Value> {
    let segments = segments(path);
    if segments.is_empty() {
        return None;
    }
    segments
        .into_iter()
        .try_fold(root, |current, segment| child(current, segment))
}

/// Resolve `path` against `root` for in-place mutation
pub fn get_mut<'a>(path: &str, root: &'a mut Value) -> Option<&'a mut Value> {
    let segments = segments(path);
    if segments.is_empty() {
        return None;
    }
    segments
        .into_iter()
        .try_fold(root, |current, segment| child_mut(current, segment))
}

/// Assign `value` at `path`, returning the value it replaced
///
/// Every parent must already exist; only the leaf is created. An array leaf
/// may overwrite an existing index or append at exactly `len`.
pub fn set(path: &str, root: &mut Value, value: Value) -> Result<Option<Value>, PathError> {
    let mut segments = segments(path);
    let leaf = segments.pop().ok_or(PathError::Empty)?;

    let mut current = root;
    for segment in segments {
        current = child_mut(current, segment).ok_or_else(|| PathError::MissingParent {
            path: path.to_string(),
        })?;
    }

    let not_a_container = || PathError::NotAContainer {
        path: path.to_string(),
        segment: leaf.to_string(),
    };

    match current {
        Value::Object(map) => Ok(map.insert(leaf.to_string(), value)),
        Value::Array(items) => {
            let index = leaf.parse::<usize>().map_err(|_| not_a_container())?;
            if index < items.len() {
                Ok(Some(std::mem::replace(&mut items[index], value)))
            } else if index == items.len() {
                items.push(value);
                Ok(None)
            } else {
                Err(not_a_container())
            }
        }
        _ => Err(not_a_container()),
    }
}
