//! VM global variable store
//!
//! Holds the variables of one execution as a single JSON object. Root keys
//! such as `cast` and `event` are seeded by the VM; instructions read and
//! write through dot-paths.

use serde_json::{Map, Value};
use std::fmt;

use crate::utils::path::{self, PathError};

/// Variables visible to the instructions of one execution
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVariableStore {
    /// Always a `Value::Object`
    root: Value,
}

impl Default for GlobalVariableStore {
    fn default() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }
}

impl GlobalVariableStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a root key
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.root.get(name)
    }

    /// Resolve a dot-path against the whole store
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        path::get(path, &self.root)
    }

    pub fn get_path_mut(&mut self, path: &str) -> Option<&mut Value> {
        path::get_mut(path, &mut self.root)
    }

    /// Assign a root key, replacing any previous value
    pub fn set(&mut self, name: &str, value: Value) {
        if let Value::Object(map) = &mut self.root {
            map.insert(name.to_string(), value);
        }
    }

    /// Assign at a dot-path; parents must already exist
    pub fn set_path(&mut self, path: &str, value: Value) -> Result<(), PathError> {
        path::set(path, &mut self.root, value).map(|_| ())
    }

    /// The whole store as a JSON object
    pub fn as_value(&self) -> &Value {
        &self.root
    }

    pub fn clear(&mut self) {
        self.root = Value::Object(Map::new());
    }

    pub fn len(&self) -> usize {
        self.root.as_object().map_or(0, Map::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for GlobalVariableStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Globals:")?;
        if let Value::Object(map) = &self.root {
            for (key, value) in map {
                writeln!(f, "  {} = {}", key, value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_root_and_path_access() {
        let mut store = GlobalVariableStore::new();
        store.set("event", json!({"returnValues": {"from": "0xsender"}}));

        assert_eq!(store.get("missing"), None);
        assert_eq!(
            store.get_path("event.returnValues.from"),
            Some(&json!("0xsender"))
        );

        store.set_path("event.returnValues.to", json!("0xreceiver")).unwrap();
        assert_eq!(store.get_path("event.returnValues.to"), Some(&json!("0xreceiver")));
        assert!(store.set_path("nope.deeper", json!(1)).is_err());
    }

    #[test]
    fn test_clear() {
        let mut store = GlobalVariableStore::new();
        store.set("a", json!(1));
        assert_eq!(store.len(), 1);
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.as_value(), &json!({}));
    }
}
