use std::collections::BTreeMap;

use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::traits::ProgramStore;
use crate::storage::{validate_id, ProgramRecord};

/// An in-memory implementation of the `ProgramStore` trait.
/// Suitable for testing and demos.
#[derive(Default, Debug, Clone)]
pub struct InMemoryProgramStore {
    records: BTreeMap<String, ProgramRecord>,
}

impl InMemoryProgramStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ProgramStore for InMemoryProgramStore {
    fn get(&self, id: &str) -> StorageResult<ProgramRecord> {
        self.records
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound { id: id.to_string() })
    }

    fn put(&mut self, record: ProgramRecord) -> StorageResult<()> {
        validate_id(&record.id)?;
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    fn delete(&mut self, id: &str) -> StorageResult<ProgramRecord> {
        self.records
            .remove(id)
            .ok_or_else(|| StorageError::NotFound { id: id.to_string() })
    }

    fn list(&self) -> StorageResult<Vec<String>> {
        Ok(self.records.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::Cast;

    #[test]
    fn test_put_get_delete() {
        let mut store = InMemoryProgramStore::new();
        let record = ProgramRecord::new("alerts", "version: \"1\"", Cast::new("cast-1"));

        store.put(record.clone()).unwrap();
        assert_eq!(store.get("alerts").unwrap(), record);
        assert!(store.contains("alerts").unwrap());
        assert_eq!(store.list().unwrap(), vec!["alerts".to_string()]);

        assert_eq!(store.delete("alerts").unwrap(), record);
        assert!(!store.contains("alerts").unwrap());
        assert_eq!(
            store.delete("alerts"),
            Err(StorageError::NotFound {
                id: "alerts".to_string()
            })
        );
    }

    #[test]
    fn test_rejects_invalid_id() {
        let mut store = InMemoryProgramStore::new();
        let record = ProgramRecord::new("a/b", "", Cast::new("c"));
        assert!(matches!(store.put(record), Err(StorageError::InvalidId { .. })));
        assert!(store.is_empty());
    }
}
