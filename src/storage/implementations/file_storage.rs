use fs2::FileExt;
use log::debug;
use std::fs::{self, create_dir_all, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::storage::errors::{io_to_storage_error, StorageError, StorageResult};
use crate::storage::traits::ProgramStore;
use crate::storage::{validate_id, ProgramRecord};

/// File-based persistent program store.
///
/// Layout under the root directory:
/// - programs/
///   - {id}.json - one serialized `ProgramRecord` per program
///
/// Writes take an exclusive lock on the record file, so concurrent hosts
/// sharing a directory never interleave a record.
#[derive(Debug, Clone)]
pub struct FileProgramStore {
    root_path: PathBuf,
}

impl FileProgramStore {
    /// Opens a store at `root_path`, creating the directory layout if needed
    pub fn new<P: AsRef<Path>>(root_path: P) -> StorageResult<Self> {
        let root = root_path.as_ref().to_path_buf();
        create_dir_all(root.join("programs"))
            .map_err(|e| io_to_storage_error("create programs directory", e))?;
        Ok(Self { root_path: root })
    }

    fn programs_dir(&self) -> PathBuf {
        self.root_path.join("programs")
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.programs_dir().join(format!("{}.json", id))
    }
}

impl ProgramStore for FileProgramStore {
    fn get(&self, id: &str) -> StorageResult<ProgramRecord> {
        validate_id(id)?;
        let path = self.record_path(id);
        if !path.exists() {
            return Err(StorageError::NotFound { id: id.to_string() });
        }

        let contents = fs::read_to_string(&path).map_err(|e| io_to_storage_error("read program", e))?;
        serde_json::from_str(&contents).map_err(|e| StorageError::SerializationError {
            details: e.to_string(),
        })
    }

    fn put(&mut self, record: ProgramRecord) -> StorageResult<()> {
        validate_id(&record.id)?;
        let serialized = serde_json::to_string_pretty(&record).map_err(|e| {
            StorageError::SerializationError {
                details: e.to_string(),
            }
        })?;

        let path = self.record_path(&record.id);
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| io_to_storage_error("open program", e))?;
        file.lock_exclusive()
            .map_err(|e| io_to_storage_error("lock program", e))?;

        // Truncate only once the lock is held
        file.set_len(0)?;
        file.write_all(serialized.as_bytes())
            .map_err(|e| io_to_storage_error("write program", e))?;
        file.sync_all()?;

        debug!("Stored program '{}' at {}", record.id, path.display());
        // The lock is released when the file is closed
        Ok(())
    }

    fn delete(&mut self, id: &str) -> StorageResult<ProgramRecord> {
        let record = self.get(id)?;
        fs::remove_file(self.record_path(id)).map_err(|e| io_to_storage_error("delete program", e))?;
        Ok(record)
    }

    fn list(&self) -> StorageResult<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(self.programs_dir())? {
            let path = entry?.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::Cast;
    use tempfile::tempdir;

    #[test]
    fn test_records_survive_reopen() {
        let dir = tempdir().unwrap();
        let record = ProgramRecord::new(
            "transfers",
            "version: \"1\"\nprogram:\n  - log:\n      message: hi",
            Cast::new("cast-1").with_address("0xabc").with_chain_id(1),
        );

        {
            let mut store = FileProgramStore::new(dir.path()).unwrap();
            store.put(record.clone()).unwrap();
            store
                .put(ProgramRecord::new("approvals", "x", Cast::new("cast-2")))
                .unwrap();
        }

        let mut store = FileProgramStore::new(dir.path()).unwrap();
        assert_eq!(store.get("transfers").unwrap(), record);
        assert_eq!(
            store.list().unwrap(),
            vec!["approvals".to_string(), "transfers".to_string()]
        );

        store.delete("approvals").unwrap();
        assert!(!store.contains("approvals").unwrap());
    }

    #[test]
    fn test_overwrite_shrinks_file() {
        let dir = tempdir().unwrap();
        let mut store = FileProgramStore::new(dir.path()).unwrap();
        store
            .put(ProgramRecord::new("p", "a much longer source text", Cast::new("c")))
            .unwrap();
        store.put(ProgramRecord::new("p", "short", Cast::new("c"))).unwrap();
        assert_eq!(store.get("p").unwrap().source, "short");
    }

    #[test]
    fn test_missing_and_invalid_ids() {
        let dir = tempdir().unwrap();
        let store = FileProgramStore::new(dir.path()).unwrap();
        assert!(matches!(store.get("nope"), Err(StorageError::NotFound { .. })));
        assert!(matches!(store.get("../etc"), Err(StorageError::InvalidId { .. })));
    }
}
