use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::ProgramRecord;

/// Persistence for program sources and their cast metadata.
///
/// Stores hold source text only; compiled programs are rebuilt from it when
/// an event arrives. Callers are expected to compile a source before putting
/// it, so a store never holds a program that fails validation.
pub trait ProgramStore {
    /// Retrieves the record stored under `id`.
    fn get(&self, id: &str) -> StorageResult<ProgramRecord>;

    /// Inserts or replaces the record under `record.id`.
    fn put(&mut self, record: ProgramRecord) -> StorageResult<()>;

    /// Removes the record under `id`, returning it.
    fn delete(&mut self, id: &str) -> StorageResult<ProgramRecord>;

    /// Ids of every stored record in sorted order.
    fn list(&self) -> StorageResult<Vec<String>>;

    fn contains(&self, id: &str) -> StorageResult<bool> {
        match self.get(id) {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
