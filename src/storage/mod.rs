pub mod errors;
pub mod implementations;
pub mod traits;

pub use errors::*;
pub use implementations::file_storage::FileProgramStore;
pub use implementations::in_memory::InMemoryProgramStore;
pub use traits::ProgramStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::vm::Cast;

/// A stored program: its DSL source and the cast it runs for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramRecord {
    pub id: String,
    pub source: String,
    pub cast: Cast,
    pub updated_at: DateTime<Utc>,
}

impl ProgramRecord {
    pub fn new(id: impl Into<String>, source: impl Into<String>, cast: Cast) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            cast,
            updated_at: Utc::now(),
        }
    }
}

/// Check that `id` is usable as a storage key
pub fn validate_id(id: &str) -> StorageResult<()> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidId { id: id.to_string() })
    }
}
