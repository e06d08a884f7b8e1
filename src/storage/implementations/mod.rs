pub mod file_storage;
pub mod in_memory;

pub use file_storage::FileProgramStore;
pub use in_memory::InMemoryProgramStore;
