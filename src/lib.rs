pub mod cli;
pub mod compiler;
pub mod config;
pub mod events;
pub mod host;
pub mod storage;
pub mod utils;
pub mod vm;

// Use specific imports rather than assuming re-exports for clarity
pub use crate::compiler::{compile, compile_source, parse_dsl, CompileError, CompiledProgram, ProgramError};
pub use crate::config::{ConfigError, RuntimeConfig};
pub use crate::host::{ExecutionReport, HostError, ProgramHost};
pub use crate::storage::errors::{StorageError, StorageResult};
pub use crate::storage::traits::ProgramStore;
pub use crate::vm::{Cast, ExecutionStatus, InstructionRegistry, Services, VMError, VM};
