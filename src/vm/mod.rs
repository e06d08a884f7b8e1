//! Virtual Machine for event-reactive programs
//!
//! This module contains the VM that executes compiled programs every time a
//! matching event arrives. It is divided into focused components:
//!
//! - **stack.rs**: generic LIFO `CallStack` recording the calls currently executing.
//! - **memory.rs**: the `GlobalVariableStore` holding one execution's variables.
//! - **services.rs**: HTTP client, job queue and runtime settings shared with instructions.
//! - **types.rs**: execution status, cast metadata and recorded events.
//! - **errors.rs**: VM-fatal errors.
//! - **ops/**: the instruction registry and every built-in instruction.
//! - **vm.rs**: the execution loop and the accessor API instructions use.

pub mod errors;
pub mod memory;
pub mod ops;
pub mod services;
pub mod stack;
pub mod types;
mod vm;

pub use errors::VMError;
pub use memory::GlobalVariableStore;
pub use ops::{default_registry, Instruction, InstructionRegistry, InstructionSpec};
pub use services::{InMemoryJobQueue, Job, JobQueue, QueueError, Services};
pub use stack::CallStack;
pub use types::{Cast, ExecutionStatus, VMEvent};
pub use vm::VM;

#[cfg(test)]
pub(crate) use vm::tests::{load as load_test_vm, test_services};
