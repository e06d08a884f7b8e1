//! Error types for VM operations
//!
//! This module defines the VM-fatal error conditions. Failures that an
//! instruction absorbs (a rejected webhook, a missing input variable) never
//! become a `VMError`; they are logged and the walk continues.

use crate::vm::types::ExecutionStatus;
use thiserror::Error;

/// Error variants that can occur during VM execution
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VMError {
    /// `execute` was called before `load_program`
    #[error("No program loaded")]
    NoProgramLoaded,

    /// `execute` was called on a VM that already ran its program
    #[error("Cannot execute from state '{status}'; load the program again")]
    InvalidState { status: ExecutionStatus },

    /// Error when maximum branch nesting depth is exceeded
    #[error("Maximum branch depth {max} exceeded")]
    MaxRecursionDepth { max: usize },
}
