//! Program compiler
//!
//! Cross-checks a parsed document against an [`InstructionRegistry`]: every
//! instruction name must be registered and every argument mapping must
//! satisfy its instruction's schema. Compilation is all-or-nothing; the first
//! failure rejects the whole program.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::vm::ops::{BindContext, Instruction, InstructionRegistry};

pub mod parse_dsl;
pub mod schema;

pub use parse_dsl::{parse_dsl, parse_instruction_calls, InstructionCall, ParseError, ParseErrorCode, ParsedDocument};
pub use schema::{ArgsError, ArgsSchema, Constraint, FieldKind, FieldSpec};

/// Errors that can occur while compiling a parsed program
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// The instruction name is not in the registry
    #[error("Unknown instruction '{name}' at position {position}")]
    UnknownInstruction { position: usize, name: String },

    /// The instruction's arguments do not satisfy its schema
    #[error("Invalid arguments for '{name}' at position {position}: {reason}")]
    InvalidInstructionArgs {
        position: usize,
        name: String,
        reason: ArgsError,
    },
}

impl CompileError {
    pub fn position(&self) -> usize {
        match self {
            Self::UnknownInstruction { position, .. } => *position,
            Self::InvalidInstructionArgs { position, .. } => *position,
        }
    }

    pub fn instruction_name(&self) -> &str {
        match self {
            Self::UnknownInstruction { name, .. } => name,
            Self::InvalidInstructionArgs { name, .. } => name,
        }
    }
}

/// Failure to turn source text into a compiled program
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProgramError {
    #[error("{}", format_parse_errors(.0))]
    Parse(Vec<ParseError>),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

fn format_parse_errors(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A validated call bound to its executable instruction
#[derive(Clone)]
pub struct CompiledInstruction {
    call: InstructionCall,
    instruction: Arc<dyn Instruction>,
}

impl CompiledInstruction {
    /// The call as authored
    pub fn call(&self) -> &InstructionCall {
        &self.call
    }

    pub fn instruction(&self) -> &dyn Instruction {
        self.instruction.as_ref()
    }
}

impl fmt::Debug for CompiledInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledInstruction")
            .field("call", &self.call)
            .finish()
    }
}

impl PartialEq for CompiledInstruction {
    fn eq(&self, other: &Self) -> bool {
        self.call == other.call
    }
}

/// An instruction sequence that has passed validation
///
/// Structurally identical to the calls it was compiled from; equality
/// compares those calls.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledProgram {
    instructions: Vec<CompiledInstruction>,
}

impl CompiledProgram {
    pub fn instructions(&self) -> &[CompiledInstruction] {
        &self.instructions
    }

    pub fn calls(&self) -> Vec<&InstructionCall> {
        self.instructions.iter().map(CompiledInstruction::call).collect()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Compile a parsed document against a registry
pub fn compile(
    document: &ParsedDocument,
    registry: &InstructionRegistry,
) -> Result<CompiledProgram, CompileError> {
    compile_calls(&document.program, registry, 0)
}

/// Compile a call sequence found `depth` branches deep
pub(crate) fn compile_calls(
    calls: &[InstructionCall],
    registry: &InstructionRegistry,
    depth: usize,
) -> Result<CompiledProgram, CompileError> {
    let ctx = BindContext { registry, depth };

    calls
        .iter()
        .enumerate()
        .map(|(position, call)| {
            let spec = registry
                .get(&call.name)
                .ok_or_else(|| CompileError::UnknownInstruction {
                    position,
                    name: call.name.clone(),
                })?;

            let instruction = spec.bind(call.args.as_ref(), &ctx).map_err(|reason| {
                CompileError::InvalidInstructionArgs {
                    position,
                    name: call.name.clone(),
                    reason,
                }
            })?;

            Ok(CompiledInstruction {
                call: call.clone(),
                instruction,
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(|instructions| CompiledProgram { instructions })
}

/// Parse and compile source text in one step
pub fn compile_source(
    source: &str,
    registry: &InstructionRegistry,
) -> Result<(ParsedDocument, CompiledProgram), ProgramError> {
    let document = parse_dsl(source).map_err(ProgramError::Parse)?;
    let program = compile(&document, registry)?;
    Ok((document, program))
}
