//! YAML program parser
//!
//! Turns program source into a [`ParsedDocument`]. Structural problems are
//! returned as a list of [`ParseError`]s rather than raised.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Classification of a parse failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParseErrorCode {
    InvalidYaml,
    MissingRequiredField,
    InvalidFieldType,
    EmptyProgram,
}

impl fmt::Display for ParseErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::InvalidYaml => "INVALID_YAML",
            Self::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            Self::InvalidFieldType => "INVALID_FIELD_TYPE",
            Self::EmptyProgram => "EMPTY_PROGRAM",
        };
        write!(f, "{}", code)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ParseError {
    pub code: ParseErrorCode,
    pub message: String,
    /// Field the error refers to, when there is one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ParseError {
    fn new(code: ParseErrorCode, message: impl Into<String>, field: Option<&str>) -> Self {
        Self {
            code,
            message: message.into(),
            field: field.map(str::to_string),
        }
    }

    fn invalid_yaml(message: impl Into<String>) -> Self {
        Self::new(ParseErrorCode::InvalidYaml, message, None)
    }

    fn missing(field: &str) -> Self {
        Self::new(
            ParseErrorCode::MissingRequiredField,
            format!("Missing required field '{}'", field),
            Some(field),
        )
    }

    fn field_type(field: &str, expected: &str) -> Self {
        Self::new(
            ParseErrorCode::InvalidFieldType,
            format!("Field '{}' must be {}", field, expected),
            Some(field),
        )
    }
}

/// One DSL statement: an instruction name and its arguments as authored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionCall {
    pub name: String,
    /// `None` when the instruction was written without arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Map<String, Value>>,
}

impl InstructionCall {
    pub fn new(name: impl Into<String>, args: Option<Map<String, Value>>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// A structurally valid program document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub program: Vec<InstructionCall>,
}

/// Parse program source into a document
///
/// Invalid YAML short-circuits with a single `INVALID_YAML` error. Otherwise
/// every field problem found is reported, `version` first.
///
/// # Example
///
/// ```
/// use cast_vm::compiler::parse_dsl;
///
/// let source = "
/// version: \"1.0\"
/// program:
///   - set:
///       variable: threshold
///       value: 1000
/// ";
///
/// let document = parse_dsl(source).unwrap();
/// assert_eq!(document.program[0].name, "set");
/// ```
pub fn parse_dsl(source: &str) -> Result<ParsedDocument, Vec<ParseError>> {
    let root: Value = if source.trim().is_empty() {
        Value::Null
    } else {
        serde_yaml::from_str(source).map_err(|e| vec![ParseError::invalid_yaml(e.to_string())])?
    };

    let Value::Object(mut root) = root else {
        return Err(vec![ParseError::invalid_yaml(
            "Document root must be a mapping",
        )]);
    };

    let mut errors = Vec::new();

    let version = match root.remove("version") {
        None | Some(Value::Null) => {
            errors.push(ParseError::missing("version"));
            None
        }
        Some(Value::String(version)) if version.trim().is_empty() => {
            errors.push(ParseError::missing("version"));
            None
        }
        Some(Value::String(version)) => Some(version),
        Some(_) => {
            errors.push(ParseError::field_type("version", "a string"));
            None
        }
    };

    let name = optional_string(&mut root, "name", &mut errors);
    let description = optional_string(&mut root, "description", &mut errors);

    let program = match root.remove("program") {
        None | Some(Value::Null) => {
            errors.push(ParseError::missing("program"));
            None
        }
        Some(Value::Array(entries)) if entries.is_empty() => {
            errors.push(ParseError::new(
                ParseErrorCode::EmptyProgram,
                "Program must contain at least one instruction",
                Some("program"),
            ));
            None
        }
        Some(Value::Array(entries)) => match parse_instruction_calls(&entries) {
            Ok(calls) => Some(calls),
            Err(mut entry_errors) => {
                errors.append(&mut entry_errors);
                None
            }
        },
        Some(_) => {
            errors.push(ParseError::field_type("program", "a sequence of instructions"));
            None
        }
    };

    match (version, program) {
        (Some(version), Some(program)) if errors.is_empty() => Ok(ParsedDocument {
            version,
            name,
            description,
            program,
        }),
        _ => Err(errors),
    }
}

fn optional_string(
    root: &mut Map<String, Value>,
    field: &str,
    errors: &mut Vec<ParseError>,
) -> Option<String> {
    match root.remove(field) {
        None | Some(Value::Null) => None,
        Some(Value::String(value)) => Some(value),
        Some(_) => {
            errors.push(ParseError::field_type(field, "a string"));
            None
        }
    }
}

/// Normalize a sequence of `{name: args}` entries into instruction calls
///
/// Also used for the nested programs of branching instructions.
pub fn parse_instruction_calls(entries: &[Value]) -> Result<Vec<InstructionCall>, Vec<ParseError>> {
    let mut calls = Vec::with_capacity(entries.len());
    let mut errors = Vec::new();

    for (position, entry) in entries.iter().enumerate() {
        let field = format!("program[{}]", position);
        let map = match entry {
            Value::Object(map) if map.len() == 1 => map,
            _ => {
                errors.push(ParseError::field_type(
                    &field,
                    "a mapping with exactly one instruction name",
                ));
                continue;
            }
        };

        for (name, args) in map {
            match args {
                Value::Null => calls.push(InstructionCall::new(name.clone(), None)),
                Value::Object(args) => {
                    calls.push(InstructionCall::new(name.clone(), Some(args.clone())))
                }
                _ => errors.push(ParseError::field_type(
                    &format!("{}.{}", field, name),
                    "a mapping of arguments",
                )),
            }
        }
    }

    if errors.is_empty() {
        Ok(calls)
    } else {
        Err(errors)
    }
}
