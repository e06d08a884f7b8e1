//! Declarative argument schemas
//!
//! Each instruction publishes an [`ArgsSchema`] describing its argument
//! mapping. The compiler checks authored arguments against it before the
//! instruction's typed configuration is built, and the CLI prints it.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::compiler::CompileError;

/// Shape of a single argument value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Number,
    Integer,
    Boolean,
    /// Any JSON value
    Any,
    /// Sequence of strings
    StringList,
    /// Mapping of string to string
    StringMap,
    /// Sequence of mappings
    MappingList,
    /// Nested program: sequence of single-key mappings
    Program,
}

impl FieldKind {
    fn describe(&self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::Number => "a number",
            Self::Integer => "an integer",
            Self::Boolean => "a boolean",
            Self::Any => "any value",
            Self::StringList => "a list of strings",
            Self::StringMap => "a mapping of strings",
            Self::MappingList => "a list of mappings",
            Self::Program => "a list of instructions",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Any => true,
            Self::StringList => value
                .as_array()
                .map_or(false, |items| items.iter().all(Value::is_string)),
            Self::StringMap => value
                .as_object()
                .map_or(false, |map| map.values().all(Value::is_string)),
            Self::MappingList => value
                .as_array()
                .map_or(false, |items| items.iter().all(Value::is_object)),
            Self::Program => value.as_array().map_or(false, |items| {
                items
                    .iter()
                    .all(|item| item.as_object().map_or(false, |map| map.len() == 1))
            }),
        }
    }
}

/// Additional restriction on an argument value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    /// Minimum string length in characters
    MinLength(usize),
    /// Minimum number of items in a list or mapping
    MinItems(usize),
    /// String must be one of the listed values
    OneOf(&'static [&'static str]),
    /// Inclusive numeric range
    Range { min: f64, max: f64 },
}

impl Constraint {
    fn check(&self, field: &str, value: &Value) -> Result<(), ArgsError> {
        let violation = |message: String| ArgsError::Constraint {
            field: field.to_string(),
            message,
        };

        match self {
            Constraint::MinLength(min) => match value.as_str() {
                Some(s) if s.chars().count() < *min => {
                    Err(violation(format!("must be at least {} characters", min)))
                }
                _ => Ok(()),
            },
            Constraint::MinItems(min) => {
                let count = match value {
                    Value::Array(items) => items.len(),
                    Value::Object(map) => map.len(),
                    _ => return Ok(()),
                };
                if count < *min {
                    Err(violation(format!("must contain at least {} items", min)))
                } else {
                    Ok(())
                }
            }
            Constraint::OneOf(allowed) => match value.as_str() {
                Some(s) if !allowed.contains(&s) => Err(violation(format!(
                    "must be one of {}, got '{}'",
                    allowed.join(", "),
                    s
                ))),
                _ => Ok(()),
            },
            Constraint::Range { min, max } => match value.as_f64() {
                Some(n) if n < *min || n > *max => {
                    Err(violation(format!("must be between {} and {}", min, max)))
                }
                _ => Ok(()),
            },
        }
    }
}

/// Declaration of one named argument
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,
}

impl FieldSpec {
    pub fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            constraints: Vec::new(),
        }
    }

    pub fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    pub fn min_length(mut self, min: usize) -> Self {
        self.constraints.push(Constraint::MinLength(min));
        self
    }

    pub fn min_items(mut self, min: usize) -> Self {
        self.constraints.push(Constraint::MinItems(min));
        self
    }

    pub fn one_of(mut self, allowed: &'static [&'static str]) -> Self {
        self.constraints.push(Constraint::OneOf(allowed));
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.constraints.push(Constraint::Range { min, max });
        self
    }
}

/// The argument mapping accepted by an instruction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArgsSchema {
    pub fields: Vec<FieldSpec>,
}

impl ArgsSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn has_required(&self) -> bool {
        self.fields.iter().any(|field| field.required)
    }

    /// Check an argument mapping against the schema
    ///
    /// Explicit `null` values count as absent. Keys the schema does not
    /// declare are rejected.
    pub fn check(&self, args: Option<&Map<String, Value>>) -> Result<(), ArgsError> {
        let Some(args) = args else {
            return if self.has_required() {
                Err(ArgsError::MissingArgs)
            } else {
                Ok(())
            };
        };

        if let Some(unknown) = args
            .keys()
            .find(|key| !self.fields.iter().any(|field| field.name == key.as_str()))
        {
            return Err(ArgsError::UnexpectedField(unknown.clone()));
        }

        for field in &self.fields {
            let value = match args.get(field.name) {
                None | Some(Value::Null) if field.required => {
                    return Err(ArgsError::MissingField(field.name.to_string()))
                }
                None | Some(Value::Null) => continue,
                Some(value) => value,
            };

            if !field.kind.accepts(value) {
                return Err(ArgsError::WrongType {
                    field: field.name.to_string(),
                    expected: field.kind.describe(),
                });
            }

            for constraint in &field.constraints {
                constraint.check(field.name, value)?;
            }
        }

        Ok(())
    }
}

/// Reasons an argument mapping is rejected
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ArgsError {
    #[error("arguments are required")]
    MissingArgs,

    #[error("missing required argument '{0}'")]
    MissingField(String),

    #[error("unexpected argument '{0}'")]
    UnexpectedField(String),

    #[error("argument '{field}' must be {expected}")]
    WrongType { field: String, expected: &'static str },

    #[error("argument '{field}' {message}")]
    Constraint { field: String, message: String },

    #[error("{0}")]
    Invalid(String),

    #[error("{branch} is nested deeper than the maximum of {max}")]
    TooDeep { branch: String, max: usize },

    #[error("{branch}: {source}")]
    Nested {
        branch: String,
        source: Box<CompileError>,
    },
}
