use async_trait::async_trait;
use log::warn;
use serde::Deserialize;
use serde_json::Value;

use crate::compiler::{ArgsSchema, FieldKind, FieldSpec};
use crate::vm::errors::VMError;
use crate::vm::ops::value::{int_to_value, Numeric};
use crate::vm::ops::{store_output, Instruction, TypedInstruction};
use crate::vm::VM;

const TRANSFORMS: &[&str] = &[
    "capitalize",
    "lowercase",
    "trim",
    "uppercase",
    "camelize",
    "underscore",
    "dasherize",
    "bigint",
    "int",
    "number",
    "split",
];

const DEFAULT_SEPARATOR: &str = ",";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StringTransform {
    Capitalize,
    Lowercase,
    Trim,
    Uppercase,
    Camelize,
    Underscore,
    Dasherize,
    Bigint,
    Int,
    Number,
    Split,
}

#[derive(Debug, Deserialize)]
pub struct StringInstruction {
    variable: String,
    transform: StringTransform,
    separator: Option<String>,
    output: String,
}

/// Split an identifier into lowercase words
///
/// Words break at `_`, `-`, whitespace and lowercase-to-uppercase boundaries.
fn words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in input.chars() {
        if c == '_' || c == '-' || c.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(input: &str) -> String {
    let mut chars = input.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn camelize(input: &str) -> String {
    words(input)
        .iter()
        .enumerate()
        .map(|(i, word)| if i == 0 { word.clone() } else { capitalize(word) })
        .collect()
}

impl StringInstruction {
    /// Apply the transform, `None` when the input does not convert
    pub fn apply(&self, input: &str) -> Option<Value> {
        let text = match self.transform {
            StringTransform::Capitalize => capitalize(input),
            StringTransform::Lowercase => input.to_lowercase(),
            StringTransform::Uppercase => input.to_uppercase(),
            StringTransform::Trim => input.trim().to_string(),
            StringTransform::Camelize => camelize(input),
            StringTransform::Underscore => words(input).join("_"),
            StringTransform::Dasherize => words(input).join("-"),
            StringTransform::Bigint => Numeric::parse(input)?.truncate()?.to_string(),
            StringTransform::Int => {
                return Numeric::parse(input)?.truncate().map(int_to_value);
            }
            StringTransform::Number => return Numeric::parse(input)?.to_value(),
            StringTransform::Split => {
                let separator = self.separator.as_deref().unwrap_or(DEFAULT_SEPARATOR);
                return Some(Value::Array(
                    input
                        .split(separator)
                        .map(|part| Value::String(part.to_string()))
                        .collect(),
                ));
            }
        };
        Some(Value::String(text))
    }
}

#[async_trait]
impl Instruction for StringInstruction {
    async fn execute(&self, vm: &mut VM) -> Result<(), VMError> {
        let result = match vm.get_global_variable_from_path(&self.variable) {
            Some(Value::String(input)) => self.apply(input),
            Some(_) => {
                warn!("string: '{}' is not a string", self.variable);
                return Ok(());
            }
            None => {
                warn!("string: variable '{}' not found", self.variable);
                return Ok(());
            }
        };

        match result {
            Some(value) => store_output(vm, Self::NAME, &self.output, value),
            None => warn!(
                "string: cannot apply {:?} to '{}'",
                self.transform, self.variable
            ),
        }
        Ok(())
    }
}

impl TypedInstruction for StringInstruction {
    const NAME: &'static str = "string";

    fn args_schema() -> ArgsSchema {
        ArgsSchema::new(vec![
            FieldSpec::required("variable", FieldKind::String).min_length(1),
            FieldSpec::required("transform", FieldKind::String).one_of(TRANSFORMS),
            FieldSpec::optional("separator", FieldKind::String).min_length(1),
            FieldSpec::required("output", FieldKind::String).min_length(1),
        ])
    }
}
