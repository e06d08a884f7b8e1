use async_trait::async_trait;
use log::warn;
use serde::Deserialize;
use serde_json::Value;

use crate::compiler::{ArgsSchema, FieldKind, FieldSpec};
use crate::vm::errors::VMError;
use crate::vm::ops::{store_output, Instruction, TypedInstruction};
use crate::vm::VM;

const TRANSFORMS: &[&str] = &["length", "at", "pop", "shift"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrayTransform {
    Length,
    /// Remove and return the element at `index`
    At,
    /// Remove and return the last element
    Pop,
    /// Remove and return the first element
    Shift,
}

#[derive(Debug, Deserialize)]
pub struct ArrayInstruction {
    variable: String,
    transform: ArrayTransform,
    index: Option<i64>,
    output: String,
}

impl ArrayInstruction {
    /// Position `index` refers to in an array of `len` items
    fn resolve_index(index: i64, len: usize) -> Option<usize> {
        let len = len as i64;
        let position = if index < 0 { len + index } else { index };
        (0..len).contains(&position).then_some(position as usize)
    }

    fn apply(&self, items: &mut Vec<Value>) -> Option<Value> {
        match self.transform {
            ArrayTransform::Length => Some(Value::from(items.len())),
            ArrayTransform::Pop => items.pop(),
            ArrayTransform::Shift => (!items.is_empty()).then(|| items.remove(0)),
            ArrayTransform::At => {
                let index = self.index.unwrap_or(0);
                Self::resolve_index(index, items.len()).map(|position| items.remove(position))
            }
        }
    }
}

#[async_trait]
impl Instruction for ArrayInstruction {
    async fn execute(&self, vm: &mut VM) -> Result<(), VMError> {
        let result = match vm.get_global_variable_mut_from_path(&self.variable) {
            Some(Value::Array(items)) => self.apply(items),
            Some(_) => {
                warn!("array: '{}' is not an array", self.variable);
                return Ok(());
            }
            None => {
                warn!("array: variable '{}' not found", self.variable);
                return Ok(());
            }
        };

        match result {
            Some(value) => store_output(vm, Self::NAME, &self.output, value),
            None => warn!(
                "array: {:?} produced nothing for '{}'",
                self.transform, self.variable
            ),
        }
        Ok(())
    }
}

impl TypedInstruction for ArrayInstruction {
    const NAME: &'static str = "array";

    fn args_schema() -> ArgsSchema {
        ArgsSchema::new(vec![
            FieldSpec::required("variable", FieldKind::String).min_length(1),
            FieldSpec::required("transform", FieldKind::String).one_of(TRANSFORMS),
            FieldSpec::optional("index", FieldKind::Integer),
            FieldSpec::required("output", FieldKind::String).min_length(1),
        ])
    }
}
