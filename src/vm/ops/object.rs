use async_trait::async_trait;
use log::warn;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::compiler::{ArgsError, ArgsSchema, FieldKind, FieldSpec};
use crate::vm::errors::VMError;
use crate::vm::ops::{store_output, BindContext, Instruction, TypedInstruction};
use crate::vm::VM;

const TRANSFORMS: &[&str] = &["keys", "values", "delete", "value"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectTransform {
    Keys,
    Values,
    /// Remove `key` from the object and output the removed value
    Delete,
    /// Output the value under `key`
    Value,
}

#[derive(Debug, Deserialize)]
pub struct ObjectInstruction {
    variable: String,
    transform: ObjectTransform,
    key: Option<String>,
    output: String,
}

impl ObjectInstruction {
    fn apply(&self, map: &mut Map<String, Value>) -> Option<Value> {
        let key = self.key.as_deref().unwrap_or_default();
        match self.transform {
            ObjectTransform::Keys => Some(Value::Array(
                map.keys().cloned().map(Value::String).collect(),
            )),
            ObjectTransform::Values => Some(Value::Array(map.values().cloned().collect())),
            ObjectTransform::Delete => map.remove(key),
            ObjectTransform::Value => map.get(key).cloned(),
        }
    }
}

#[async_trait]
impl Instruction for ObjectInstruction {
    async fn execute(&self, vm: &mut VM) -> Result<(), VMError> {
        let result = match vm.get_global_variable_mut_from_path(&self.variable) {
            Some(Value::Object(map)) => self.apply(map),
            Some(_) => {
                warn!("object: '{}' is not an object", self.variable);
                return Ok(());
            }
            None => {
                warn!("object: variable '{}' not found", self.variable);
                return Ok(());
            }
        };

        match result {
            Some(value) => store_output(vm, Self::NAME, &self.output, value),
            None => warn!(
                "object: key '{}' not found in '{}'",
                self.key.as_deref().unwrap_or_default(),
                self.variable
            ),
        }
        Ok(())
    }
}

impl TypedInstruction for ObjectInstruction {
    const NAME: &'static str = "object";

    fn args_schema() -> ArgsSchema {
        ArgsSchema::new(vec![
            FieldSpec::required("variable", FieldKind::String).min_length(1),
            FieldSpec::required("transform", FieldKind::String).one_of(TRANSFORMS),
            FieldSpec::optional("key", FieldKind::String),
            FieldSpec::required("output", FieldKind::String).min_length(1),
        ])
    }

    fn prepare(&mut self, _ctx: &BindContext<'_>) -> Result<(), ArgsError> {
        let needs_key = matches!(self.transform, ObjectTransform::Delete | ObjectTransform::Value);
        if needs_key && self.key.is_none() {
            return Err(ArgsError::MissingField("key".to_string()));
        }
        Ok(())
    }
}
