use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde_json::Value;

use crate::compiler::{ArgsSchema, FieldKind, FieldSpec};
use crate::vm::errors::VMError;
use crate::vm::ops::{store_output, Instruction, TypedInstruction};
use crate::vm::VM;

/// Assigns a literal value to a variable path
#[derive(Debug, Deserialize)]
pub struct SetInstruction {
    variable: String,
    value: Value,
}

#[async_trait]
impl Instruction for SetInstruction {
    async fn execute(&self, vm: &mut VM) -> Result<(), VMError> {
        debug!("set: {} = {}", self.variable, self.value);
        store_output(vm, Self::NAME, &self.variable, self.value.clone());
        Ok(())
    }
}

impl TypedInstruction for SetInstruction {
    const NAME: &'static str = "set";

    fn args_schema() -> ArgsSchema {
        ArgsSchema::new(vec![
            FieldSpec::required("variable", FieldKind::String).min_length(1),
            FieldSpec::required("value", FieldKind::Any),
        ])
    }
}
