//! Numeric transforms
//!
//! Integers stay exact while both sides are integers and the result fits in
//! an `i128`; anything else is computed in `f64`. Inputs may be JSON numbers
//! or numeric strings, since token amounts usually arrive as strings.

use async_trait::async_trait;
use log::warn;
use serde::Deserialize;
use serde_json::Value;

use crate::compiler::{ArgsError, ArgsSchema, FieldKind, FieldSpec};
use crate::vm::errors::VMError;
use crate::vm::ops::value::Numeric;
use crate::vm::ops::{store_output, BindContext, Instruction, TypedInstruction};
use crate::vm::VM;

const TRANSFORMS: &[&str] = &["add", "subtract", "multiply", "divide", "pow", "bigint"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberTransform {
    Add,
    Subtract,
    Multiply,
    Divide,
    Pow,
    /// Truncate to an integer and emit its decimal string
    Bigint,
}

impl NumberTransform {
    fn is_binary(&self) -> bool {
        !matches!(self, Self::Bigint)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberInstruction {
    variable: String,
    transform: NumberTransform,
    operand: Option<Value>,
    operand_variable: Option<String>,
    output: String,
}

/// Apply a binary operation, `None` when undefined (division by zero)
pub fn apply(transform: NumberTransform, lhs: Numeric, rhs: Numeric) -> Option<Numeric> {
    use Numeric::{Float, Int};

    if transform == NumberTransform::Divide && rhs.as_f64() == 0.0 {
        return None;
    }

    let exact = match (transform, lhs, rhs) {
        (NumberTransform::Add, Int(a), Int(b)) => a.checked_add(b),
        (NumberTransform::Subtract, Int(a), Int(b)) => a.checked_sub(b),
        (NumberTransform::Multiply, Int(a), Int(b)) => a.checked_mul(b),
        (NumberTransform::Divide, Int(a), Int(b)) if a.checked_rem(b) == Some(0) => a.checked_div(b),
        (NumberTransform::Pow, Int(a), Int(b)) => {
            u32::try_from(b).ok().and_then(|exp| a.checked_pow(exp))
        }
        _ => None,
    };
    if let Some(result) = exact {
        return Some(Int(result));
    }

    let (a, b) = (lhs.as_f64(), rhs.as_f64());
    let result = match transform {
        NumberTransform::Add => a + b,
        NumberTransform::Subtract => a - b,
        NumberTransform::Multiply => a * b,
        NumberTransform::Divide => a / b,
        NumberTransform::Pow => a.powf(b),
        NumberTransform::Bigint => a,
    };
    Some(Float(result))
}

impl NumberInstruction {
    fn operand(&self, vm: &VM) -> Option<Numeric> {
        match (&self.operand, &self.operand_variable) {
            (Some(literal), _) => Numeric::from_value(literal),
            (None, Some(path)) => vm
                .get_global_variable_from_path(path)
                .and_then(Numeric::from_value),
            (None, None) => None,
        }
    }

    fn compute(&self, vm: &VM, input: Numeric) -> Option<Value> {
        if self.transform == NumberTransform::Bigint {
            return match input.truncate() {
                Some(int) => Some(Value::String(int.to_string())),
                None => {
                    warn!("number: '{}' cannot be truncated", self.variable);
                    None
                }
            };
        }

        let Some(operand) = self.operand(vm) else {
            warn!("number: operand for '{}' is not numeric", self.variable);
            return None;
        };

        match apply(self.transform, input, operand) {
            Some(result) => result.to_value().or_else(|| {
                warn!("number: {:?} of '{}' is not finite", self.transform, self.variable);
                None
            }),
            None => {
                warn!("number: division by zero for '{}'", self.variable);
                None
            }
        }
    }
}

#[async_trait]
impl Instruction for NumberInstruction {
    async fn execute(&self, vm: &mut VM) -> Result<(), VMError> {
        let input = match vm.get_global_variable_from_path(&self.variable) {
            Some(value) => Numeric::from_value(value),
            None => {
                warn!("number: variable '{}' not found", self.variable);
                return Ok(());
            }
        };
        let Some(input) = input else {
            warn!("number: '{}' is not numeric", self.variable);
            return Ok(());
        };

        if let Some(result) = self.compute(vm, input) {
            store_output(vm, Self::NAME, &self.output, result);
        }
        Ok(())
    }
}

impl TypedInstruction for NumberInstruction {
    const NAME: &'static str = "number";

    fn args_schema() -> ArgsSchema {
        ArgsSchema::new(vec![
            FieldSpec::required("variable", FieldKind::String).min_length(1),
            FieldSpec::required("transform", FieldKind::String).one_of(TRANSFORMS),
            FieldSpec::optional("operand", FieldKind::Any),
            FieldSpec::optional("operandVariable", FieldKind::String).min_length(1),
            FieldSpec::required("output", FieldKind::String).min_length(1),
        ])
    }

    fn prepare(&mut self, _ctx: &BindContext<'_>) -> Result<(), ArgsError> {
        if !self.transform.is_binary() {
            return Ok(());
        }
        match (&self.operand, &self.operand_variable) {
            (Some(_), Some(_)) => Err(ArgsError::Invalid(
                "operand and operandVariable are mutually exclusive".to_string(),
            )),
            (None, None) => Err(ArgsError::Invalid(
                "operand or operandVariable is required".to_string(),
            )),
            (Some(literal), None) if Numeric::from_value(literal).is_none() => {
                Err(ArgsError::Constraint {
                    field: "operand".to_string(),
                    message: "must be numeric".to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}
