//! Branching instruction
//!
//! Evaluates a conjunction (`AND`) or disjunction (`OR`) of comparisons
//! against global variables and fires the directive matching the outcome:
//! run `branch_0` or `branch_1` inline, or halt the VM.
//!
//! `OR` holds when at least one comparison holds.

use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use crate::compiler::{
    compile_calls, parse_instruction_calls, ArgsError, ArgsSchema, CompiledProgram, FieldKind,
    FieldSpec,
};
use crate::vm::errors::VMError;
use crate::vm::ops::value::Numeric;
use crate::vm::ops::{BindContext, Instruction, TypedInstruction};
use crate::vm::VM;

const DIRECTIVES: &[&str] = &["goto_0", "goto_1", "halt"];

/// Comparison operator of one expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

/// One comparison: `variable operator compareTo`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Expression {
    pub variable: String,
    pub operator: Operator,
    pub compare_to: Value,
}

/// What to do once the condition is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Directive {
    #[serde(rename = "goto_0")]
    Goto0,
    #[serde(rename = "goto_1")]
    Goto1,
    #[serde(rename = "halt")]
    Halt,
}

#[derive(Debug, Deserialize)]
pub struct ConditionInstruction {
    #[serde(rename = "AND")]
    and: Option<Vec<Expression>>,
    #[serde(rename = "OR")]
    or: Option<Vec<Expression>>,
    #[serde(rename = "onTrue")]
    on_true: Option<Directive>,
    #[serde(rename = "onFalse")]
    on_false: Option<Directive>,
    branch_0: Option<Vec<Value>>,
    branch_1: Option<Vec<Value>>,
    #[serde(skip)]
    program_0: Option<CompiledProgram>,
    #[serde(skip)]
    program_1: Option<CompiledProgram>,
}

impl ConditionInstruction {
    /// Evaluate the expressions against the VM's variables
    pub fn evaluate(&self, vm: &VM) -> bool {
        let holds = |expr: &Expression| {
            compare(
                vm.get_global_variable_from_path(&expr.variable),
                expr.operator,
                &expr.compare_to,
            )
        };

        match (&self.and, &self.or) {
            (Some(all), _) => all.iter().all(holds),
            (None, Some(any)) => any.iter().any(holds),
            (None, None) => false,
        }
    }

    fn compile_branch(
        name: &str,
        raw: &[Value],
        ctx: &BindContext<'_>,
    ) -> Result<CompiledProgram, ArgsError> {
        let max = ctx.registry.max_branch_depth();
        if ctx.depth + 1 > max {
            return Err(ArgsError::TooDeep {
                branch: name.to_string(),
                max,
            });
        }

        let calls = parse_instruction_calls(raw).map_err(|errors| {
            ArgsError::Invalid(format!(
                "{}: {}",
                name,
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ")
            ))
        })?;

        compile_calls(&calls, ctx.registry, ctx.depth + 1).map_err(|source| ArgsError::Nested {
            branch: name.to_string(),
            source: Box::new(source),
        })
    }
}

/// Compare a resolved variable against a literal
///
/// Numbers compare numerically (numeric strings are coerced when the other
/// side is a number), strings lexically, booleans with `false < true`.
/// An absent or null variable only equals `null`. Values of unrelated types
/// are never ordered and compare by structural equality.
pub fn compare(actual: Option<&Value>, operator: Operator, expected: &Value) -> bool {
    let actual = actual.unwrap_or(&Value::Null);

    match ordering(actual, expected) {
        Some(ord) => match operator {
            Operator::Gt => ord == Ordering::Greater,
            Operator::Gte => ord != Ordering::Less,
            Operator::Lte => ord != Ordering::Greater,
            Operator::Lt => ord == Ordering::Less,
            Operator::Eq => ord == Ordering::Equal,
            Operator::Ne => ord != Ordering::Equal,
        },
        None => match operator {
            Operator::Eq => actual == expected,
            Operator::Ne => actual != expected,
            _ => false,
        },
    }
}

fn ordering(actual: &Value, expected: &Value) -> Option<Ordering> {
    match (actual, expected) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Number(_), Value::Number(_))
        | (Value::Number(_), Value::String(_))
        | (Value::String(_), Value::Number(_)) => {
            Numeric::from_value(actual)?.compare(&Numeric::from_value(expected)?)
        }
        _ => None,
    }
}

#[async_trait]
impl Instruction for ConditionInstruction {
    async fn execute(&self, vm: &mut VM) -> Result<(), VMError> {
        let outcome = self.evaluate(vm);
        let directive = if outcome { self.on_true } else { self.on_false };
        debug!("condition evaluated to {}, directive {:?}", outcome, directive);

        match directive {
            None => {}
            Some(Directive::Halt) => {
                info!("condition: halting program");
                vm.halt(true);
            }
            Some(Directive::Goto0) => {
                if let Some(program) = &self.program_0 {
                    vm.execute_program(program.instructions()).await?;
                }
            }
            Some(Directive::Goto1) => {
                if let Some(program) = &self.program_1 {
                    vm.execute_program(program.instructions()).await?;
                }
            }
        }
        Ok(())
    }
}

impl TypedInstruction for ConditionInstruction {
    const NAME: &'static str = "condition";

    fn args_schema() -> ArgsSchema {
        ArgsSchema::new(vec![
            FieldSpec::optional("AND", FieldKind::MappingList).min_items(1),
            FieldSpec::optional("OR", FieldKind::MappingList).min_items(1),
            FieldSpec::optional("onTrue", FieldKind::String).one_of(DIRECTIVES),
            FieldSpec::optional("onFalse", FieldKind::String).one_of(DIRECTIVES),
            FieldSpec::optional("branch_0", FieldKind::Program).min_items(1),
            FieldSpec::optional("branch_1", FieldKind::Program).min_items(1),
        ])
    }

    fn prepare(&mut self, ctx: &BindContext<'_>) -> Result<(), ArgsError> {
        if self.and.is_some() == self.or.is_some() {
            return Err(ArgsError::Invalid(
                "exactly one of AND or OR is required".to_string(),
            ));
        }

        if let Some(raw) = &self.branch_0 {
            self.program_0 = Some(Self::compile_branch("branch_0", raw, ctx)?);
        }
        if let Some(raw) = &self.branch_1 {
            self.program_1 = Some(Self::compile_branch("branch_1", raw, ctx)?);
        }
        Ok(())
    }
}
