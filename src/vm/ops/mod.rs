//! Instruction set
//!
//! Every instruction is described to the compiler by an [`InstructionSpec`]
//! (name, argument schema, validation) and executed by the VM through the
//! [`Instruction`] it binds to at compile time. Binding turns the authored
//! argument mapping into the instruction's own typed configuration, so the VM
//! never hands an instruction an unvalidated mapping.
//!
//! Instructions are grouped by concern:
//! - control flow: `condition`
//! - variables: `set`, `array`, `number`, `object`, `string`, `template`
//! - diagnostics: `debug`, `log`
//! - side effects: `webhook`, `spreadsheet`, `queue`

use async_trait::async_trait;
use log::warn;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::compiler::{ArgsError, ArgsSchema};
use crate::vm::errors::VMError;
use crate::vm::VM;

pub mod array;
pub mod condition;
pub mod debug;
mod http;
pub mod logging;
pub mod number;
pub mod object;
pub mod queue;
pub mod set;
pub mod spreadsheet;
pub mod string;
pub mod template;
pub mod value;
pub mod webhook;

/// Default deepest nesting of branch programs
pub const DEFAULT_MAX_BRANCH_DEPTH: usize = 16;

/// Executable form of one validated instruction call
#[async_trait]
pub trait Instruction: Send + Sync + Debug {
    /// Run the instruction against the VM
    ///
    /// Returning an error is VM-fatal. Failures the instruction can absorb
    /// are logged and reported as `Ok(())`.
    async fn execute(&self, vm: &mut VM) -> Result<(), VMError>;
}

/// State available while binding arguments
pub struct BindContext<'a> {
    pub registry: &'a InstructionRegistry,
    /// Number of branch programs enclosing the call
    pub depth: usize,
}

/// Registry entry describing one instruction
pub trait InstructionSpec: Send + Sync {
    fn name(&self) -> &'static str;

    fn args_schema(&self) -> ArgsSchema;

    /// Structural check of an argument mapping against the schema
    fn validate_args(&self, args: Option<&Map<String, Value>>) -> bool {
        self.args_schema().check(args).is_ok()
    }

    /// Validate arguments and produce the executable instruction
    fn bind(
        &self,
        args: Option<&Map<String, Value>>,
        ctx: &BindContext<'_>,
    ) -> Result<Arc<dyn Instruction>, ArgsError>;
}

/// An instruction whose configuration deserializes from its arguments
pub trait TypedInstruction: Instruction + DeserializeOwned + 'static {
    const NAME: &'static str;

    fn args_schema() -> ArgsSchema;

    /// Cross-field checks and any compile-time preparation
    fn prepare(&mut self, _ctx: &BindContext<'_>) -> Result<(), ArgsError> {
        Ok(())
    }
}

/// Registry entry for a [`TypedInstruction`]
pub struct Builtin<T>(PhantomData<fn() -> T>);

impl<T> Builtin<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for Builtin<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TypedInstruction> InstructionSpec for Builtin<T> {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn args_schema(&self) -> ArgsSchema {
        T::args_schema()
    }

    fn bind(
        &self,
        args: Option<&Map<String, Value>>,
        ctx: &BindContext<'_>,
    ) -> Result<Arc<dyn Instruction>, ArgsError> {
        T::args_schema().check(args)?;

        // Explicit nulls count as absent so optional fields deserialize to None
        let mapping = args
            .map(|args| {
                args.iter()
                    .filter(|(_, value)| !value.is_null())
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect::<Map<_, _>>()
            })
            .unwrap_or_default();

        let mut instruction: T = serde_json::from_value(Value::Object(mapping))
            .map_err(|e| ArgsError::Invalid(e.to_string()))?;
        instruction.prepare(ctx)?;
        Ok(Arc::new(instruction))
    }
}

/// Mapping from instruction name to its spec
///
/// Built once and read-only afterwards. Lookups are exact and case-sensitive.
pub struct InstructionRegistry {
    specs: BTreeMap<&'static str, Box<dyn InstructionSpec>>,
    max_branch_depth: usize,
}

impl InstructionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            specs: BTreeMap::new(),
            max_branch_depth: DEFAULT_MAX_BRANCH_DEPTH,
        }
    }

    /// Registry holding every built-in instruction
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Builtin::<condition::ConditionInstruction>::new());
        registry.register(Builtin::<debug::DebugInstruction>::new());
        registry.register(Builtin::<logging::LogInstruction>::new());
        registry.register(Builtin::<set::SetInstruction>::new());
        registry.register(Builtin::<array::ArrayInstruction>::new());
        registry.register(Builtin::<number::NumberInstruction>::new());
        registry.register(Builtin::<object::ObjectInstruction>::new());
        registry.register(Builtin::<string::StringInstruction>::new());
        registry.register(Builtin::<template::TemplateInstruction>::new());
        registry.register(Builtin::<webhook::WebhookInstruction>::new());
        registry.register(Builtin::<spreadsheet::SpreadsheetInstruction>::new());
        registry.register(Builtin::<queue::QueueInstruction>::new());
        registry
    }

    pub fn with_max_branch_depth(mut self, max_branch_depth: usize) -> Self {
        self.max_branch_depth = max_branch_depth;
        self
    }

    /// Add a spec, replacing any spec with the same name
    pub fn register<S: InstructionSpec + 'static>(&mut self, spec: S) {
        self.specs.insert(spec.name(), Box::new(spec));
    }

    pub fn get(&self, name: &str) -> Option<&dyn InstructionSpec> {
        self.specs.get(name).map(|spec| spec.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<&'static str> {
        self.specs.keys().copied().collect()
    }

    pub fn specs(&self) -> impl Iterator<Item = &dyn InstructionSpec> + '_ {
        self.specs.values().map(|spec| spec.as_ref())
    }

    pub fn max_branch_depth(&self) -> usize {
        self.max_branch_depth
    }
}

impl Default for InstructionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

static DEFAULT_REGISTRY: Lazy<InstructionRegistry> = Lazy::new(InstructionRegistry::with_builtins);

/// Shared registry of built-in instructions with default settings
pub fn default_registry() -> &'static InstructionRegistry {
    &DEFAULT_REGISTRY
}

/// Write a transform result to its output path, logging failures
pub(crate) fn store_output(vm: &mut VM, instruction: &str, output: &str, value: Value) {
    if let Err(err) = vm.set_global_variable_at_path(output, value) {
        warn!("{}: cannot write output '{}': {}", instruction, output, err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtins_registered() {
        let registry = default_registry();
        for name in [
            "condition", "debug", "log", "set", "array", "number", "object", "string", "template",
            "webhook", "spreadsheet", "queue",
        ] {
            assert!(registry.contains(name), "missing {}", name);
        }
        assert!(registry.get("Condition").is_none());
        assert_eq!(registry.names().len(), 12);
    }

    #[test]
    fn test_validate_args_rejects_absent_when_required() {
        let registry = default_registry();
        let debug = registry.get("debug").unwrap();
        assert!(!debug.validate_args(None));

        let args = json!({"variablesToDebug": ["event"]});
        assert!(debug.validate_args(args.as_object()));
    }

    #[test]
    fn test_bind_reports_enum_violation() {
        let registry = default_registry();
        let ctx = BindContext { registry, depth: 0 };
        let args = json!({"variable": "list", "transform": "reverse", "output": "out"});
        let result = registry.get("array").unwrap().bind(args.as_object(), &ctx);
        assert!(matches!(result, Err(ArgsError::Constraint { .. })));
    }

    #[test]
    fn test_custom_depth() {
        let registry = InstructionRegistry::with_builtins().with_max_branch_depth(2);
        assert_eq!(registry.max_branch_depth(), 2);
    }
}
