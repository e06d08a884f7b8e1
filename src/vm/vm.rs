//! Main Virtual Machine implementation
//!
//! This module brings together the call stack, the global variable store and
//! the run state to implement the execution loop.
//!
//! The VM struct is the central coordinator that:
//! - Seeds a fresh variable store for every loaded program
//! - Walks a compiled program instruction by instruction
//! - Runs branch sub-programs inline on the same store and call stack
//! - Tracks halt and error signals raised by instructions
//! - Provides the accessor API instructions use to read and write state
//!
//! One VM runs one program against one event at a time. Nothing in it is
//! shared with other VM instances except the [`Services`] handles.

use futures::future::BoxFuture;
use log::{debug, error, info};
use serde_json::Value;

use crate::compiler::{CompiledInstruction, CompiledProgram, InstructionCall};
use crate::utils::path::PathError;
use crate::vm::errors::VMError;
use crate::vm::memory::GlobalVariableStore;
use crate::vm::services::Services;
use crate::vm::stack::CallStack;
use crate::vm::types::{Cast, ExecutionStatus, VMEvent};

/// The event-reactive virtual machine
#[derive(Debug)]
pub struct VM {
    /// Variables of the current execution
    memory: GlobalVariableStore,

    /// Calls currently executing, innermost on top
    stack: CallStack<InstructionCall>,

    program: Option<CompiledProgram>,

    halted: bool,
    error: Option<VMError>,
    status: ExecutionStatus,

    /// Events recorded by instructions
    events: Vec<VMEvent>,

    services: Services,

    /// Number of program walks currently active
    depth: usize,
}

impl VM {
    /// Create a new VM with no program loaded
    pub fn new(services: Services) -> Self {
        Self {
            memory: GlobalVariableStore::new(),
            stack: CallStack::new(),
            program: None,
            halted: false,
            error: None,
            status: ExecutionStatus::Idle,
            events: Vec::new(),
            services,
            depth: 0,
        }
    }

    /// Load a program, resetting all per-execution state
    ///
    /// The store is replaced by a fresh one holding only `cast`.
    pub fn load_program(&mut self, program: CompiledProgram, cast: &Cast) {
        self.memory = GlobalVariableStore::new();
        self.memory.set("cast", cast.to_value());
        self.stack.clear();
        self.halted = false;
        self.error = None;
        self.events.clear();
        self.depth = 0;
        self.status = ExecutionStatus::Idle;
        self.program = Some(program);
    }

    /// Run the loaded program, exposing `event` at the `event` root key
    ///
    /// Returns the final status, or the error that stopped the run.
    pub async fn execute(&mut self, event: Option<Value>) -> Result<ExecutionStatus, VMError> {
        if self.status != ExecutionStatus::Idle {
            return Err(VMError::InvalidState {
                status: self.status,
            });
        }
        let program = self.program.take().ok_or(VMError::NoProgramLoaded)?;

        if let Some(event) = event {
            self.memory.set("event", event);
        }

        self.status = ExecutionStatus::Running;
        info!("Executing program of {} instructions", program.len());

        if let Err(err) = self.execute_program(program.instructions()).await {
            self.set_error(err);
        }
        self.program = Some(program);

        self.status = if self.error.is_some() {
            ExecutionStatus::Errored
        } else if self.halted {
            ExecutionStatus::Halted
        } else {
            ExecutionStatus::Completed
        };
        info!("Program finished: {}", self.status);

        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(self.status),
        }
    }

    /// Walk a sequence of compiled instructions on the current store
    ///
    /// Used for the top-level program and for branch sub-programs. The walk
    /// stops after any instruction that halts the VM or records an error.
    pub fn execute_program<'a>(
        &'a mut self,
        program: &'a [CompiledInstruction],
    ) -> BoxFuture<'a, Result<(), VMError>> {
        Box::pin(async move {
            let max = self.services.config.max_branch_depth;
            if self.depth > max {
                return Err(VMError::MaxRecursionDepth { max });
            }

            self.depth += 1;
            for compiled in program {
                let call = compiled.call();
                debug!("[{}] {}", self.stack.size(), call.name);

                self.stack.push(call.clone());
                let outcome = compiled.instruction().execute(self).await;
                self.stack.pop();

                if let Err(err) = outcome {
                    error!("Instruction '{}' failed: {}", call.name, err);
                    self.set_error(err);
                }
                if self.halted || self.error.is_some() {
                    break;
                }
            }
            self.depth -= 1;

            Ok(())
        })
    }

    /// Look up a root variable
    pub fn get_global_variable(&self, name: &str) -> Option<&Value> {
        self.memory.get(name)
    }

    /// Resolve a dot-path against all variables
    pub fn get_global_variable_from_path(&self, path: &str) -> Option<&Value> {
        self.memory.get_path(path)
    }

    pub(crate) fn get_global_variable_mut_from_path(&mut self, path: &str) -> Option<&mut Value> {
        self.memory.get_path_mut(path)
    }

    /// Assign a root variable
    pub fn set_global_variable(&mut self, name: &str, value: Value) {
        self.memory.set(name, value);
    }

    /// Assign at a dot-path; a single segment assigns a root variable
    pub fn set_global_variable_at_path(&mut self, path: &str, value: Value) -> Result<(), PathError> {
        self.memory.set_path(path, value)
    }

    /// All variables as one JSON object
    pub fn globals(&self) -> &Value {
        self.memory.as_value()
    }

    /// The call currently executing
    pub fn get_current_stack_item(&self) -> Option<&InstructionCall> {
        self.stack.peek()
    }

    /// Copy of the call stack, outermost first
    pub fn get_stack(&self) -> Vec<InstructionCall> {
        self.stack.get_all()
    }

    pub fn halt(&mut self, flag: bool) {
        self.halted = flag;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn get_error(&self) -> Option<&VMError> {
        self.error.as_ref()
    }

    /// Record a VM-fatal error; the walk stops after the current instruction
    pub fn set_error(&mut self, err: VMError) {
        self.error = Some(err);
    }

    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    /// Record an event with the given category and message
    pub fn emit_event(&mut self, category: &str, message: &str) {
        self.events.push(VMEvent::new(category, message));
    }

    pub fn get_events(&self) -> &[VMEvent] {
        &self.events
    }

    pub fn services(&self) -> &Services {
        &self.services
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::compiler::{compile_source, ArgsSchema};
    use crate::config::RuntimeConfig;
    use crate::vm::ops::{default_registry, Builtin, Instruction, InstructionRegistry, TypedInstruction};
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;

    /// Copies the call stack into `frames` and the current call into `current`
    #[derive(Debug, Deserialize)]
    struct RecordStack {}

    #[async_trait]
    impl Instruction for RecordStack {
        async fn execute(&self, vm: &mut VM) -> Result<(), VMError> {
            let frames: Vec<Value> = vm
                .get_stack()
                .into_iter()
                .map(|call| Value::String(call.name))
                .collect();
            let current = vm.get_current_stack_item().map(|call| call.name.clone());
            vm.set_global_variable("frames", Value::Array(frames));
            vm.set_global_variable("current", json!(current));
            Ok(())
        }
    }

    impl TypedInstruction for RecordStack {
        const NAME: &'static str = "record_stack";

        fn args_schema() -> ArgsSchema {
            ArgsSchema::new(Vec::new())
        }
    }

    const NESTED_TWICE: &str = r#"
version: "1"
program:
  - condition:
      AND: [{variable: event.go, operator: "=", compareTo: true}]
      onTrue: goto_0
      branch_0:
        - condition:
            AND: [{variable: event.go, operator: "=", compareTo: true}]
            onTrue: goto_0
            branch_0:
              - set:
                  variable: reached
                  value: true
  - set:
      variable: after
      value: true
"#;

    pub(crate) fn test_services() -> Services {
        Services::new(RuntimeConfig {
            retry_backoff_ms: 1,
            http_timeout_secs: 2,
            ..RuntimeConfig::default()
        })
        .unwrap()
    }

    pub(crate) fn load(source: &str) -> VM {
        let (_, program) = compile_source(source, default_registry()).unwrap();
        let mut vm = VM::new(test_services());
        vm.load_program(program, &Cast::new("cast-test").with_address("0xcontract"));
        vm
    }

    #[tokio::test]
    async fn test_execute_without_program() {
        let mut vm = VM::new(test_services());
        assert_eq!(vm.execute(None).await, Err(VMError::NoProgramLoaded));
    }

    #[tokio::test]
    async fn test_load_seeds_cast_and_execute_seeds_event() {
        let mut vm = load("version: \"1\"\nprogram:\n  - set:\n      variable: seen\n      value: true");
        assert_eq!(vm.status(), ExecutionStatus::Idle);
        assert_eq!(
            vm.get_global_variable_from_path("cast.address"),
            Some(&json!("0xcontract"))
        );
        assert_eq!(vm.get_global_variable("event"), None);

        let status = vm.execute(Some(json!({"event": "Transfer"}))).await.unwrap();
        assert_eq!(status, ExecutionStatus::Completed);
        assert_eq!(vm.get_global_variable_from_path("event.event"), Some(&json!("Transfer")));
        assert_eq!(vm.get_global_variable("seen"), Some(&json!(true)));
        assert!(vm.get_stack().is_empty());
    }

    #[tokio::test]
    async fn test_second_execute_requires_reload() {
        let source = "version: \"1\"\nprogram:\n  - set:\n      variable: a\n      value: 1";
        let mut vm = load(source);
        vm.execute(None).await.unwrap();
        assert!(matches!(
            vm.execute(None).await,
            Err(VMError::InvalidState { .. })
        ));

        let (_, program) = compile_source(source, default_registry()).unwrap();
        vm.load_program(program, &Cast::new("again"));
        assert_eq!(vm.get_global_variable("a"), None);
        assert_eq!(vm.execute(None).await.unwrap(), ExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn test_halt_stops_walk() {
        let mut vm = load(
            r#"
version: "1"
program:
  - set:
      variable: x
      value: 15
  - condition:
      AND:
        - variable: x
          operator: ">"
          compareTo: 10
      onTrue: halt
  - set:
      variable: after
      value: true
"#,
        );
        assert_eq!(vm.execute(None).await.unwrap(), ExecutionStatus::Halted);
        assert!(vm.is_halted());
        assert_eq!(vm.get_global_variable("after"), None);
    }

    #[test]
    fn test_accessors() {
        let mut vm = VM::new(test_services());
        vm.set_global_variable("obj", json!({"inner": {}}));
        vm.set_global_variable_at_path("obj.inner.value", json!(3)).unwrap();
        assert_eq!(vm.get_global_variable_from_path("obj.inner.value"), Some(&json!(3)));
        assert!(vm.set_global_variable_at_path("missing.value", json!(1)).is_err());

        assert!(vm.get_current_stack_item().is_none());
        vm.set_error(VMError::MaxRecursionDepth { max: 1 });
        assert!(vm.get_error().is_some());
        vm.emit_event("debug", "hello");
        assert_eq!(vm.get_events().len(), 1);
    }

    #[tokio::test]
    async fn test_branch_frames_visible_on_stack() {
        let mut registry = InstructionRegistry::with_builtins();
        registry.register(Builtin::<RecordStack>::new());
        let source = r#"
version: "1"
program:
  - condition:
      AND: [{variable: event.go, operator: "=", compareTo: true}]
      onTrue: goto_0
      branch_0:
        - record_stack:
"#;
        let (_, program) = compile_source(source, &registry).unwrap();
        let mut vm = VM::new(test_services());
        vm.load_program(program, &Cast::new("cast-test"));

        let status = vm.execute(Some(json!({"go": true}))).await.unwrap();
        assert_eq!(status, ExecutionStatus::Completed);
        assert_eq!(
            vm.get_global_variable("frames"),
            Some(&json!(["condition", "record_stack"]))
        );
        assert_eq!(vm.get_global_variable("current"), Some(&json!("record_stack")));
        assert!(vm.get_stack().is_empty());
    }

    #[tokio::test]
    async fn test_runtime_depth_limit() {
        let (_, program) = compile_source(NESTED_TWICE, default_registry()).unwrap();
        let services = Services::new(RuntimeConfig {
            max_branch_depth: 1,
            ..RuntimeConfig::default()
        })
        .unwrap();
        let mut vm = VM::new(services);
        vm.load_program(program, &Cast::new("cast-test"));

        let result = vm.execute(Some(json!({"go": true}))).await;
        assert_eq!(result, Err(VMError::MaxRecursionDepth { max: 1 }));
        assert_eq!(vm.status(), ExecutionStatus::Errored);
        assert_eq!(vm.get_global_variable("reached"), None);
        assert_eq!(vm.get_global_variable("after"), None);
        assert!(vm.get_stack().is_empty());

        let (_, program) = compile_source(NESTED_TWICE, default_registry()).unwrap();
        let mut vm = VM::new(test_services());
        vm.load_program(program, &Cast::new("cast-test"));
        assert_eq!(
            vm.execute(Some(json!({"go": true}))).await,
            Ok(ExecutionStatus::Completed)
        );
        assert_eq!(vm.get_global_variable("reached"), Some(&json!(true)));
    }
}
