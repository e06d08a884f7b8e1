//! Program host
//!
//! Owns a [`ProgramStore`] and turns stored sources into executions. Sources
//! are compiled before they are persisted, so the store never holds a program
//! the registry rejects. Every event runs on a fresh VM; nothing from one
//! execution is visible to the next.

use log::{info, warn};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::compiler::{compile_source, CompiledProgram, ProgramError};
use crate::storage::{validate_id, ProgramRecord, ProgramStore, StorageError};
use crate::vm::{Cast, ExecutionStatus, InstructionRegistry, Services, VMEvent, VM};

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Program rejected: {0}")]
    Program(#[from] ProgramError),

    #[error("{0}")]
    Storage(#[from] StorageError),
}

/// Outcome of running one program against one event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub program_id: String,
    pub status: ExecutionStatus,
    /// The VM-fatal error, if the run errored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub events: Vec<VMEvent>,
    /// Variables as they stood when the run finished
    pub globals: Value,
}

pub struct ProgramHost<S: ProgramStore> {
    store: S,
    registry: Arc<InstructionRegistry>,
    services: Services,
}

impl<S: ProgramStore> ProgramHost<S> {
    /// Create a host using the built-in instructions, nesting limited by
    /// `services.config.max_branch_depth`
    pub fn new(store: S, services: Services) -> Self {
        let registry = InstructionRegistry::with_builtins()
            .with_max_branch_depth(services.config.max_branch_depth);
        Self::with_registry(store, services, Arc::new(registry))
    }

    pub fn with_registry(store: S, services: Services, registry: Arc<InstructionRegistry>) -> Self {
        Self {
            store,
            registry,
            services,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &InstructionRegistry {
        &self.registry
    }

    fn compile(&self, source: &str) -> Result<CompiledProgram, ProgramError> {
        compile_source(source, &self.registry).map(|(_, program)| program)
    }

    /// Store a new program after compiling it
    pub fn create(&mut self, id: &str, source: &str, cast: Cast) -> Result<ProgramRecord, HostError> {
        validate_id(id)?;
        if self.store.contains(id)? {
            return Err(StorageError::AlreadyExists { id: id.to_string() }.into());
        }
        self.compile(source)?;

        let record = ProgramRecord::new(id, source, cast);
        self.store.put(record.clone())?;
        info!("Created program '{}'", id);
        Ok(record)
    }

    /// Replace an existing program's source and cast after compiling it
    ///
    /// A rejected source leaves the stored program untouched.
    pub fn update(&mut self, id: &str, source: &str, cast: Cast) -> Result<ProgramRecord, HostError> {
        self.store.get(id)?;
        self.compile(source)?;

        let record = ProgramRecord::new(id, source, cast);
        self.store.put(record.clone())?;
        info!("Updated program '{}'", id);
        Ok(record)
    }

    pub fn delete(&mut self, id: &str) -> Result<ProgramRecord, HostError> {
        let record = self.store.delete(id)?;
        info!("Deleted program '{}'", id);
        Ok(record)
    }

    pub fn get(&self, id: &str) -> Result<ProgramRecord, HostError> {
        Ok(self.store.get(id)?)
    }

    pub fn list(&self) -> Result<Vec<String>, HostError> {
        Ok(self.store.list()?)
    }

    /// Run program `id` against `event` on a fresh VM
    pub async fn handle_event(&self, id: &str, event: Value) -> Result<ExecutionReport, HostError> {
        let record = self.store.get(id)?;
        let program = self.compile(&record.source)?;
        Ok(self.run(&record, program, event).await)
    }

    /// Run every program whose cast listens to `address`
    ///
    /// Addresses compare case-insensitively. Programs run one after another,
    /// in id order, each on its own VM.
    pub async fn dispatch(&self, address: &str, event: Value) -> Result<Vec<ExecutionReport>, HostError> {
        let mut reports = Vec::new();
        for id in self.store.list()? {
            let record = self.store.get(&id)?;
            let listens = record
                .cast
                .address
                .as_deref()
                .map_or(false, |a| a.eq_ignore_ascii_case(address));
            if !listens {
                continue;
            }

            match self.compile(&record.source) {
                Ok(program) => reports.push(self.run(&record, program, event.clone()).await),
                Err(err) => warn!("Skipping program '{}': {}", id, err),
            }
        }
        Ok(reports)
    }

    async fn run(&self, record: &ProgramRecord, program: CompiledProgram, event: Value) -> ExecutionReport {
        let mut vm = VM::new(self.services.clone());
        vm.load_program(program, &record.cast);

        let error = match vm.execute(Some(event)).await {
            Ok(status) => {
                info!("Program '{}' finished: {}", record.id, status);
                None
            }
            Err(err) => {
                warn!("Program '{}' errored: {}", record.id, err);
                Some(err.to_string())
            }
        };

        ExecutionReport {
            program_id: record.id.clone(),
            status: vm.status(),
            error,
            events: vm.get_events().to_vec(),
            globals: vm.globals().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryProgramStore;
    use crate::vm::test_services;
    use serde_json::json;

    const FLAG: &str = r#"
version: "1"
program:
  - set:
      variable: seen
      value: true
"#;

    fn host() -> ProgramHost<InMemoryProgramStore> {
        ProgramHost::new(InMemoryProgramStore::new(), test_services())
    }

    #[test]
    fn test_create_rejects_invalid_program_without_storing() {
        let mut host = host();
        let err = host
            .create("bad", "version: \"1\"\nprogram:\n  - teleport:\n      to: moon", Cast::new("c"))
            .unwrap_err();
        assert!(matches!(err, HostError::Program(_)));
        assert!(err.to_string().contains("teleport"));
        assert!(host.list().unwrap().is_empty());
    }

    #[test]
    fn test_create_twice_and_update_missing() {
        let mut host = host();
        host.create("p", FLAG, Cast::new("c")).unwrap();
        assert!(matches!(
            host.create("p", FLAG, Cast::new("c")),
            Err(HostError::Storage(StorageError::AlreadyExists { .. }))
        ));
        assert!(matches!(
            host.update("missing", FLAG, Cast::new("c")),
            Err(HostError::Storage(StorageError::NotFound { .. }))
        ));
    }

    #[test]
    fn test_rejected_update_keeps_previous_source() {
        let mut host = host();
        host.create("p", FLAG, Cast::new("c")).unwrap();
        assert!(host.update("p", "version: \"1\"\nprogram: []", Cast::new("c")).is_err());
        assert_eq!(host.get("p").unwrap().source, FLAG);
    }

    #[tokio::test]
    async fn test_each_event_gets_fresh_vm() {
        let mut host = host();
        host.create(
            "counter",
            r#"
version: "1"
program:
  - condition:
      AND:
        - variable: total
          operator: "="
          compareTo: null
      onTrue: goto_0
      branch_0:
        - set:
            variable: total
            value: 0
  - number:
      variable: event.amount
      transform: add
      operandVariable: total
      output: total
"#,
            Cast::new("c"),
        )
        .unwrap();

        for _ in 0..2 {
            let report = host.handle_event("counter", json!({"amount": 5})).await.unwrap();
            assert_eq!(report.status, ExecutionStatus::Completed);
            assert_eq!(report.globals["total"], json!(5));
        }
    }

    #[tokio::test]
    async fn test_dispatch_by_address() {
        let mut host = host();
        host.create("a", FLAG, Cast::new("c1").with_address("0xABC")).unwrap();
        host.create("b", FLAG, Cast::new("c2").with_address("0xdef")).unwrap();
        host.create("c", FLAG, Cast::new("c3")).unwrap();

        let reports = host.dispatch("0xabc", json!({})).await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].program_id, "a");
        assert_eq!(reports[0].globals["seen"], json!(true));
    }
}
