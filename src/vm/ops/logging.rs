use async_trait::async_trait;
use serde::Deserialize;

use crate::compiler::{ArgsSchema, FieldKind, FieldSpec};
use crate::vm::errors::VMError;
use crate::vm::ops::template::render;
use crate::vm::ops::{Instruction, TypedInstruction};
use crate::vm::VM;

const LEVELS: &[&str] = &["debug", "info", "warn", "error"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<Level> for log::Level {
    fn from(level: Level) -> Self {
        match level {
            Level::Debug => log::Level::Debug,
            Level::Info => log::Level::Info,
            Level::Warn => log::Level::Warn,
            Level::Error => log::Level::Error,
        }
    }
}

/// Writes a message to the log, with `{{ path }}` placeholders resolved
/// against the current variables
#[derive(Debug, Deserialize)]
pub struct LogInstruction {
    message: String,
    #[serde(default)]
    level: Level,
}

#[async_trait]
impl Instruction for LogInstruction {
    async fn execute(&self, vm: &mut VM) -> Result<(), VMError> {
        let message = render(&self.message, |path| {
            vm.get_global_variable_from_path(path).cloned()
        });

        log::log!(log::Level::from(self.level), "{}", message);
        vm.emit_event("log", &message);
        Ok(())
    }
}

impl TypedInstruction for LogInstruction {
    const NAME: &'static str = "log";

    fn args_schema() -> ArgsSchema {
        ArgsSchema::new(vec![
            FieldSpec::required("message", FieldKind::String),
            FieldSpec::optional("level", FieldKind::String).one_of(LEVELS),
        ])
    }
}

#[cfg(test)]
mod tests {
    use crate::compiler::compile_source;
    use crate::vm::{default_registry, load_test_vm};
    use serde_json::json;

    #[tokio::test]
    async fn test_log_renders_paths() {
        let mut vm = load_test_vm(
            r#"
version: "1"
program:
  - log:
      message: "{{ cast.id }} saw {{ event.event }}"
      level: warn
"#,
        );
        vm.execute(Some(json!({"event": "Transfer"}))).await.unwrap();

        let event = &vm.get_events()[0];
        assert_eq!(event.category, "log");
        assert_eq!(event.message, "cast-test saw Transfer");
    }

    #[test]
    fn test_unknown_level_rejected() {
        let source = "version: \"1\"\nprogram:\n  - log:\n      message: hi\n      level: loud";
        assert!(compile_source(source, default_registry()).is_err());
    }
}
