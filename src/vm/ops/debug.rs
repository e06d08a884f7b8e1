use async_trait::async_trait;
use log::info;
use serde::Deserialize;
use serde_json::Value;

use crate::compiler::{ArgsSchema, FieldKind, FieldSpec};
use crate::vm::errors::VMError;
use crate::vm::ops::{Instruction, TypedInstruction};
use crate::vm::VM;

/// Reports the current value of selected variables
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInstruction {
    variables_to_debug: Vec<String>,
}

#[async_trait]
impl Instruction for DebugInstruction {
    async fn execute(&self, vm: &mut VM) -> Result<(), VMError> {
        for path in &self.variables_to_debug {
            let rendered = vm
                .get_global_variable_from_path(path)
                .map(Value::to_string)
                .unwrap_or_else(|| Value::Null.to_string());
            let message = format!("{} = {}", path, rendered);

            info!("debug: {}", message);
            vm.emit_event("debug", &message);
        }
        Ok(())
    }
}

impl TypedInstruction for DebugInstruction {
    const NAME: &'static str = "debug";

    fn args_schema() -> ArgsSchema {
        ArgsSchema::new(vec![
            FieldSpec::required("variablesToDebug", FieldKind::StringList).min_items(1),
        ])
    }
}

#[cfg(test)]
mod tests {
    use crate::vm::load_test_vm;
    use serde_json::json;

    #[tokio::test]
    async fn test_debug_emits_one_event_per_path() {
        let mut vm = load_test_vm(
            r#"
version: "1"
program:
  - debug:
      variablesToDebug:
        - event.returnValues.from
        - nothing.here
"#,
        );
        vm.execute(Some(json!({"returnValues": {"from": "0xsender"}})))
            .await
            .unwrap();

        let messages: Vec<_> = vm.get_events().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "event.returnValues.from = \"0xsender\"",
                "nothing.here = null"
            ]
        );
        assert!(vm.get_events().iter().all(|e| e.category == "debug"));
    }
}
