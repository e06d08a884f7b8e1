//! Template rendering instruction
//!
//! Substitutes `{{ name }}` placeholders with variable values. The `log`
//! instruction reuses [`render`] with paths as placeholder names.

use async_trait::async_trait;
use log::debug;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::compiler::{ArgsSchema, FieldKind, FieldSpec};
use crate::vm::errors::VMError;
use crate::vm::ops::value::display;
use crate::vm::ops::{store_output, Instruction, TypedInstruction};
use crate::vm::VM;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_$.\-]+)\s*\}\}").expect("placeholder pattern is valid")
});

/// Replace every `{{ name }}` in `template` with `lookup(name)`
///
/// Names the lookup cannot resolve render as an empty string.
pub fn render<F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<Value>,
{
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            lookup(&caps[1]).map(|value| display(&value)).unwrap_or_default()
        })
        .into_owned()
}

#[derive(Debug, Deserialize)]
pub struct TemplateInstruction {
    template: String,
    /// Placeholder name to variable path
    variables: BTreeMap<String, String>,
    output: String,
}

#[async_trait]
impl Instruction for TemplateInstruction {
    async fn execute(&self, vm: &mut VM) -> Result<(), VMError> {
        let rendered = render(&self.template, |name| {
            self.variables
                .get(name)
                .and_then(|path| vm.get_global_variable_from_path(path))
                .cloned()
        });

        debug!("template: rendered {} characters into '{}'", rendered.len(), self.output);
        store_output(vm, Self::NAME, &self.output, Value::String(rendered));
        Ok(())
    }
}

impl TypedInstruction for TemplateInstruction {
    const NAME: &'static str = "template";

    fn args_schema() -> ArgsSchema {
        ArgsSchema::new(vec![
            FieldSpec::required("template", FieldKind::String),
            FieldSpec::required("variables", FieldKind::StringMap),
            FieldSpec::required("output", FieldKind::String).min_length(1),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::load_test_vm;
    use serde_json::json;

    #[test]
    fn test_render_placeholders() {
        let lookup = |name: &str| match name {
            "who" => Some(json!("alice")),
            "amount" => Some(json!(42)),
            _ => None,
        };
        assert_eq!(
            render("{{who}} sent {{ amount }} to {{ nobody }}.", lookup),
            "alice sent 42 to ."
        );
        assert_eq!(render("no placeholders", lookup), "no placeholders");
    }

    #[tokio::test]
    async fn test_template_writes_output() {
        let mut vm = load_test_vm(
            r#"
version: "1"
program:
  - template:
      template: "Transfer from {{ from }} of {{ value }} on {{ contract }}"
      variables:
        from: event.returnValues.from
        value: event.returnValues.value
        contract: cast.address
      output: message.text
  - set:
      variable: message
      value: {}
  - template:
      template: "Transfer from {{ from }} of {{ value }} on {{ contract }}"
      variables:
        from: event.returnValues.from
        value: event.returnValues.value
        contract: cast.address
      output: message.text
"#,
        );
        vm.execute(Some(json!({"returnValues": {"from": "0xsender", "value": "1000"}})))
            .await
            .unwrap();

        assert_eq!(
            vm.get_global_variable_from_path("message.text"),
            Some(&json!("Transfer from 0xsender of 1000 on 0xcontract"))
        );
    }
}
