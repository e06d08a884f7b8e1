use async_trait::async_trait;
use log::{info, warn};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::compiler::{ArgsSchema, FieldKind, FieldSpec};
use crate::vm::errors::VMError;
use crate::vm::ops::http::send_with_retry;
use crate::vm::ops::{Instruction, TypedInstruction};
use crate::vm::VM;

/// Appends one row built from `variables` to a Google Sheets range
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadsheetInstruction {
    spreadsheet_id: String,
    range: String,
    token: String,
    variables: Vec<String>,
}

impl SpreadsheetInstruction {
    /// `{base}/v4/spreadsheets/{id}/values/{range}:append` with each segment escaped
    fn append_url(&self, base: &str) -> Option<Url> {
        let mut url = Url::parse(base).ok()?;
        let append = format!("{}:append", self.range);
        url.path_segments_mut().ok()?.pop_if_empty().extend([
            "v4",
            "spreadsheets",
            self.spreadsheet_id.as_str(),
            "values",
            append.as_str(),
        ]);
        Some(url)
    }

    /// Row cells in `variables` order; unresolved paths become empty cells
    fn row(&self, vm: &VM) -> Vec<Value> {
        self.variables
            .iter()
            .map(|path| match vm.get_global_variable_from_path(path) {
                None | Some(Value::Null) => Value::String(String::new()),
                Some(value @ (Value::String(_) | Value::Number(_) | Value::Bool(_))) => {
                    value.clone()
                }
                Some(other) => Value::String(other.to_string()),
            })
            .collect()
    }
}

#[async_trait]
impl Instruction for SpreadsheetInstruction {
    async fn execute(&self, vm: &mut VM) -> Result<(), VMError> {
        let body = json!({ "values": [self.row(vm)] });
        let services = vm.services().clone();
        let url = match self.append_url(&services.config.sheets_api_base) {
            Some(url) => url,
            None => {
                warn!("spreadsheet: invalid API base '{}'", services.config.sheets_api_base);
                return Ok(());
            }
        };

        let outcome = send_with_retry(&services, || {
            services
                .http
                .post(url.clone())
                .query(&[("valueInputOption", "USER_ENTERED")])
                .bearer_auth(&self.token)
                .json(&body)
        })
        .await;

        match outcome {
            Ok(status) if status.is_success() => {
                info!("spreadsheet: appended row to {}", self.spreadsheet_id);
                vm.emit_event(
                    "spreadsheet",
                    &format!("appended {} cells to {}!{}", self.variables.len(), self.spreadsheet_id, self.range),
                );
            }
            Ok(status) => warn!("spreadsheet: append to {} answered {}", self.spreadsheet_id, status),
            Err(err) => warn!("spreadsheet: append to {} failed: {}", self.spreadsheet_id, err),
        }
        Ok(())
    }
}

impl TypedInstruction for SpreadsheetInstruction {
    const NAME: &'static str = "spreadsheet";

    fn args_schema() -> ArgsSchema {
        ArgsSchema::new(vec![
            FieldSpec::required("spreadsheetId", FieldKind::String).min_length(1),
            FieldSpec::required("range", FieldKind::String).min_length(1),
            FieldSpec::required("token", FieldKind::String).min_length(1),
            FieldSpec::required("variables", FieldKind::StringList).min_items(1),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_source;
    use crate::config::RuntimeConfig;
    use crate::vm::{default_registry, Cast, ExecutionStatus, Services, VM};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SOURCE: &str = r#"
version: "1"
program:
  - spreadsheet:
      spreadsheetId: sheet-1
      range: Transfers!A1
      token: sheets-token
      variables:
        - event.returnValues.from
        - event.returnValues.value
        - event.missing
"#;

    fn vm_for(server: &MockServer) -> VM {
        let services = Services::new(RuntimeConfig {
            sheets_api_base: server.uri(),
            retry_backoff_ms: 1,
            ..RuntimeConfig::default()
        })
        .unwrap();
        let (_, program) = compile_source(SOURCE, default_registry()).unwrap();
        let mut vm = VM::new(services);
        vm.load_program(program, &Cast::new("cast-sheet"));
        vm
    }

    #[tokio::test]
    async fn test_appends_row() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v4/spreadsheets/sheet-1/values/Transfers!A1:append"))
            .and(query_param("valueInputOption", "USER_ENTERED"))
            .and(header("authorization", "Bearer sheets-token"))
            .and(body_json(json!({"values": [["0xsender", 25, ""]]})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut vm = vm_for(&server);
        vm.execute(Some(json!({"returnValues": {"from": "0xsender", "value": 25}})))
            .await
            .unwrap();
        assert_eq!(vm.get_events()[0].category, "spreadsheet");
    }

    #[tokio::test]
    async fn test_failure_is_absorbed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let mut vm = vm_for(&server);
        let status = vm.execute(Some(json!({"returnValues": {}}))).await.unwrap();
        assert_eq!(status, ExecutionStatus::Completed);
        assert!(vm.get_events().is_empty());
    }

    #[test]
    fn test_append_url_escapes_segments() {
        let instruction = SpreadsheetInstruction {
            spreadsheet_id: "sheet-1".to_string(),
            range: "Team/Ops #2!A1?".to_string(),
            token: "t".to_string(),
            variables: vec!["event".to_string()],
        };

        let url = instruction.append_url("https://sheets.example.com/").unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.example.com/v4/spreadsheets/sheet-1/values/Team%2FOps%20%232!A1%3F:append"
        );
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
        assert!(instruction.append_url("not a url").is_none());
    }

    #[tokio::test]
    async fn test_range_with_reserved_characters() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v4/spreadsheets/sheet-1/values/Team%2FOps%232!A1:append"))
            .and(query_param("valueInputOption", "USER_ENTERED"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let source = SOURCE.replace("Transfers!A1", "\"Team/Ops#2!A1\"");
        let services = Services::new(RuntimeConfig {
            sheets_api_base: server.uri(),
            retry_backoff_ms: 1,
            ..RuntimeConfig::default()
        })
        .unwrap();
        let (_, program) = compile_source(&source, default_registry()).unwrap();
        let mut vm = VM::new(services);
        vm.load_program(program, &Cast::new("cast-sheet"));
        vm.execute(Some(json!({"returnValues": {"from": "0xsender", "value": 25}})))
            .await
            .unwrap();
        assert_eq!(vm.get_events()[0].category, "spreadsheet");
    }
}
