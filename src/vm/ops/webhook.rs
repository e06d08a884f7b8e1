use async_trait::async_trait;
use log::{info, warn};
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::compiler::{ArgsSchema, FieldKind, FieldSpec};
use crate::vm::errors::VMError;
use crate::vm::ops::http::send_with_retry;
use crate::vm::ops::{Instruction, TypedInstruction};
use crate::vm::VM;

const METHODS: &[&str] = &["POST", "PUT", "PATCH"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WebhookMethod {
    #[default]
    Post,
    Put,
    Patch,
}

impl From<WebhookMethod> for reqwest::Method {
    fn from(method: WebhookMethod) -> Self {
        match method {
            WebhookMethod::Post => reqwest::Method::POST,
            WebhookMethod::Put => reqwest::Method::PUT,
            WebhookMethod::Patch => reqwest::Method::PATCH,
        }
    }
}

/// Sends the value of `variable` as a JSON body to `url`
///
/// Delivery failures are logged and never stop the program.
#[derive(Debug, Deserialize)]
pub struct WebhookInstruction {
    url: String,
    #[serde(default)]
    method: WebhookMethod,
    token: Option<String>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    variable: String,
}

#[async_trait]
impl Instruction for WebhookInstruction {
    async fn execute(&self, vm: &mut VM) -> Result<(), VMError> {
        let payload = match vm.get_global_variable_from_path(&self.variable) {
            Some(value) if !value.is_null() => value.clone(),
            _ => {
                warn!("webhook: variable '{}' is empty, nothing sent", self.variable);
                return Ok(());
            }
        };

        let services = vm.services().clone();
        let method = reqwest::Method::from(self.method);
        let outcome = send_with_retry(&services, || {
            let mut request = services.http.request(method.clone(), &self.url).json(&payload);
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }
            for (name, value) in &self.headers {
                request = request.header(name.as_str(), value.as_str());
            }
            request
        })
        .await;

        match outcome {
            Ok(status) if status.is_success() => {
                info!("webhook: {} {} -> {}", method, self.url, status);
                vm.emit_event("webhook", &format!("{} {} -> {}", method, self.url, status.as_u16()));
            }
            Ok(status) => {
                warn!("webhook: {} {} answered {}", method, self.url, status);
                vm.emit_event("webhook", &format!("{} {} -> {}", method, self.url, status.as_u16()));
            }
            Err(err) => {
                warn!("webhook: {} {} failed: {}", method, self.url, err);
                vm.emit_event("webhook", &format!("{} {} failed", method, self.url));
            }
        }
        Ok(())
    }
}

impl TypedInstruction for WebhookInstruction {
    const NAME: &'static str = "webhook";

    fn args_schema() -> ArgsSchema {
        ArgsSchema::new(vec![
            FieldSpec::required("url", FieldKind::String).min_length(1),
            FieldSpec::optional("method", FieldKind::String).one_of(METHODS),
            FieldSpec::optional("token", FieldKind::String),
            FieldSpec::optional("headers", FieldKind::StringMap),
            FieldSpec::required("variable", FieldKind::String).min_length(1),
        ])
    }
}
