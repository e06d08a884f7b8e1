use async_trait::async_trait;
use log::{info, warn};
use serde::Deserialize;
use serde_json::Value;

use crate::compiler::{ArgsSchema, FieldKind, FieldSpec};
use crate::vm::errors::VMError;
use crate::vm::ops::{Instruction, TypedInstruction};
use crate::vm::services::Job;
use crate::vm::VM;

/// Hands the value of `variable` to the job queue as a named job
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueInstruction {
    queue: String,
    job_name: String,
    variable: String,
}

#[async_trait]
impl Instruction for QueueInstruction {
    async fn execute(&self, vm: &mut VM) -> Result<(), VMError> {
        let payload = vm
            .get_global_variable_from_path(&self.variable)
            .cloned()
            .unwrap_or(Value::Null);
        let job = Job {
            queue: self.queue.clone(),
            name: self.job_name.clone(),
            payload,
        };

        let jobs = vm.services().jobs.clone();
        match jobs.enqueue(job).await {
            Ok(id) => {
                info!("queue: enqueued '{}' on '{}' as {}", self.job_name, self.queue, id);
                vm.emit_event("queue", &format!("{}:{} -> {}", self.queue, self.job_name, id));
            }
            Err(err) => warn!("queue: cannot enqueue '{}' on '{}': {}", self.job_name, self.queue, err),
        }
        Ok(())
    }
}

impl TypedInstruction for QueueInstruction {
    const NAME: &'static str = "queue";

    fn args_schema() -> ArgsSchema {
        ArgsSchema::new(vec![
            FieldSpec::required("queue", FieldKind::String).min_length(1),
            FieldSpec::required("jobName", FieldKind::String).min_length(1),
            FieldSpec::required("variable", FieldKind::String).min_length(1),
        ])
    }
}
