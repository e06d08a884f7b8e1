use cast_vm::config::RuntimeConfig;
use cast_vm::storage::FileProgramStore;
use cast_vm::{Cast, ExecutionStatus, HostError, ProgramHost, Services};
use serde_json::json;
use tempfile::TempDir;

const NESTED: &str = r#"
version: "1"
program:
  - condition:
      AND: [{variable: event.kind, operator: "=", compareTo: transfer}]
      onTrue: goto_0
      branch_0:
        - condition:
            AND: [{variable: event.amount, operator: ">=", compareTo: "100"}]
            onTrue: goto_1
            onFalse: halt
            branch_1:
              - set:
                  variable: tier
                  value: whale
"#;

fn services(max_branch_depth: usize) -> Services {
    Services::new(RuntimeConfig {
        max_branch_depth,
        ..RuntimeConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_stored_program_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = FileProgramStore::new(dir.path()).unwrap();
        let mut host = ProgramHost::new(store, services(16));
        host.create("tiers", NESTED, Cast::new("cast-1")).unwrap();
    }

    let host = ProgramHost::new(FileProgramStore::new(dir.path()).unwrap(), services(16));
    let report = host
        .handle_event("tiers", json!({"kind": "transfer", "amount": 250}))
        .await
        .unwrap();
    assert_eq!(report.status, ExecutionStatus::Completed);
    assert_eq!(report.globals["tier"], json!("whale"));

    let report = host
        .handle_event("tiers", json!({"kind": "transfer", "amount": 5}))
        .await
        .unwrap();
    assert_eq!(report.status, ExecutionStatus::Halted);
    assert!(report.globals.get("tier").is_none());
}

#[test]
fn test_branch_depth_follows_config() {
    let dir = TempDir::new().unwrap();
    let store = FileProgramStore::new(dir.path()).unwrap();
    let mut host = ProgramHost::new(store, services(1));

    let err = host.create("tiers", NESTED, Cast::new("cast-1")).unwrap_err();
    assert!(matches!(err, HostError::Program(_)));
    assert!(host.list().unwrap().is_empty());
}
