use cast_vm::config::RuntimeConfig;
use cast_vm::storage::InMemoryProgramStore;
use cast_vm::vm::InMemoryJobQueue;
use cast_vm::{Cast, ExecutionStatus, ProgramHost, Services};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn host_for(server: &MockServer, queue: InMemoryJobQueue) -> ProgramHost<InMemoryProgramStore> {
    let services = Services::new(RuntimeConfig {
        sheets_api_base: server.uri(),
        retry_backoff_ms: 1,
        ..RuntimeConfig::default()
    })
    .unwrap()
    .with_job_queue(Arc::new(queue));
    ProgramHost::new(InMemoryProgramStore::new(), services)
}

fn notify_program(server: &MockServer) -> String {
    format!(
        r#"
version: "1"
name: notify-all
program:
  - webhook:
      url: "{uri}/hooks/transfer"
      token: hook-token
      variable: event.returnValues
  - spreadsheet:
      spreadsheetId: ledger
      range: Sheet1!A1
      token: sheet-token
      variables:
        - event.returnValues.from
        - event.returnValues.value
  - queue:
      queue: alerts
      jobName: transfer
      variable: event.returnValues
  - set:
      variable: finished
      value: true
"#,
        uri = server.uri()
    )
}

#[tokio::test]
async fn test_all_side_effects_fire() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks/transfer"))
        .and(header("authorization", "Bearer hook-token"))
        .and(body_json(json!({"from": "0xsender", "value": "7"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v4/spreadsheets/ledger/values/Sheet1!A1:append"))
        .and(body_json(json!({"values": [["0xsender", "7"]]})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let queue = InMemoryJobQueue::new();
    let mut host = host_for(&server, queue.clone());
    host.create("notify", &notify_program(&server), Cast::new("cast-1"))
        .unwrap();

    let report = host
        .handle_event("notify", json!({"returnValues": {"from": "0xsender", "value": "7"}}))
        .await
        .unwrap();

    assert_eq!(report.status, ExecutionStatus::Completed);
    assert_eq!(report.globals["finished"], json!(true));
    let categories: Vec<_> = report.events.iter().map(|e| e.category.as_str()).collect();
    assert_eq!(categories, vec!["webhook", "spreadsheet", "queue"]);

    let jobs = queue.jobs().await;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].queue, "alerts");
    assert_eq!(jobs[0].payload["from"], "0xsender");
}

#[tokio::test]
async fn test_failed_deliveries_never_halt_or_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks/transfer"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v4/spreadsheets/ledger/values/Sheet1!A1:append"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let queue = InMemoryJobQueue::new();
    let mut host = host_for(&server, queue.clone());
    host.create("notify", &notify_program(&server), Cast::new("cast-1"))
        .unwrap();

    let report = host
        .handle_event("notify", json!({"returnValues": {"from": "0xsender", "value": "7"}}))
        .await
        .unwrap();

    assert_eq!(report.status, ExecutionStatus::Completed);
    assert_eq!(report.error, None);
    assert_eq!(report.globals["finished"], json!(true));
    assert_eq!(queue.jobs().await.len(), 1);
}
