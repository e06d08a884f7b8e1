//! Outbound capabilities handed to the VM
//!
//! Side-effect instructions never construct their own clients. They reach
//! the HTTP client, the job queue and the runtime settings through the
//! `Services` bundle the host gives each VM. Services are shared between VM
//! instances; each handle synchronizes itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::{ConfigError, RuntimeConfig};

/// A job handed to a queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub queue: String,
    pub name: String,
    pub payload: Value,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueueError {
    #[error("Queue '{0}' is unavailable")]
    Unavailable(String),

    #[error("Enqueue failed: {0}")]
    Rejected(String),
}

/// Destination for `queue` instructions
#[async_trait]
pub trait JobQueue: Send + Sync + Debug {
    /// Enqueue a job, returning its queue-assigned id
    async fn enqueue(&self, job: Job) -> Result<String, QueueError>;
}

/// Job queue that keeps everything in process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryJobQueue {
    jobs: Arc<Mutex<Vec<Job>>>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every job enqueued so far
    pub async fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().await.clone()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job: Job) -> Result<String, QueueError> {
        let mut jobs = self.jobs.lock().await;
        jobs.push(job);
        Ok(jobs.len().to_string())
    }
}

/// Capabilities available to instructions during execution
#[derive(Debug, Clone)]
pub struct Services {
    pub config: RuntimeConfig,
    pub http: reqwest::Client,
    pub jobs: Arc<dyn JobQueue>,
}

impl Services {
    /// Build services with an in-memory job queue
    pub fn new(config: RuntimeConfig) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            config,
            http,
            jobs: Arc::new(InMemoryJobQueue::new()),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(RuntimeConfig::from_env()?)
    }

    pub fn with_job_queue(mut self, jobs: Arc<dyn JobQueue>) -> Self {
        self.jobs = jobs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_in_memory_queue_records_jobs() {
        let queue = InMemoryJobQueue::new();
        let id = queue
            .enqueue(Job {
                queue: "alerts".to_string(),
                name: "notify".to_string(),
                payload: json!({"amount": 5}),
            })
            .await
            .unwrap();

        assert_eq!(id, "1");
        let jobs = queue.jobs().await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].payload["amount"], 5);
    }

    #[tokio::test]
    async fn test_services_share_queue() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let services = Services::new(RuntimeConfig::default())
            .unwrap()
            .with_job_queue(queue.clone());
        let cloned = services.clone();

        cloned
            .jobs
            .enqueue(Job {
                queue: "q".to_string(),
                name: "n".to_string(),
                payload: json!(null),
            })
            .await
            .unwrap();
        assert_eq!(queue.jobs().await.len(), 1);
    }
}
