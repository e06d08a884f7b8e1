//! Type definitions for the virtual machine
//!
//! This module contains the plain data types shared by the VM and its
//! instructions:
//! - `ExecutionStatus`: the run-state machine of one execution
//! - `Cast`: identity and chain metadata seeded into every run
//! - `VMEvent`: structured record of what instructions reported

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Lifecycle of one execution: Idle → Running → (Halted | Completed | Errored)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// A program is loaded and has not run yet
    Idle,
    Running,
    /// An instruction requested a halt
    Halted,
    /// Every instruction ran
    Completed,
    /// An instruction raised a VM-fatal error
    Errored,
}

impl ExecutionStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Halted | Self::Completed | Self::Errored)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Halted => "halted",
            Self::Completed => "completed",
            Self::Errored => "errored",
        };
        write!(f, "{}", label)
    }
}

/// Identity of the program owner, exposed to programs as the `cast` variable
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cast {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Contract address the program listens to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
}

impl Cast {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    /// Value stored under the `cast` root key
    pub fn to_value(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "address": self.address,
            "chainId": self.chain_id,
        })
    }
}

/// Event record produced during execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VMEvent {
    /// Category of the event
    pub category: String,

    /// Event message or payload
    pub message: String,

    /// Time the event was recorded
    pub timestamp: DateTime<Utc>,
}

impl VMEvent {
    pub fn new(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cast_value_shape() {
        let cast = Cast::new("cast-1").with_address("0xabc").with_chain_id(1);
        let value = cast.to_value();
        assert_eq!(value["id"], "cast-1");
        assert_eq!(value["address"], "0xabc");
        assert_eq!(value["chainId"], 1);
        assert!(value["name"].is_null());
    }

    #[test]
    fn test_status_finished() {
        assert!(!ExecutionStatus::Idle.is_finished());
        assert!(ExecutionStatus::Halted.is_finished());
        assert_eq!(ExecutionStatus::Completed.to_string(), "completed");
    }
}
