// Event model for the monitoring relay
//
// Producers submit one of six event kinds; every applied event is re-emitted
// to subscribers as a `StreamMessage` with the same payload shape the
// dashboard protocol has always used.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::store::StoreSnapshot;
use crate::{PulseError, Result};

/// Task priority as reported by the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// Task lifecycle status.
///
/// A task starts `in_progress` and transitions exactly once into one of the
/// terminal states.
///
/// ```
/// use pulse_core::TaskStatus;
///
/// assert!(!TaskStatus::InProgress.is_terminal());
/// assert!(TaskStatus::Partial.is_terminal());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    InProgress,
    Success,
    Failed,
    Partial,
}

impl TaskStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "in_progress" => Some(Self::InProgress),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            "partial" => Some(Self::Partial),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

/// Severity of a reported error event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// A validated producer event.
///
/// The six kinds are closed: anything else is rejected at the ingest
/// boundary before it reaches the store.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    SessionStart {
        session_id: String,
        agent_name: String,
        model: String,
    },
    SessionEnd {
        session_id: String,
    },
    TokenUsage {
        session_id: String,
        input_tokens: u64,
        output_tokens: u64,
    },
    TaskStart {
        task_id: String,
        session_id: String,
        description: String,
        priority: Priority,
    },
    TaskComplete {
        task_id: String,
        status: TaskStatus,
        duration: Option<u64>,
    },
    Error {
        session_id: String,
        severity: Severity,
        message: String,
    },
}

impl MonitorEvent {
    /// Wire discriminator, shared between the subscriber stream and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionStart { .. } => "session_start",
            Self::SessionEnd { .. } => "session_end",
            Self::TokenUsage { .. } => "token_usage",
            Self::TaskStart { .. } => "task_start",
            Self::TaskComplete { .. } => "task_complete",
            Self::Error { .. } => "error",
        }
    }

    /// Checks required fields. Enum-typed fields are validated during
    /// normalization at the ingest boundary; this guards the string fields
    /// for events constructed programmatically.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::SessionStart {
                session_id,
                agent_name,
                model,
            } => {
                required(session_id, "sessionId")?;
                required(agent_name, "agentName")?;
                required(model, "model")
            }
            Self::SessionEnd { session_id } => required(session_id, "sessionId"),
            Self::TokenUsage { session_id, .. } => required(session_id, "sessionId"),
            Self::TaskStart {
                task_id,
                session_id,
                description,
                ..
            } => {
                required(task_id, "taskId")?;
                required(session_id, "sessionId")?;
                required(description, "description")
            }
            Self::TaskComplete { task_id, .. } => required(task_id, "taskId"),
            Self::Error {
                session_id, message, ..
            } => {
                required(session_id, "sessionId")?;
                required(message, "message")
            }
        }
    }
}

fn required(value: &str, field: &'static str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PulseError::Validation {
            field,
            reason: "must be a non-empty string".to_string(),
        });
    }
    Ok(())
}

/// Message pushed to every subscriber: `{type, timestamp, data}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: i64,
    pub data: serde_json::Value,
}

impl StreamMessage {
    /// Builds the wire message for an applied event.
    ///
    /// Payload shapes follow the dashboard protocol: token usage carries the
    /// computed total, task starts carry the full task object as it entered
    /// the store.
    pub fn from_event(event: &MonitorEvent, timestamp: i64) -> Self {
        let data = match event {
            MonitorEvent::SessionStart {
                session_id,
                agent_name,
                model,
            } => json!({
                "sessionId": session_id,
                "agentName": agent_name,
                "model": model,
            }),
            MonitorEvent::SessionEnd { session_id } => json!({
                "sessionId": session_id,
            }),
            MonitorEvent::TokenUsage {
                session_id,
                input_tokens,
                output_tokens,
            } => json!({
                "sessionId": session_id,
                "tokenUsage": {
                    "input": input_tokens,
                    "output": output_tokens,
                    "total": input_tokens + output_tokens,
                },
            }),
            MonitorEvent::TaskStart {
                task_id,
                session_id,
                description,
                priority,
            } => json!({
                "taskId": task_id,
                "sessionId": session_id,
                "task": {
                    "id": task_id,
                    "description": description,
                    "priority": priority,
                    "status": TaskStatus::InProgress,
                    "startTime": timestamp,
                },
            }),
            MonitorEvent::TaskComplete {
                task_id,
                status,
                duration,
            } => json!({
                "taskId": task_id,
                "status": status,
                "duration": duration,
            }),
            MonitorEvent::Error {
                session_id,
                severity,
                message,
            } => json!({
                "sessionId": session_id,
                "severity": severity,
                "errorMessage": message,
            }),
        };

        Self {
            kind: event.kind().to_string(),
            timestamp,
            data,
        }
    }

    /// Builds the `initial_data` message a new subscriber receives before
    /// any live event.
    pub fn initial_data(snapshot: &StoreSnapshot, timestamp: i64) -> Result<Self> {
        Ok(Self {
            kind: "initial_data".to_string(),
            timestamp,
            data: serde_json::to_value(snapshot)?,
        })
    }
}
