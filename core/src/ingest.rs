// Ingest boundary - request shapes and normalization
//
// Stateless translation of producer-submitted bodies (HTTP JSON or direct
// method calls) into validated `MonitorEvent`s. Validation happens entirely
// here: nothing malformed reaches the store.

use serde::{Deserialize, Serialize};

use crate::event::{MonitorEvent, Priority, Severity, TaskStatus};
use crate::{PulseError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub agent_name: String,
    #[serde(default)]
    pub model: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEndRequest {
    #[serde(default)]
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsageRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub input_tokens: i64,
    #[serde(default)]
    pub output_tokens: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStartRequest {
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub description: String,
    pub priority: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCompleteRequest {
    #[serde(default)]
    pub task_id: String,
    pub status: Option<String>,
    pub duration: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRequest {
    #[serde(default)]
    pub session_id: String,
    pub severity: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl SessionStartRequest {
    pub fn normalize(self) -> Result<MonitorEvent> {
        Ok(MonitorEvent::SessionStart {
            session_id: required(self.session_id, "sessionId")?,
            agent_name: required(self.agent_name, "agentName")?,
            model: required(self.model, "model")?,
        })
    }
}

impl SessionEndRequest {
    pub fn normalize(self) -> Result<MonitorEvent> {
        Ok(MonitorEvent::SessionEnd {
            session_id: required(self.session_id, "sessionId")?,
        })
    }
}

impl TokenUsageRequest {
    pub fn normalize(self) -> Result<MonitorEvent> {
        Ok(MonitorEvent::TokenUsage {
            session_id: required(self.session_id, "sessionId")?,
            input_tokens: non_negative(self.input_tokens, "inputTokens")?,
            output_tokens: non_negative(self.output_tokens, "outputTokens")?,
        })
    }
}

impl TaskStartRequest {
    pub fn normalize(self) -> Result<MonitorEvent> {
        // Producers may omit the priority; the protocol default is medium.
        let priority = match self.priority.as_deref() {
            None | Some("") => Priority::Medium,
            Some(value) => Priority::parse(value).ok_or_else(|| out_of_enum("priority", value))?,
        };
        Ok(MonitorEvent::TaskStart {
            task_id: required(self.task_id, "taskId")?,
            session_id: required(self.session_id, "sessionId")?,
            description: required(self.description, "description")?,
            priority,
        })
    }
}

impl TaskCompleteRequest {
    pub fn normalize(self) -> Result<MonitorEvent> {
        let status = match self.status.as_deref() {
            None | Some("") => TaskStatus::Success,
            Some(value) => TaskStatus::parse(value).ok_or_else(|| out_of_enum("status", value))?,
        };
        if status == TaskStatus::InProgress {
            return Err(out_of_enum("status", "in_progress"));
        }
        let duration = match self.duration {
            None => None,
            Some(value) => Some(non_negative(value, "duration")?),
        };
        Ok(MonitorEvent::TaskComplete {
            task_id: required(self.task_id, "taskId")?,
            status,
            duration,
        })
    }
}

impl ErrorRequest {
    pub fn normalize(self) -> Result<MonitorEvent> {
        let severity = match self.severity.as_deref() {
            None | Some("") => Severity::Error,
            Some(value) => Severity::parse(value).ok_or_else(|| out_of_enum("severity", value))?,
        };
        Ok(MonitorEvent::Error {
            session_id: required(self.session_id, "sessionId")?,
            severity,
            message: required(self.message, "message")?,
        })
    }
}

/// Entry point for the method-call ingest path (RPC or tool invocations):
/// an operation name plus a JSON argument object, same shapes as the HTTP
/// bodies.
pub fn dispatch(method: &str, args: serde_json::Value) -> Result<MonitorEvent> {
    match method {
        "session_start" => serde_json::from_value::<SessionStartRequest>(args)?.normalize(),
        "session_end" => serde_json::from_value::<SessionEndRequest>(args)?.normalize(),
        "token_usage" => serde_json::from_value::<TokenUsageRequest>(args)?.normalize(),
        "task_start" => serde_json::from_value::<TaskStartRequest>(args)?.normalize(),
        "task_complete" => serde_json::from_value::<TaskCompleteRequest>(args)?.normalize(),
        "error" => serde_json::from_value::<ErrorRequest>(args)?.normalize(),
        _ => Err(PulseError::Validation {
            field: "method",
            reason: format!("unknown operation `{method}`"),
        }),
    }
}

/// Acknowledgement echoed to the producer, including server-assigned fields
/// (the computed token total for usage events).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IngestAck {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl IngestAck {
    pub fn for_event(event: &MonitorEvent) -> Self {
        let mut ack = Self {
            success: true,
            session_id: None,
            task_id: None,
            total: None,
        };
        match event {
            MonitorEvent::SessionStart { session_id, .. }
            | MonitorEvent::SessionEnd { session_id } => {
                ack.session_id = Some(session_id.clone());
            }
            MonitorEvent::TokenUsage {
                input_tokens,
                output_tokens,
                ..
            } => {
                ack.total = Some(input_tokens + output_tokens);
            }
            MonitorEvent::TaskStart { task_id, .. }
            | MonitorEvent::TaskComplete { task_id, .. } => {
                ack.task_id = Some(task_id.clone());
            }
            MonitorEvent::Error { .. } => {}
        }
        ack
    }
}

fn required(value: String, field: &'static str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PulseError::Validation {
            field,
            reason: "must be a non-empty string".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

fn non_negative(value: i64, field: &'static str) -> Result<u64> {
    u64::try_from(value).map_err(|_| PulseError::Validation {
        field,
        reason: format!("must be a non-negative integer, got {value}"),
    })
}

fn out_of_enum(field: &'static str, value: &str) -> PulseError {
    PulseError::Validation {
        field,
        reason: format!("unknown value `{value}`"),
    }
}
