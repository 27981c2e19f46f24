use pulse_core::event::{MonitorEvent, Priority, Severity, TaskStatus};
use pulse_core::ingest::{self, IngestAck, TaskCompleteRequest, TaskStartRequest};
use pulse_core::PulseError;
use serde_json::json;

fn validation_field(err: PulseError) -> &'static str {
    match err {
        PulseError::Validation { field, .. } => field,
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn session_start_requires_all_fields() {
    let err = ingest::dispatch(
        "session_start",
        json!({ "sessionId": "s1", "model": "m1" }),
    )
    .unwrap_err();
    assert_eq!(validation_field(err), "agentName");

    let err = ingest::dispatch(
        "session_start",
        json!({ "sessionId": "   ", "agentName": "Bot", "model": "m1" }),
    )
    .unwrap_err();
    assert_eq!(validation_field(err), "sessionId");
}

#[test]
fn session_start_normalizes_and_trims() {
    let event = ingest::dispatch(
        "session_start",
        json!({ "sessionId": " s1 ", "agentName": "Bot", "model": "m1" }),
    )
    .unwrap();
    assert_eq!(
        event,
        MonitorEvent::SessionStart {
            session_id: "s1".to_string(),
            agent_name: "Bot".to_string(),
            model: "m1".to_string(),
        }
    );
}

#[test]
fn token_usage_rejects_negative_counts() {
    let err = ingest::dispatch(
        "token_usage",
        json!({ "sessionId": "s1", "inputTokens": -1, "outputTokens": 5 }),
    )
    .unwrap_err();
    assert_eq!(validation_field(err), "inputTokens");

    let err = ingest::dispatch(
        "token_usage",
        json!({ "sessionId": "s1", "inputTokens": 1, "outputTokens": -5 }),
    )
    .unwrap_err();
    assert_eq!(validation_field(err), "outputTokens");
}

#[test]
fn token_usage_counts_default_to_zero() {
    let event = ingest::dispatch("token_usage", json!({ "sessionId": "s1" })).unwrap();
    assert_eq!(
        event,
        MonitorEvent::TokenUsage {
            session_id: "s1".to_string(),
            input_tokens: 0,
            output_tokens: 0,
        }
    );
}

#[test]
fn task_start_defaults_priority_to_medium() {
    let request = TaskStartRequest {
        task_id: "t1".to_string(),
        session_id: "s1".to_string(),
        description: "fix bug".to_string(),
        priority: None,
    };
    let event = request.normalize().unwrap();
    assert!(matches!(
        event,
        MonitorEvent::TaskStart { priority: Priority::Medium, .. }
    ));
}

#[test]
fn task_start_rejects_unknown_priority() {
    let err = ingest::dispatch(
        "task_start",
        json!({ "taskId": "t1", "sessionId": "s1", "description": "x", "priority": "urgent" }),
    )
    .unwrap_err();
    assert_eq!(validation_field(err), "priority");
}

#[test]
fn task_complete_defaults_status_to_success() {
    let request = TaskCompleteRequest {
        task_id: "t1".to_string(),
        status: None,
        duration: Some(500),
    };
    let event = request.normalize().unwrap();
    assert_eq!(
        event,
        MonitorEvent::TaskComplete {
            task_id: "t1".to_string(),
            status: TaskStatus::Success,
            duration: Some(500),
        }
    );
}

#[test]
fn task_complete_rejects_in_progress_and_negative_duration() {
    let err = ingest::dispatch(
        "task_complete",
        json!({ "taskId": "t1", "status": "in_progress" }),
    )
    .unwrap_err();
    assert_eq!(validation_field(err), "status");

    let err = ingest::dispatch(
        "task_complete",
        json!({ "taskId": "t1", "status": "failed", "duration": -3 }),
    )
    .unwrap_err();
    assert_eq!(validation_field(err), "duration");
}

#[test]
fn error_defaults_severity_and_requires_message() {
    let event = ingest::dispatch(
        "error",
        json!({ "sessionId": "s1", "message": "boom" }),
    )
    .unwrap();
    assert!(matches!(
        event,
        MonitorEvent::Error { severity: Severity::Error, .. }
    ));

    let err = ingest::dispatch("error", json!({ "sessionId": "s1" })).unwrap_err();
    assert_eq!(validation_field(err), "message");
}

#[test]
fn unknown_operation_is_rejected() {
    let err = ingest::dispatch("session_pause", json!({})).unwrap_err();
    assert_eq!(validation_field(err), "method");
}

#[test]
fn acks_echo_server_assigned_fields() {
    let usage = MonitorEvent::TokenUsage {
        session_id: "s1".to_string(),
        input_tokens: 100,
        output_tokens: 50,
    };
    let ack = IngestAck::for_event(&usage);
    assert!(ack.success);
    assert_eq!(ack.total, Some(150));
    assert_eq!(ack.session_id, None);

    let start = MonitorEvent::SessionStart {
        session_id: "s1".to_string(),
        agent_name: "Bot".to_string(),
        model: "m1".to_string(),
    };
    let ack = IngestAck::for_event(&start);
    assert_eq!(ack.session_id.as_deref(), Some("s1"));
    assert_eq!(ack.total, None);
}
