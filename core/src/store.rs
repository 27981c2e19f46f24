// Aggregate store - authoritative in-memory state
//
// Owns all sessions, tasks and the token-usage time series. Mutations are
// serialized by the relay (single writer); this type itself is plain data.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::event::{MonitorEvent, Priority, Severity, TaskStatus};
use crate::{PulseError, Result};

/// Cumulative token counters for one session.
///
/// Invariant: `total == input + output` after any sequence of applied
/// token-usage events.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenCounters {
    pub input: u64,
    pub output: u64,
    pub total: u64,
}

/// One agent session. Created on session-start, marked ended on session-end,
/// never deleted (retained for history and snapshots).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(rename = "sessionId")]
    pub id: String,
    pub agent_name: String,
    pub model: String,
    pub start_time: i64,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    pub tasks: Vec<String>,
    pub token_usage: TokenCounters,
}

impl Session {
    fn new(id: String, agent_name: String, model: String, start_time: i64) -> Self {
        Self {
            id,
            agent_name,
            model,
            start_time,
            active: true,
            end_time: None,
            tasks: Vec::new(),
            token_usage: TokenCounters::default(),
        }
    }

    /// Auto-created record for events referencing an unknown session.
    fn placeholder(id: String, start_time: i64) -> Self {
        Self::new(id, String::new(), String::new(), start_time)
    }
}

/// One tracked task. The status transition out of `in_progress` is terminal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub session_id: String,
    pub description: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub start_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

/// Append-only token-usage sample, the time series behind the usage charts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsageRecord {
    pub session_id: String,
    pub input: u64,
    pub output: u64,
    pub total: u64,
    pub timestamp: i64,
}

/// A reported error, recorded independently of tasks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub session_id: String,
    pub severity: Severity,
    #[serde(rename = "errorMessage")]
    pub message: String,
    pub timestamp: i64,
}

/// Immutable deep copy of the aggregate state, in insertion order.
///
/// Sent to new subscribers as `initial_data` and written verbatim by the
/// journal (the persisted layout is exactly these three collections).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub sessions: Vec<Session>,
    pub tasks: Vec<Task>,
    pub token_usage: Vec<TokenUsageRecord>,
}

/// Metrics derived on demand from the entity set. Never stored, so they
/// cannot drift from the underlying records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregateMetrics {
    pub total_tokens: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub active_agents: usize,
    pub completed_tasks: usize,
    pub pending_tasks: usize,
    pub failed_tasks: usize,
    pub success_rate: f64,
    pub error_rate: f64,
    pub error_events: usize,
}

/// Authoritative mutable state behind the relay's single-writer lock.
#[derive(Debug)]
pub struct AggregateStore {
    sessions: HashMap<String, Session>,
    session_order: Vec<String>,
    tasks: HashMap<String, Task>,
    task_order: Vec<String>,
    token_series: VecDeque<TokenUsageRecord>,
    errors: VecDeque<ErrorRecord>,
    series_capacity: usize,
    error_capacity: usize,
}

impl AggregateStore {
    pub fn new(series_capacity: usize, error_capacity: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            session_order: Vec::new(),
            tasks: HashMap::new(),
            task_order: Vec::new(),
            token_series: VecDeque::with_capacity(series_capacity),
            errors: VecDeque::with_capacity(error_capacity),
            series_capacity,
            error_capacity,
        }
    }

    /// Rebuilds a store from a persisted snapshot, preserving order. The
    /// token series is truncated to the newest `series_capacity` records.
    pub fn restore(snapshot: StoreSnapshot, series_capacity: usize, error_capacity: usize) -> Self {
        let mut store = Self::new(series_capacity, error_capacity);
        for session in snapshot.sessions {
            store.session_order.push(session.id.clone());
            store.sessions.insert(session.id.clone(), session);
        }
        for task in snapshot.tasks {
            store.task_order.push(task.id.clone());
            store.tasks.insert(task.id.clone(), task);
        }
        let skip = snapshot.token_usage.len().saturating_sub(series_capacity);
        store.token_series.extend(snapshot.token_usage.into_iter().skip(skip));
        store
    }

    /// Applies one validated event, stamping store-assigned timestamps with
    /// `timestamp_ms`.
    pub fn apply(&mut self, event: &MonitorEvent, timestamp_ms: i64) -> Result<()> {
        match event {
            MonitorEvent::SessionStart {
                session_id,
                agent_name,
                model,
            } => self.apply_session_start(session_id, agent_name, model, timestamp_ms),
            MonitorEvent::SessionEnd { session_id } => {
                self.apply_session_end(session_id, timestamp_ms);
                Ok(())
            }
            MonitorEvent::TokenUsage {
                session_id,
                input_tokens,
                output_tokens,
            } => {
                self.apply_token_usage(session_id, *input_tokens, *output_tokens, timestamp_ms);
                Ok(())
            }
            MonitorEvent::TaskStart {
                task_id,
                session_id,
                description,
                priority,
            } => {
                self.apply_task_start(task_id, session_id, description, *priority, timestamp_ms);
                Ok(())
            }
            MonitorEvent::TaskComplete {
                task_id,
                status,
                duration,
            } => {
                self.apply_task_complete(task_id, *status, *duration, timestamp_ms);
                Ok(())
            }
            MonitorEvent::Error {
                session_id,
                severity,
                message,
            } => {
                self.apply_error(session_id, *severity, message, timestamp_ms);
                Ok(())
            }
        }
    }

    fn apply_session_start(
        &mut self,
        session_id: &str,
        agent_name: &str,
        model: &str,
        timestamp_ms: i64,
    ) -> Result<()> {
        if self.sessions.contains_key(session_id) {
            return Err(PulseError::DuplicateSession(session_id.to_string()));
        }
        let session = Session::new(
            session_id.to_string(),
            agent_name.to_string(),
            model.to_string(),
            timestamp_ms,
        );
        self.session_order.push(session_id.to_string());
        self.sessions.insert(session_id.to_string(), session);
        debug!(session = session_id, agent = agent_name, "session started");
        Ok(())
    }

    fn apply_session_end(&mut self, session_id: &str, timestamp_ms: i64) {
        match self.sessions.get_mut(session_id) {
            Some(session) => {
                session.active = false;
                session.end_time = Some(timestamp_ms);
                debug!(session = session_id, "session ended");
            }
            None => {
                warn!(session = session_id, "session end for unknown session, ignoring");
            }
        }
    }

    fn apply_token_usage(
        &mut self,
        session_id: &str,
        input_tokens: u64,
        output_tokens: u64,
        timestamp_ms: i64,
    ) {
        if !self.sessions.contains_key(session_id) {
            // Out-of-order tolerance: record usage against a placeholder
            // rather than dropping it.
            warn!(
                session = session_id,
                "token usage for unknown session, creating placeholder"
            );
            self.session_order.push(session_id.to_string());
            self.sessions.insert(
                session_id.to_string(),
                Session::placeholder(session_id.to_string(), timestamp_ms),
            );
        }
        if let Some(session) = self.sessions.get_mut(session_id) {
            let usage = &mut session.token_usage;
            usage.input += input_tokens;
            usage.output += output_tokens;
            usage.total = usage.input + usage.output;
        }
        if self.token_series.len() >= self.series_capacity {
            self.token_series.pop_front();
        }
        self.token_series.push_back(TokenUsageRecord {
            session_id: session_id.to_string(),
            input: input_tokens,
            output: output_tokens,
            total: input_tokens + output_tokens,
            timestamp: timestamp_ms,
        });
    }

    fn apply_task_start(
        &mut self,
        task_id: &str,
        session_id: &str,
        description: &str,
        priority: Priority,
        timestamp_ms: i64,
    ) {
        if self.tasks.contains_key(task_id) {
            warn!(task = task_id, "task start for existing task, ignoring");
            return;
        }
        let task = Task {
            id: task_id.to_string(),
            session_id: session_id.to_string(),
            description: description.to_string(),
            priority,
            status: TaskStatus::InProgress,
            start_time: timestamp_ms,
            end_time: None,
            duration: None,
        };
        self.task_order.push(task_id.to_string());
        self.tasks.insert(task_id.to_string(), task);
        match self.sessions.get_mut(session_id) {
            Some(session) => session.tasks.push(task_id.to_string()),
            None => {
                // Still queryable by id, just not attached to a session.
                warn!(
                    task = task_id,
                    session = session_id,
                    "task start for unknown session, storing unattached"
                );
            }
        }
    }

    fn apply_task_complete(
        &mut self,
        task_id: &str,
        status: TaskStatus,
        duration: Option<u64>,
        timestamp_ms: i64,
    ) {
        let Some(task) = self.tasks.get_mut(task_id) else {
            warn!(task = task_id, "task complete for unknown task, ignoring");
            return;
        };
        if task.status.is_terminal() {
            warn!(
                task = task_id,
                status = ?task.status,
                "task already completed, ignoring duplicate completion"
            );
            return;
        }
        task.status = status;
        task.end_time = Some(timestamp_ms);
        task.duration =
            duration.or_else(|| Some(timestamp_ms.saturating_sub(task.start_time).max(0) as u64));
    }

    fn apply_error(
        &mut self,
        session_id: &str,
        severity: Severity,
        message: &str,
        timestamp_ms: i64,
    ) {
        if self.errors.len() >= self.error_capacity {
            self.errors.pop_front();
        }
        self.errors.push_back(ErrorRecord {
            session_id: session_id.to_string(),
            severity,
            message: message.to_string(),
            timestamp: timestamp_ms,
        });
    }

    /// Deep copy of sessions and tasks plus the newest `depth` token-usage
    /// records.
    pub fn snapshot(&self, depth: usize) -> StoreSnapshot {
        let skip = self.token_series.len().saturating_sub(depth);
        StoreSnapshot {
            sessions: self
                .session_order
                .iter()
                .filter_map(|id| self.sessions.get(id).cloned())
                .collect(),
            tasks: self
                .task_order
                .iter()
                .filter_map(|id| self.tasks.get(id).cloned())
                .collect(),
            token_usage: self.token_series.iter().skip(skip).cloned().collect(),
        }
    }

    /// Snapshot carrying the entire retained token series, as the journal
    /// persists it.
    pub fn full_snapshot(&self) -> StoreSnapshot {
        self.snapshot(self.token_series.len())
    }

    pub fn metrics(&self) -> AggregateMetrics {
        let input_tokens: u64 = self.sessions.values().map(|s| s.token_usage.input).sum();
        let output_tokens: u64 = self.sessions.values().map(|s| s.token_usage.output).sum();
        let active_agents = self.sessions.values().filter(|s| s.active).count();

        let completed_tasks = self
            .tasks
            .values()
            .filter(|t| t.status.is_terminal())
            .count();
        let pending_tasks = self.tasks.len() - completed_tasks;
        let failed_tasks = self
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Failed)
            .count();
        let successful_tasks = self
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Success)
            .count();

        let (success_rate, error_rate) = if completed_tasks > 0 {
            (
                successful_tasks as f64 / completed_tasks as f64,
                failed_tasks as f64 / completed_tasks as f64,
            )
        } else {
            (1.0, 0.0)
        };

        AggregateMetrics {
            total_tokens: input_tokens + output_tokens,
            input_tokens,
            output_tokens,
            active_agents,
            completed_tasks,
            pending_tasks,
            failed_tasks,
            success_rate,
            error_rate,
            error_events: self.errors.len(),
        }
    }

    pub fn session(&self, session_id: &str) -> Option<&Session> {
        self.sessions.get(session_id)
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.get(task_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn series_len(&self) -> usize {
        self.token_series.len()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn recent_errors(&self, limit: usize) -> Vec<ErrorRecord> {
        let skip = self.errors.len().saturating_sub(limit);
        self.errors.iter().skip(skip).cloned().collect()
    }
}
