// Pulse Core Library
// Real-time agent monitoring relay - aggregation state machine and fan-out

pub mod config;
pub mod event;
pub mod hub;
pub mod ingest;
pub mod journal;
pub mod relay;
pub mod store;

// Export core types
pub use config::RelayConfig;
pub use event::{MonitorEvent, Priority, Severity, StreamMessage, TaskStatus};
pub use hub::{BroadcastHub, HubStats};
pub use ingest::IngestAck;
pub use journal::StateJournal;
pub use relay::{Health, Relay};
pub use store::{AggregateMetrics, AggregateStore, StoreSnapshot};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PulseError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("session {0} already started")]
    DuplicateSession(String),

    #[error("journal error: {0}")]
    Journal(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PulseError>;
