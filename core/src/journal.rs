// State journal - optional durable copy of the aggregate state
//
// Write-through, not write-ahead: the in-memory store stays authoritative
// and a failed write is reported, never rolled back. The persisted layout is
// one JSON document holding the three ordered collections (sessions,
// token-usage records, tasks), rewritten atomically on each mutation.

use std::fs;
use std::path::PathBuf;

use tracing::info;

use crate::store::StoreSnapshot;
use crate::{PulseError, Result};

pub struct StateJournal {
    path: PathBuf,
}

impl StateJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Persists the current state. The document is written to a sibling
    /// temp file and renamed over the target so a crash mid-write never
    /// leaves a torn journal.
    pub fn record(&self, state: &StoreSnapshot) -> Result<()> {
        let json = serde_json::to_vec(state)
            .map_err(|e| PulseError::Journal(format!("serialize state: {e}")))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)
            .map_err(|e| PulseError::Journal(format!("write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| PulseError::Journal(format!("rename {}: {e}", self.path.display())))?;
        Ok(())
    }

    /// Loads persisted state. A missing file is a clean first start; an
    /// unreadable or unparsable file is an error the caller treats as fatal
    /// at startup.
    pub fn load(&self) -> Result<Option<StoreSnapshot>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PulseError::Journal(format!(
                    "read {}: {e}",
                    self.path.display()
                )))
            }
        };
        let state: StoreSnapshot = serde_json::from_str(&raw).map_err(|e| {
            PulseError::Journal(format!("corrupt journal {}: {e}", self.path.display()))
        })?;
        info!(
            path = %self.path.display(),
            sessions = state.sessions.len(),
            tasks = state.tasks.len(),
            records = state.token_usage.len(),
            "loaded persisted state"
        );
        Ok(Some(state))
    }
}
