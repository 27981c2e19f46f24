// Relay facade - single-writer ingestion pipeline
//
// Wires the aggregate store, the broadcast hub and the optional journal
// behind one serialization point. Every mutation runs under the store's
// write lock: validate, apply, write through to the journal, publish. That
// single critical section is what gives every subscriber the exact apply
// order, and what lets a new subscriber get a snapshot with no gap and no
// replay.

use std::time::Instant;

use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};

use crate::config::RelayConfig;
use crate::event::{MonitorEvent, StreamMessage};
use crate::hub::{BroadcastHub, HubStats};
use crate::ingest::IngestAck;
use crate::journal::StateJournal;
use crate::store::{AggregateMetrics, AggregateStore, StoreSnapshot};
use crate::Result;

/// Read-only health report for the introspection endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub clients: usize,
    pub uptime: f64,
}

pub struct Relay {
    store: RwLock<AggregateStore>,
    hub: BroadcastHub,
    journal: Option<StateJournal>,
    config: RelayConfig,
    started_at: Instant,
}

impl Relay {
    /// Builds a relay, restoring persisted state first when a journal path
    /// is configured. A corrupt journal is a startup failure; a missing one
    /// is a clean first start.
    pub fn open(config: RelayConfig) -> Result<Self> {
        let journal = config.journal_path.clone().map(StateJournal::new);
        let mut store = AggregateStore::new(config.series_capacity, config.error_capacity);
        if let Some(journal) = &journal {
            if let Some(persisted) = journal.load()? {
                store = AggregateStore::restore(
                    persisted,
                    config.series_capacity,
                    config.error_capacity,
                );
            }
        }
        Ok(Self {
            store: RwLock::new(store),
            hub: BroadcastHub::new(config.subscriber_queue),
            journal,
            config,
            started_at: Instant::now(),
        })
    }

    /// Validates and applies one event, then fans it out to every live
    /// subscriber. Never partially applies: a rejected event touches
    /// neither the store nor the stream.
    pub async fn ingest(&self, event: MonitorEvent) -> Result<IngestAck> {
        event.validate()?;
        let timestamp = chrono::Utc::now().timestamp_millis();

        let mut store = self.store.write().await;
        store.apply(&event, timestamp)?;
        if let Some(journal) = &self.journal {
            // Write-through: a failed journal write is reported, the
            // in-memory state remains authoritative and serving continues.
            if let Err(e) = journal.record(&store.full_snapshot()) {
                warn!(error = %e, "journal write failed");
            }
        }
        let message = StreamMessage::from_event(&event, timestamp);
        self.hub.publish(&message);
        drop(store);

        Ok(IngestAck::for_event(&event))
    }

    /// Attaches a subscriber: snapshots the store and registers the channel
    /// in one critical section, queueing `initial_data` as the first
    /// message. Live events resume right after, with no replay of anything
    /// already covered by the snapshot.
    pub async fn subscribe(&self) -> Result<(u64, mpsc::Receiver<String>)> {
        let store = self.store.write().await;
        let snapshot = store.snapshot(self.config.snapshot_depth);
        let (id, rx) = self.hub.subscribe();
        let message =
            StreamMessage::initial_data(&snapshot, chrono::Utc::now().timestamp_millis())?;
        self.hub.push_to(id, serde_json::to_string(&message)?);
        drop(store);

        info!(subscriber = id, clients = self.hub.subscriber_count(), "subscriber connected");
        Ok((id, rx))
    }

    /// Idempotent detach, called on any disconnect path.
    pub fn unsubscribe(&self, id: u64) {
        self.hub.unsubscribe(id);
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        self.store.read().await.snapshot(self.config.snapshot_depth)
    }

    pub async fn metrics(&self) -> AggregateMetrics {
        self.store.read().await.metrics()
    }

    pub fn health(&self) -> Health {
        Health {
            status: "ok",
            clients: self.hub.subscriber_count(),
            uptime: self.started_at.elapsed().as_secs_f64(),
        }
    }

    pub fn hub_stats(&self) -> HubStats {
        self.hub.stats()
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}
