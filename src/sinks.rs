// =============================================================================
// Snapshot sinks — independent, at-most-once-per-cycle consumers
// =============================================================================
//
// The coordinator hands every emitted AggregateSnapshot to each registered
// sink exactly once.  A sink failure is the sink's problem: the coordinator
// logs it and moves on, and no sink can delay or roll back a cycle.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

use crate::snapshot::AggregateSnapshot;

/// Consumer of finished aggregate snapshots.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn publish(&self, snapshot: &AggregateSnapshot) -> Result<()>;
}

// =============================================================================
// SnapshotCache
// =============================================================================

/// In-memory cache of the most recent aggregate, read by API-layer consumers.
/// A version counter lets pollers detect fresh data without comparing
/// payloads.
pub struct SnapshotCache {
    latest: RwLock<Option<Arc<AggregateSnapshot>>>,
    version: AtomicU64,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self {
            latest: RwLock::new(None),
            version: AtomicU64::new(0),
        }
    }

    /// Latest published aggregate, if any cycle has completed.
    pub fn latest(&self) -> Option<Arc<AggregateSnapshot>> {
        self.latest.read().clone()
    }

    /// Monotonic counter, bumped on every publish.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotSink for SnapshotCache {
    fn name(&self) -> &'static str {
        "cache"
    }

    async fn publish(&self, snapshot: &AggregateSnapshot) -> Result<()> {
        *self.latest.write() = Some(Arc::new(snapshot.clone()));
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(version, cycle_seq = snapshot.cycle_seq, "snapshot cached");
        Ok(())
    }
}

// =============================================================================
// JsonlPersistence
// =============================================================================

/// Appends one JSON line per aggregate to a file.  The write is flushed
/// before `publish` returns; a failed write is reported to the coordinator,
/// which logs it and does not retry.
pub struct JsonlPersistence {
    path: PathBuf,
}

impl JsonlPersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SnapshotSink for JsonlPersistence {
    fn name(&self) -> &'static str {
        "persistence"
    }

    async fn publish(&self, snapshot: &AggregateSnapshot) -> Result<()> {
        let line = serde_json::to_string(snapshot).context("failed to serialise snapshot")?;

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;

        writeln!(file, "{line}")
            .and_then(|_| file.flush())
            .with_context(|| format!("failed to append to {}", self.path.display()))?;

        debug!(path = %self.path.display(), cycle_seq = snapshot.cycle_seq, "snapshot persisted");
        Ok(())
    }
}

// =============================================================================
// DashboardFeed
// =============================================================================

/// Fire-and-forget push feed.  Receivers that lag are dropped by the
/// broadcast channel; publishing with no receivers is not an error.
pub struct DashboardFeed {
    tx: broadcast::Sender<Arc<AggregateSnapshot>>,
}

impl DashboardFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<AggregateSnapshot>> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl SnapshotSink for DashboardFeed {
    fn name(&self) -> &'static str {
        "dashboard"
    }

    async fn publish(&self, snapshot: &AggregateSnapshot) -> Result<()> {
        // Err here only means nobody is listening.
        let _ = self.tx.send(Arc::new(snapshot.clone()));
        Ok(())
    }
}
