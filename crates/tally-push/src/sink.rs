//! Record sinks
//!
//! Backends serialize snapshots into wire records and hand each batch to a
//! [`RecordSink`]. Network transport (HTTP clients, SDKs, auth) lives behind
//! this trait, outside the crate.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

/// Destination for batches of wire records
#[async_trait]
pub trait RecordSink<R>: Send + Sync
where
    R: Send + Sync,
{
    /// Send one batch. The batch never exceeds the backend's batch size.
    async fn send(&self, batch: &[R]) -> anyhow::Result<()>;
}

/// Keeps every batch in memory
#[derive(Debug)]
pub struct InMemorySink<R> {
    batches: Mutex<Vec<Vec<R>>>,
}

impl<R: Clone> InMemorySink<R> {
    pub fn new() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
        }
    }

    /// Batches received so far, in order
    pub fn batches(&self) -> Vec<Vec<R>> {
        self.batches.lock().clone()
    }

    /// All records received so far, flattened
    pub fn records(&self) -> Vec<R> {
        self.batches.lock().iter().flatten().cloned().collect()
    }

    pub fn clear(&self) {
        self.batches.lock().clear();
    }
}

impl<R: Clone> Default for InMemorySink<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R> RecordSink<R> for InMemorySink<R>
where
    R: Clone + Send + Sync,
{
    async fn send(&self, batch: &[R]) -> anyhow::Result<()> {
        self.batches.lock().push(batch.to_vec());
        Ok(())
    }
}

/// Writes every record to the log as JSON at `info`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl<R> RecordSink<R> for TracingSink
where
    R: Serialize + Send + Sync,
{
    async fn send(&self, batch: &[R]) -> anyhow::Result<()> {
        for record in batch {
            let json = serde_json::to_string(record)?;
            info!(target: "tally::sink", record = %json, "Metric record");
        }
        Ok(())
    }
}
