//! L8 Observability Fan-out: a bounded, non-blocking usage queue batched by
//! size or interval and flushed to the analytics sink.

use crate::gateway::config::ObservabilityConfig;
use crate::gateway::model::UsageRecord;
use crate::logging::log_warn;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Where flushed batches of usage rows ultimately land. The warehouse and
/// analytics pipeline are external collaborators; this trait is the seam.
#[async_trait::async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn flush(&self, rows: Vec<UsageRecord>);
}

/// In-memory sink used for tests and local runs; retains everything flushed.
#[derive(Debug, Default)]
pub struct InMemoryAnalyticsSink {
    rows: std::sync::Mutex<Vec<UsageRecord>>,
}

impl InMemoryAnalyticsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<UsageRecord> {
        std::mem::take(&mut self.rows.lock().unwrap())
    }
}

#[async_trait::async_trait]
impl AnalyticsSink for InMemoryAnalyticsSink {
    async fn flush(&self, mut rows: Vec<UsageRecord>) {
        self.rows.lock().unwrap().append(&mut rows);
    }
}

/// Producer handle into the bounded usage queue. Cloned into every request
/// handler; `enqueue` never blocks the hot path.
#[derive(Clone)]
pub struct UsageQueue {
    sender: mpsc::Sender<UsageRecord>,
    dropped: Arc<AtomicU64>,
}

impl UsageQueue {
    /// Enqueues a usage row. On a full queue the row is dropped and a
    /// warning counter is incremented; the hot path is never stalled.
    pub fn enqueue(&self, row: UsageRecord) {
        if self.sender.try_send(row).is_err() {
            let total_dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            log_warn!(
                total_dropped,
                "usage queue full, dropping row; analytics may undercount"
            );
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Spawns the background flush task and returns a producer handle.
/// Batches by `batch_size` rows or `batch_interval_ms`, whichever comes
/// first.
pub fn spawn(config: ObservabilityConfig, sink: Arc<dyn AnalyticsSink>) -> UsageQueue {
    let (sender, mut receiver) = mpsc::channel(config.max_in_flight);
    let dropped = Arc::new(AtomicU64::new(0));

    tokio::spawn(async move {
        let mut batch = Vec::with_capacity(config.batch_size);
        let mut interval = tokio::time::interval(Duration::from_millis(config.batch_interval_ms));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                maybe_row = receiver.recv() => {
                    match maybe_row {
                        Some(row) => {
                            batch.push(row);
                            if batch.len() >= config.batch_size {
                                sink.flush(std::mem::take(&mut batch)).await;
                            }
                        }
                        None => {
                            if !batch.is_empty() {
                                sink.flush(std::mem::take(&mut batch)).await;
                            }
                            break;
                        }
                    }
                }
                _ = interval.tick() => {
                    if !batch.is_empty() {
                        sink.flush(std::mem::take(&mut batch)).await;
                    }
                }
            }
        }
    });

    UsageQueue { sender, dropped }
}
