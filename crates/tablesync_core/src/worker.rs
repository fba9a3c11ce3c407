//! Asynchronous index worker.
//!
//! Consumes change messages from a [`ChangeFeed`](crate::ChangeFeed)
//! subscription. UPDATE and CREATE rebuild the index, retrying retryable
//! failures with backoff; DELETE drops the index and its status row.

use crate::builder::BuildOutcome;
use crate::change_feed::ChangeEvent;
use crate::config::RetryConfig;
use crate::error::IndexResult;
use crate::notify::{ChangeMessage, ChangeType};
use crate::service::TableIndexService;
use serde::Serialize;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, warn};

/// Counters from one [`IndexWorker::run_until_idle`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerReport {
    /// Messages consumed.
    pub processed: usize,
    /// Indices rebuilt and marked AVAILABLE.
    pub built: usize,
    /// Messages that needed no work.
    pub up_to_date: usize,
    /// Builds whose completion lost to a newer reset.
    pub superseded: usize,
    /// Deleted objects purged.
    pub purged: usize,
    /// Messages that failed after all retries.
    pub failed: usize,
}

/// Processes change messages for one service.
pub struct IndexWorker {
    service: Arc<TableIndexService>,
    events: Receiver<ChangeEvent>,
    retry: RetryConfig,
}

impl IndexWorker {
    /// Creates a worker reading from `events`.
    pub fn new(service: Arc<TableIndexService>, events: Receiver<ChangeEvent>, retry: RetryConfig) -> Self {
        Self {
            service,
            events,
            retry,
        }
    }

    /// Handles every message currently queued, then returns.
    pub fn run_until_idle(&self) -> WorkerReport {
        let mut report = WorkerReport::default();
        while let Ok(event) = self.events.try_recv() {
            report.processed += 1;
            debug!(sequence = event.sequence, "handling change event");
            match self.handle(&event.message) {
                Ok(Handled::Built) => report.built += 1,
                Ok(Handled::UpToDate) => report.up_to_date += 1,
                Ok(Handled::Superseded) => report.superseded += 1,
                Ok(Handled::Purged) => report.purged += 1,
                Err(err) => {
                    error!(
                        object_id = %event.message.object_id,
                        error = %err,
                        "giving up on change message"
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }

    fn handle(&self, message: &ChangeMessage) -> IndexResult<Handled> {
        match message.change_type {
            ChangeType::Create | ChangeType::Update => {
                match self.build_with_retry(message)? {
                    BuildOutcome::Built { .. } => Ok(Handled::Built),
                    BuildOutcome::UpToDate => Ok(Handled::UpToDate),
                    BuildOutcome::Superseded => Ok(Handled::Superseded),
                }
            }
            ChangeType::Delete => {
                self.service.purge_deleted(&message.object_id)?;
                Ok(Handled::Purged)
            }
        }
    }

    fn build_with_retry(&self, message: &ChangeMessage) -> IndexResult<BuildOutcome> {
        let timeout = self.service.config().lock_timeout;
        let mut attempt = 1;
        loop {
            match self
                .service
                .create_or_update_index(&message.object_id, timeout)
            {
                Ok(outcome) => return Ok(outcome),
                Err(err) if err.is_retryable() && self.retry.allows_retry(attempt) => {
                    let delay = self.retry.delay_after(attempt, &err);
                    warn!(
                        object_id = %message.object_id,
                        attempt,
                        ?delay,
                        error = %err,
                        "retrying index build"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

enum Handled {
    Built,
    UpToDate,
    Superseded,
    Purged,
}
