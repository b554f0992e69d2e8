//! Background chunk flushes
//!
//! Partial chunks are written on spawned tasks so paging never waits on
//! storage. Every task is joined before the session's final flush.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, error, warn};
use tokio::task::{Id, JoinError, JoinSet};

use crate::lead::{Lead, RawLead, normalize_lead};
use crate::persistence::{MergeReport, PersistenceGateway, PersistenceResult};

/// Normalize a drained chunk into storable leads.
#[must_use]
pub fn normalize_chunk(chunk: &[RawLead]) -> Vec<Lead> {
    chunk.iter().map(normalize_lead).collect()
}

/// Running totals over every flush the scheduler dispatched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushTally {
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub leads_saved: usize,
    pub leads_lost: usize,
}

struct FlushDone {
    chunk: usize,
    size: usize,
    result: PersistenceResult<MergeReport>,
}

/// Dispatches non-final merges for one location and accounts for them.
pub struct FlushScheduler {
    gateway: Arc<dyn PersistenceGateway>,
    location: String,
    tasks: JoinSet<FlushDone>,
    pending: HashMap<Id, usize>,
    tally: FlushTally,
}

impl FlushScheduler {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, location: impl Into<String>) -> Self {
        Self {
            gateway,
            location: location.into(),
            tasks: JoinSet::new(),
            pending: HashMap::new(),
            tally: FlushTally::default(),
        }
    }

    /// Spawn a partial merge of `chunk`.
    pub fn dispatch(&mut self, chunk: Vec<RawLead>) {
        self.tally.dispatched += 1;
        let id = self.tally.dispatched;
        let size = chunk.len();
        let gateway = Arc::clone(&self.gateway);
        let location = self.location.clone();

        debug!("[{location}] dispatching chunk {id} ({size} leads)");

        let handle = self.tasks.spawn(async move {
            let leads = normalize_chunk(&chunk);
            drop(chunk);
            let result = gateway.merge_chunk(&location, leads, false).await;
            FlushDone {
                chunk: id,
                size,
                result,
            }
        });
        self.pending.insert(handle.id(), size);
    }

    /// Account for flushes that already finished, without waiting.
    pub fn collect_finished(&mut self) -> FlushTally {
        while let Some(joined) = self.tasks.try_join_next_with_id() {
            self.record(joined);
        }
        self.tally
    }

    /// Wait for every outstanding flush.
    pub async fn wait_all(&mut self) -> FlushTally {
        while let Some(joined) = self.tasks.join_next_with_id().await {
            self.record(joined);
        }
        self.tally
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    fn record(&mut self, joined: Result<(Id, FlushDone), JoinError>) {
        match joined {
            Ok((id, done)) => {
                self.pending.remove(&id);
                match done.result {
                    Ok(report) => {
                        self.tally.succeeded += 1;
                        self.tally.leads_saved += report.appended;
                        debug!(
                            "[{}] chunk {} saved ({} leads, {} stored)",
                            self.location, done.chunk, report.appended, report.total
                        );
                    }
                    Err(e) => {
                        self.tally.failed += 1;
                        self.tally.leads_lost += done.size;
                        error!(
                            "[{}] chunk {} of {} leads failed to save: {e}",
                            self.location, done.chunk, done.size
                        );
                    }
                }
            }
            Err(join_error) => {
                let size = self.pending.remove(&join_error.id()).unwrap_or(0);
                self.tally.failed += 1;
                self.tally.leads_lost += size;
                warn!(
                    "[{}] flush task for {size} leads did not finish: {join_error}",
                    self.location
                );
            }
        }
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        if !self.tasks.is_empty() {
            warn!(
                "[{}] dropping {} unfinished flush task(s)",
                self.location,
                self.tasks.len()
            );
        }
    }
}
