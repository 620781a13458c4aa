//! Partitioned worker pool for parallel matching.
//!
//! Reports are routed to a worker by a hash of the vehicle id, so all
//! fixes of one vehicle are processed in order on one thread while
//! different vehicles match fully in parallel. There is no cancellation
//! for an in-flight match; fixes arrive faster than cancelling would
//! ever help.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::mpsc;
use std::thread::JoinHandle;

use tracing::debug;

use crate::avl::AvlReport;

use super::MatchingEngine;
use std::sync::Arc;

pub struct MatchDispatcher {
    senders: Vec<mpsc::Sender<AvlReport>>,
    handles: Vec<JoinHandle<()>>,
}

impl MatchDispatcher {
    /// Spawn the configured number of matching threads over the engine.
    pub fn start(engine: Arc<MatchingEngine>) -> Self {
        let workers = engine.params().worker_count;
        Self::with_workers(engine, workers)
    }

    /// Spawn `workers` matching threads over the engine.
    pub fn with_workers(engine: Arc<MatchingEngine>, workers: usize) -> Self {
        let workers = workers.max(1);
        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for worker in 0..workers {
            let (sender, receiver) = mpsc::channel::<AvlReport>();
            let engine = engine.clone();
            let handle = std::thread::spawn(move || {
                while let Ok(report) = receiver.recv() {
                    engine.match_report(report);
                }
                debug!(worker, "matching worker stopped");
            });
            senders.push(sender);
            handles.push(handle);
        }

        Self { senders, handles }
    }

    /// Queue a report on the worker owning its vehicle.
    pub fn submit(
        &self,
        report: AvlReport,
    ) -> std::result::Result<(), mpsc::SendError<AvlReport>> {
        let mut hasher = DefaultHasher::new();
        report.vehicle_id.as_str().hash(&mut hasher);
        let shard = (hasher.finish() % self.senders.len() as u64) as usize;
        self.senders[shard].send(report)
    }

    /// Stop accepting reports, drain the queues, and join the workers.
    pub fn shutdown(self) {
        drop(self.senders);
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}
