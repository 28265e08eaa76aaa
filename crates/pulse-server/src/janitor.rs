//! Hourly pruning of the in-memory sample buffers.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::monitor::PerformanceMonitor;
use crate::query::QueryInstrumentation;
use crate::tasks::{TaskHandle, spawn_periodic};

/// Samples removed by one janitor pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub requests: usize,
    pub queries: usize,
}

/// Prunes request samples (age, then cap) and query samples (age).
pub struct Janitor {
    monitor: Arc<PerformanceMonitor>,
    queries: Arc<QueryInstrumentation>,
    query_max_age: Duration,
}

impl Janitor {
    pub fn new(
        monitor: Arc<PerformanceMonitor>,
        queries: Arc<QueryInstrumentation>,
        query_max_age: Duration,
    ) -> Self {
        Self {
            monitor,
            queries,
            query_max_age,
        }
    }

    /// Runs one pruning pass now.
    pub fn run_once(&self) -> PruneReport {
        let report = PruneReport {
            requests: self.monitor.cleanup(),
            queries: self.queries.cleanup_old_metrics(self.query_max_age),
        };

        info!(
            requests = report.requests,
            queries = report.queries,
            "Janitor pass completed"
        );
        report
    }

    /// Starts pruning every `interval`.
    ///
    /// Returns a handle that stops the janitor when stopped or dropped.
    pub fn start(self, interval: Duration) -> TaskHandle {
        spawn_periodic("janitor", interval, move || {
            self.run_once();
        })
    }
}
