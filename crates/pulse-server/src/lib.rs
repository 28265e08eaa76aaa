//! Pulse Server - HTTP performance monitoring and query instrumentation.
//!
//! Wires the [`pulse_cache::CacheClient`] into three services shared through
//! [`AppState`]:
//!
//! - [`QueryInstrumentation`]: per-signature latency rings, slow queries,
//!   pattern analysis, index suggestions and cache-aside helpers.
//! - [`PerformanceMonitor`]: request samples recorded by middleware, endpoint
//!   percentiles, health check and reports.
//! - [`ResourceMonitor`]: periodic memory and load checks with bounded alert
//!   history.
//!
//! A [`Janitor`] prunes the in-memory buffers in the background.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod janitor;
pub mod metrics;
pub mod middleware;
pub mod monitor;
pub mod query;
pub mod server;
pub mod settings;
pub mod state;
pub mod tasks;

pub use error::AppError;
pub use janitor::{Janitor, PruneReport};
pub use monitor::{
    EndpointStats, HealthReport, HealthStatus, MonitorConfig, PerformanceMonitor,
    PerformanceReport, ProcessProbe, ResourceAlerts, ResourceConfig, ResourceMonitor,
};
pub use query::{
    IndexSuggestion, Page, PageData, QueryConfig, QueryEvent, QueryInstrumentation,
    QueryPerformanceReport,
};
pub use server::{create_router, run_server};
pub use settings::{CacheBackend, Settings, SettingsError};
pub use state::AppState;
pub use tasks::TaskHandle;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_defined() {
        assert!(!version().is_empty());
    }
}
