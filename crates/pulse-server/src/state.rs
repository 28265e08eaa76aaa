//! Application state.

use std::sync::Arc;

use pulse_cache::CacheClient;

use crate::monitor::{PerformanceMonitor, ProcessProbe, ResourceMonitor};
use crate::query::QueryInstrumentation;
use crate::settings::Settings;

/// Application state shared across all handlers.
///
/// Each service is built once per process and shared by reference.
#[derive(Clone)]
pub struct AppState {
    pub cache: CacheClient,
    pub queries: Arc<QueryInstrumentation>,
    pub monitor: Arc<PerformanceMonitor>,
    pub resources: Arc<ResourceMonitor>,
}

impl AppState {
    /// Wires every service from settings around an already created cache client.
    pub fn from_settings(settings: &Settings, cache: CacheClient) -> Self {
        let probe = Arc::new(ProcessProbe::new());

        Self {
            queries: Arc::new(QueryInstrumentation::new(
                cache.clone(),
                settings.query.to_config(),
            )),
            monitor: Arc::new(PerformanceMonitor::new(
                settings.monitor.to_config(),
                Arc::clone(&probe),
                cache.clone(),
            )),
            resources: Arc::new(ResourceMonitor::new(probe, settings.resources.to_config())),
            cache,
        }
    }
}
