//! Periodic resource checks with bounded alert history.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::warn;

use pulse_core::{MemorySnapshot, Ring};

use super::ProcessProbe;
use crate::tasks::{TaskHandle, spawn_periodic};

/// Configuracion del monitor de recursos.
#[derive(Debug, Clone)]
pub struct ResourceConfig {
    /// Porcentaje de memoria que dispara una alerta (default: 80)
    pub memory_threshold_percent: f64,
    /// Carga normalizada que dispara una alerta (default: 80)
    pub load_threshold_percent: f64,
    /// Alertas retenidas por tipo (default: 50)
    pub alert_capacity: usize,
    /// Presupuesto de memoria del proceso. `None` mide el host.
    pub memory_limit_bytes: Option<u64>,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            memory_threshold_percent: 80.0,
            load_threshold_percent: 80.0,
            alert_capacity: 50,
            memory_limit_bytes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryAlert {
    pub timestamp: DateTime<Utc>,
    pub usage_percent: f64,
    /// The budget `usage_percent` was measured against; absent for host memory.
    pub limit_bytes: Option<u64>,
    pub usage: MemorySnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadAlert {
    pub timestamp: DateTime<Utc>,
    /// One-minute load over logical CPUs, in percent.
    pub usage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAlerts {
    pub memory_alerts: Vec<MemoryAlert>,
    pub cpu_alerts: Vec<LoadAlert>,
}

/// Samples memory and load on an interval and keeps the latest alerts.
pub struct ResourceMonitor {
    probe: Arc<ProcessProbe>,
    config: ResourceConfig,
    memory_alerts: Mutex<Ring<MemoryAlert>>,
    cpu_alerts: Mutex<Ring<LoadAlert>>,
}

impl ResourceMonitor {
    pub fn new(probe: Arc<ProcessProbe>, config: ResourceConfig) -> Self {
        Self {
            memory_alerts: Mutex::new(Ring::new(config.alert_capacity)),
            cpu_alerts: Mutex::new(Ring::new(config.alert_capacity)),
            probe,
            config,
        }
    }

    /// Memory usage in percent: process RSS against the configured limit,
    /// or host used against host total when there is none.
    pub fn memory_usage_percent(&self, usage: &MemorySnapshot) -> f64 {
        match self.config.memory_limit_bytes {
            Some(limit) => usage.rss_percent_of(limit),
            None => usage.system_usage_percent(),
        }
    }

    /// Records an alert if memory usage is above the threshold.
    pub fn check_memory(&self, usage: MemorySnapshot) -> Option<MemoryAlert> {
        let percent = self.memory_usage_percent(&usage);
        if percent <= self.config.memory_threshold_percent {
            return None;
        }

        warn!(
            usage_percent = %format_args!("{percent:.2}"),
            rss_mb = usage.rss_bytes / 1024 / 1024,
            limit_mb = self.config.memory_limit_bytes.map(|b| b / 1024 / 1024),
            "High memory usage"
        );
        counter!("pulse_resource_alerts_total", "kind" => "memory").increment(1);

        let alert = MemoryAlert {
            timestamp: Utc::now(),
            usage_percent: percent,
            limit_bytes: self.config.memory_limit_bytes,
            usage,
        };
        self.memory_alerts.lock().push(alert.clone());
        Some(alert)
    }

    /// Records an alert if load relative to CPU count is above the threshold.
    pub fn check_load(&self, load_percent: f64) -> Option<LoadAlert> {
        if load_percent <= self.config.load_threshold_percent {
            return None;
        }

        warn!(usage_percent = %format_args!("{load_percent:.2}"), "High CPU usage");
        counter!("pulse_resource_alerts_total", "kind" => "cpu").increment(1);

        let alert = LoadAlert {
            timestamp: Utc::now(),
            usage: load_percent,
        };
        self.cpu_alerts.lock().push(alert.clone());
        Some(alert)
    }

    /// Refreshes the shared probe and checks both thresholds.
    pub fn sample(&self) {
        let reading = self.probe.refresh();
        self.check_memory(reading.memory);
        self.check_load(self.probe.load_percent());
    }

    /// Samples every `interval` until the handle is stopped or dropped.
    pub fn start(self: &Arc<Self>, interval: Duration) -> TaskHandle {
        let monitor = Arc::clone(self);
        spawn_periodic("resource-monitor", interval, move || monitor.sample())
    }

    pub fn alerts(&self) -> ResourceAlerts {
        ResourceAlerts {
            memory_alerts: self.memory_alerts.lock().iter().cloned().collect(),
            cpu_alerts: self.cpu_alerts.lock().iter().cloned().collect(),
        }
    }
}
