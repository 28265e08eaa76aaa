//! Process and host resource sampling.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use sysinfo::{
    CpuRefreshKind, MemoryRefreshKind, Pid, ProcessesToUpdate, RefreshKind, System,
};
use tracing::debug;

use pulse_core::MemorySnapshot;

/// Memory figures plus process CPU usage, as of one refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProcessReading {
    pub memory: MemorySnapshot,
    pub cpu_percent: f32,
}

/// Reads memory, CPU and load figures for this process and its host.
///
/// One probe is shared by the request middleware, the health check and the
/// resource monitor. Only [`refresh`](Self::refresh) touches the OS, behind a
/// mutex; the request path reads the cached [`latest`](Self::latest) value,
/// which the resource monitor keeps current.
pub struct ProcessProbe {
    system: Mutex<System>,
    latest: RwLock<ProcessReading>,
    refreshes: AtomicU64,
    pid: Option<Pid>,
    cpu_count: usize,
    started: Instant,
}

impl ProcessProbe {
    pub fn new() -> Self {
        let refresh_kind = RefreshKind::new()
            .with_cpu(CpuRefreshKind::new())
            .with_memory(MemoryRefreshKind::everything());
        let system = System::new_with_specifics(refresh_kind);
        let cpu_count = system.cpus().len().max(1);

        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                debug!(error = e, "Process sampling unavailable on this platform");
                None
            },
        };

        let probe = Self {
            system: Mutex::new(system),
            latest: RwLock::new(ProcessReading::default()),
            refreshes: AtomicU64::new(0),
            pid,
            cpu_count,
            started: Instant::now(),
        };
        probe.refresh();
        probe
    }

    /// Reads fresh figures from the OS and caches them.
    pub fn refresh(&self) -> ProcessReading {
        let reading = self.read_system();
        *self.latest.write() = reading;
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        reading
    }

    /// The figures cached by the last refresh. No OS calls.
    pub fn latest(&self) -> ProcessReading {
        *self.latest.read()
    }

    /// How many refreshes ran since the probe was created.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    fn read_system(&self) -> ProcessReading {
        let mut system = self.system.lock();
        system.refresh_memory();

        let mut snapshot = MemorySnapshot {
            system_used_bytes: system.used_memory(),
            system_total_bytes: system.total_memory(),
            ..MemorySnapshot::default()
        };
        let mut cpu = 0.0;

        if let Some(pid) = self.pid {
            system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
            if let Some(process) = system.process(pid) {
                snapshot.rss_bytes = process.memory();
                snapshot.virtual_bytes = process.virtual_memory();
                cpu = process.cpu_usage();
            }
        }

        ProcessReading {
            memory: snapshot,
            cpu_percent: cpu,
        }
    }

    /// One-minute load average relative to the logical CPU count, in percent.
    pub fn load_percent(&self) -> f64 {
        System::load_average().one / self.cpu_count as f64 * 100.0
    }

    pub fn cpu_count(&self) -> usize {
        self.cpu_count
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for ProcessProbe {
    fn default() -> Self {
        Self::new()
    }
}
