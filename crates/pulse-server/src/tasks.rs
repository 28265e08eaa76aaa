//! Periodic background tasks.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, info, warn};

/// Shortest period a task may tick at.
pub const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Handle for controlling a running periodic task.
///
/// Dropping the handle stops the task.
pub struct TaskHandle {
    name: &'static str,
    /// Sender to signal shutdown.
    shutdown_tx: watch::Sender<bool>,
    join: Option<JoinHandle<()>>,
}

impl TaskHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Signals the task to stop after its current tick.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Stops the task and waits for it to finish.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Runs `tick` every `period`, first one `period` from now.
///
/// Periods below [`MIN_PERIOD`] are raised to it.
pub fn spawn_periodic<F>(name: &'static str, period: Duration, mut tick: F) -> TaskHandle
where
    F: FnMut() + Send + 'static,
{
    let period = if period < MIN_PERIOD {
        warn!(task = name, requested_ms = period.as_millis() as u64, "Task period too short, using 1s");
        MIN_PERIOD
    } else {
        period
    };

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let join = tokio::spawn(async move {
        let mut timer = interval_at(Instant::now() + period, period);
        info!(task = name, period_secs = period.as_secs(), "Background task started");

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    debug!(task = name, "Background task tick");
                    tick();
                }
                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        info!(task = name, "Background task shutting down");
                        break;
                    }
                }
            }
        }
    });

    TaskHandle {
        name,
        shutdown_tx,
        join: Some(join),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_after_each_period() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let handle = spawn_periodic("test", Duration::from_secs(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_ticking() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let handle = spawn_periodic("test", Duration::from_secs(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        handle.shutdown().await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(ticks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_period_is_raised_to_minimum() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let handle = spawn_periodic("janitor", Duration::ZERO, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(5500)).await;

        assert!(!handle.is_finished());
        assert_eq!(ticks.load(Ordering::SeqCst), 5);
        handle.shutdown().await;
    }
}
