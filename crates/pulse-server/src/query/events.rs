//! Query-execution events pushed by the data-access layer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::QueryInstrumentation;

/// Buffered events before senders start waiting.
const EVENT_BUFFER: usize = 1024;

/// One executed query, as reported by the database driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryEvent {
    pub query_text: String,
    pub duration_ms: f64,
    #[serde(default)]
    pub rows_affected: u64,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl QueryEvent {
    pub fn new(query_text: impl Into<String>, duration_ms: f64) -> Self {
        Self {
            query_text: query_text.into(),
            duration_ms,
            rows_affected: 0,
            user_id: None,
        }
    }

    pub fn with_rows(mut self, rows_affected: u64) -> Self {
        self.rows_affected = rows_affected;
        self
    }
}

impl QueryInstrumentation {
    /// Starts a task that records every event sent on the returned channel.
    ///
    /// The task ends once every sender has been dropped.
    pub fn spawn_listener(self: &Arc<Self>) -> (mpsc::Sender<QueryEvent>, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<QueryEvent>(EVENT_BUFFER);
        let instrumentation = Arc::clone(self);

        let handle = tokio::spawn(async move {
            debug!("Query event listener started");
            let mut received = 0u64;

            while let Some(event) = rx.recv().await {
                instrumentation.record_query(
                    &event.query_text,
                    event.duration_ms,
                    event.rows_affected,
                    event.user_id.as_deref(),
                );
                received += 1;
            }

            info!(events = received, "Query event listener stopped");
        });

        (tx, handle)
    }
}
