//! Sample types recorded by the instrumentation services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::signature::QuerySignature;

/// One executed query, as observed by the query instrumentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySample {
    /// Hash of the normalized query text.
    pub signature: QuerySignature,
    /// The query text exactly as it was executed (or the cache key for
    /// computed results).
    pub raw_text: String,
    pub duration_ms: f64,
    pub rows_affected: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl QuerySample {
    /// Creates a sample stamped with the current time.
    pub fn new(raw_text: impl Into<String>, duration_ms: f64, rows_affected: u64) -> Self {
        let raw_text = raw_text.into();
        Self {
            signature: QuerySignature::of(&raw_text),
            raw_text,
            duration_ms,
            rows_affected,
            timestamp: Utc::now(),
            user_id: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Process memory at a point in time, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySnapshot {
    /// Resident set size of this process.
    pub rss_bytes: u64,
    pub virtual_bytes: u64,
    /// Host memory in use.
    pub system_used_bytes: u64,
    pub system_total_bytes: u64,
}

impl MemorySnapshot {
    /// Host memory usage as a percentage, `0.0` when the total is unknown.
    pub fn system_usage_percent(&self) -> f64 {
        if self.system_total_bytes == 0 {
            0.0
        } else {
            self.system_used_bytes as f64 / self.system_total_bytes as f64 * 100.0
        }
    }

    /// Resident memory of this process against `limit_bytes`, in percent.
    /// `0.0` for a zero limit.
    pub fn rss_percent_of(&self, limit_bytes: u64) -> f64 {
        if limit_bytes == 0 {
            0.0
        } else {
            self.rss_bytes as f64 / limit_bytes as f64 * 100.0
        }
    }
}

/// Process CPU usage around a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuSnapshot {
    pub start_percent: f32,
    pub end_percent: f32,
}

impl CpuSnapshot {
    pub fn delta_percent(&self) -> f32 {
        self.end_percent - self.start_percent
    }
}

/// One completed HTTP request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSample {
    /// Matched route template, or the raw path when no route matched.
    pub endpoint: String,
    pub method: String,
    pub duration_ms: f64,
    pub status_code: u16,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub memory: MemorySnapshot,
    pub cpu: CpuSnapshot,
}

impl RequestSample {
    /// Creates a sample stamped with the current time and empty resource snapshots.
    pub fn new(
        method: impl Into<String>,
        endpoint: impl Into<String>,
        status_code: u16,
        duration_ms: f64,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: method.into(),
            duration_ms,
            status_code,
            timestamp: Utc::now(),
            user_agent: None,
            ip: None,
            user_id: None,
            memory: MemorySnapshot::default(),
            cpu: CpuSnapshot::default(),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Responses with status 400 or above count as errors.
    pub fn is_error(&self) -> bool {
        self.status_code >= 400
    }
}
