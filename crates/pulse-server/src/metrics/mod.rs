//! Prometheus exporter setup.

mod setup;

pub use setup::{HISTOGRAM_BUCKETS, init_metrics};
