//! Pulse Core - Sample types and aggregation primitives
//!
//! This crate provides the I/O-free building blocks shared by the cache
//! client and the observability services: bounded rings, nearest-rank
//! percentiles and stable query signatures.

pub mod ring;
pub mod signature;
pub mod stats;
pub mod time;
pub mod types;

pub use ring::Ring;
pub use signature::{QuerySignature, normalize_query};
pub use stats::{mean, percentile, ratio_percent, round2};
pub use time::cutoff;
pub use types::{CpuSnapshot, MemorySnapshot, QuerySample, RequestSample};

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

    #[test]
    fn version_is_semver() {
        let v = version();
        assert_eq!(v.split('.').count(), 3, "Version should be semver");
    }
}
