//! Request extractors.

pub mod query;

pub use query::{LimitQuery, WindowQuery};
