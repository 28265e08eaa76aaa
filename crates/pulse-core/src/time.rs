//! Age cutoffs for pruning and windowed statistics.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// The instant `window` before `now`.
///
/// Windows too large to represent saturate to the earliest representable
/// instant, so everything is inside them.
///
/// ```
/// use std::time::Duration;
/// use chrono::Utc;
/// use pulse_core::cutoff;
///
/// let now = Utc::now();
/// assert_eq!((now - cutoff(now, Duration::from_secs(60))).num_seconds(), 60);
/// ```
pub fn cutoff(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(window)
        .ok()
        .and_then(|delta| now.checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
