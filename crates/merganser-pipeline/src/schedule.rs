//! Daily schedule arithmetic.
//!
//! The pipeline runs once per UTC day with catch-up disabled: the runner
//! always computes the boundary from the current clock, so missed
//! intervals collapse into the single most recent run.

use chrono::{DateTime, Days, NaiveTime, Utc};

/// The next UTC-midnight run boundary strictly after `after`.
pub fn next_daily_run(after: DateTime<Utc>) -> DateTime<Utc> {
  (after.date_naive() + Days::new(1))
    .and_time(NaiveTime::MIN)
    .and_utc()
}
