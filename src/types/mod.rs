pub mod money;
pub mod period;

pub use money::{Cents, checked_sum};
pub use period::{Period, PeriodBounds, TrendGranularity};

use chrono::{Local, NaiveDateTime, Timelike};

/// Local wall-clock time truncated to whole seconds, the resolution timestamps are stored at.
pub fn local_now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}
