//! Wall-clock helpers.

use std::time::SystemTime;

use chrono::{DateTime, Utc};

/// Current UTC time; every record timestamp goes through here.
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert a filesystem timestamp to UTC.
#[must_use]
pub fn from_system_time(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

/// The Unix epoch, used as the sort key of unreadable records.
#[must_use]
pub const fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}
