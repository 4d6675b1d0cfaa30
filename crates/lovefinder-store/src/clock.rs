//! Server-assigned timestamps.
//!
//! Every write that carries a `ServerTimestamp` sentinel is stamped from a
//! per-store clock that never repeats a value, so ordering a collection by
//! a server timestamp is total. Timestamps are stored as fixed-width RFC 3339
//! strings with microsecond precision, which sort lexicographically in time
//! order.

use std::sync::Mutex;

use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};

#[derive(Debug)]
pub struct ServerClock {
    last: Mutex<DateTime<Utc>>,
}

impl ServerClock {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(DateTime::<Utc>::MIN_UTC),
        }
    }

    /// A clock that never hands out a value at or before `last`, for stores
    /// reopened over existing data.
    pub fn resume_after(last: DateTime<Utc>) -> Self {
        Self {
            last: Mutex::new(last),
        }
    }

    /// Next timestamp, strictly greater than any previously returned.
    pub fn tick(&self) -> DateTime<Utc> {
        let now = Utc::now().trunc_subsecs(6);
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let next = if now > *last {
            now
        } else {
            *last + Duration::microseconds(1)
        };
        *last = next;
        next
    }
}

impl Default for ServerClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical string form of a stored timestamp.
pub fn encode(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp back.
pub fn decode(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
