use chrono::{DateTime, Utc};

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// `20240131_235959_utc`, used for snapshot and replaced-deployment names.
pub fn stamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d_%H%M%S_utc").to_string()
}
