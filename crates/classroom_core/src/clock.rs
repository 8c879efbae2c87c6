//! crates/classroom_core/src/clock.rs
//!
//! Converts instants into the reference timezone every participant shares, so
//! "today" and "now" do not depend on where a browser happens to be.

use crate::domain::DateKey;
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::Tz;

/// Local calendar facts about one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockReading {
    pub date_key: DateKey,
    pub minute_of_day: u16,
    pub weekday: Weekday,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    tz: Tz,
}

impl SessionClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn reading(&self, at: DateTime<Utc>) -> ClockReading {
        let local = at.with_timezone(&self.tz);
        ClockReading {
            date_key: DateKey::new(local.date_naive()),
            minute_of_day: (local.hour() * 60 + local.minute()) as u16,
            weekday: local.weekday(),
        }
    }

    pub fn date_key(&self, at: DateTime<Utc>) -> DateKey {
        self.reading(at).date_key
    }

    pub fn minute_of_day(&self, at: DateTime<Utc>) -> u16 {
        self.reading(at).minute_of_day
    }
}
