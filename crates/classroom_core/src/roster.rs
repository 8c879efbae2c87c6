//! crates/classroom_core/src/roster.rs
//!
//! Static course configuration: the course list, who is enrolled, and when each
//! course meets.

use crate::clock::ClockReading;
use chrono::{NaiveDate, Weekday};

/// One weekly meeting slot. `start_minute` is inclusive, `end_minute` exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meeting {
    pub weekday: Weekday,
    pub start_minute: u16,
    pub end_minute: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseSchedule {
    pub term_start: Option<NaiveDate>,
    pub term_end: Option<NaiveDate>,
    pub meetings: Vec<Meeting>,
}

impl CourseSchedule {
    /// Whether the weekly timetable says the class is meeting at `now`.
    pub fn is_in_session(&self, now: &ClockReading) -> bool {
        let today = now.date_key.date();
        if self.term_start.is_some_and(|start| today < start)
            || self.term_end.is_some_and(|end| today > end)
        {
            return false;
        }
        self.meetings.iter().any(|m| {
            m.weekday == now.weekday
                && now.minute_of_day >= m.start_minute
                && now.minute_of_day < m.end_minute
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    pub id: String,
    pub label: String,
    /// Full names in "Last, First" form, in display order.
    pub students: Vec<String>,
    pub schedule: CourseSchedule,
}

impl Course {
    pub fn has_student(&self, name: &str) -> bool {
        self.students.iter().any(|s| s == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    pub courses: Vec<Course>,
}

impl Roster {
    pub fn new(courses: Vec<Course>) -> Self {
        Self { courses }
    }

    pub fn course(&self, id: &str) -> Option<&Course> {
        self.courses.iter().find(|c| c.id == id)
    }
}
