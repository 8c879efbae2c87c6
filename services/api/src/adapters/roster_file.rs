//! services/api/src/adapters/roster_file.rs
//!
//! Loads the static course list, rosters and weekly timetables from a JSON file.

use chrono::{NaiveDate, NaiveTime, Timelike, Weekday};
use classroom_core::roster::{Course, CourseSchedule, Meeting, Roster};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("could not read {0}: {1}")]
    Io(String, std::io::Error),
    #[error("malformed roster JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid roster: {0}")]
    Invalid(String),
}

//=========================================================================================
// File Format
//=========================================================================================

#[derive(Deserialize)]
struct RosterFile {
    courses: Vec<CourseEntry>,
}

#[derive(Deserialize)]
struct CourseEntry {
    id: String,
    label: Option<String>,
    #[serde(default)]
    term: Option<TermEntry>,
    #[serde(default)]
    meetings: Vec<MeetingEntry>,
    students: Vec<String>,
}

#[derive(Deserialize)]
struct TermEntry {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

#[derive(Deserialize)]
struct MeetingEntry {
    /// "Mon", "Tuesday", ...
    weekday: String,
    /// "HH:MM" in the reference timezone.
    start: String,
    end: String,
}

fn minute_of(course: &str, value: &str) -> Result<u16, RosterError> {
    let time = NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| {
        RosterError::Invalid(format!("{}: '{}' is not an HH:MM time", course, value))
    })?;
    Ok((time.hour() * 60 + time.minute()) as u16)
}

impl MeetingEntry {
    fn into_meeting(self, course: &str) -> Result<Meeting, RosterError> {
        let weekday = self.weekday.parse::<Weekday>().map_err(|_| {
            RosterError::Invalid(format!("{}: unknown weekday '{}'", course, self.weekday))
        })?;
        let start_minute = minute_of(course, &self.start)?;
        let end_minute = minute_of(course, &self.end)?;
        if end_minute <= start_minute {
            return Err(RosterError::Invalid(format!(
                "{}: meeting on {} ends before it starts",
                course, self.weekday
            )));
        }
        Ok(Meeting {
            weekday,
            start_minute,
            end_minute,
        })
    }
}

//=========================================================================================
// Loading
//=========================================================================================

pub fn parse_roster(json: &str) -> Result<Roster, RosterError> {
    let file: RosterFile = serde_json::from_str(json)?;
    let mut seen = HashSet::new();
    let mut courses = Vec::with_capacity(file.courses.len());

    for entry in file.courses {
        let id = entry.id.trim().to_string();
        if id.is_empty() {
            return Err(RosterError::Invalid("course id must not be empty".to_string()));
        }
        if !seen.insert(id.clone()) {
            return Err(RosterError::Invalid(format!("course {} listed twice", id)));
        }
        let meetings = entry
            .meetings
            .into_iter()
            .map(|m| m.into_meeting(&id))
            .collect::<Result<Vec<_>, _>>()?;
        let (term_start, term_end) = entry
            .term
            .map(|t| (t.start, t.end))
            .unwrap_or((None, None));
        let students = entry
            .students
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        courses.push(Course {
            label: entry.label.unwrap_or_else(|| id.clone()),
            id,
            students,
            schedule: CourseSchedule {
                term_start,
                term_end,
                meetings,
            },
        });
    }

    Ok(Roster::new(courses))
}

pub fn load_roster(path: &Path) -> Result<Roster, RosterError> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| RosterError::Io(path.display().to_string(), e))?;
    parse_roster(&json)
}
