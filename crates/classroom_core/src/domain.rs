//! crates/classroom_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Credential scope used by the fixed instructor identity instead of a course id.
pub const ADMIN_SCOPE: &str = "ADMIN";

/// The single instructor identity. It is not part of any course roster.
pub const ADMIN_NAME: &str = "Administrator";

pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Raised when a string cannot be turned into one of the domain value types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: '{value}'")]
pub struct ParseDomainError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseDomainError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

//=========================================================================================
// Value Types
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Student,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = ParseDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "admin" => Ok(Role::Admin),
            other => Err(ParseDomainError::new("role", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the three traffic-light answers to "do you follow?".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Red,
    Yellow,
    Green,
}

impl Color {
    pub const ALL: [Color; 3] = [Color::Red, Color::Yellow, Color::Green];

    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Yellow => "yellow",
            Color::Green => "green",
        }
    }
}

impl FromStr for Color {
    type Err = ParseDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "red" => Ok(Color::Red),
            "yellow" => Ok(Color::Yellow),
            "green" => Ok(Color::Green),
            other => Err(ParseDomainError::new("color", other)),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A class day in the reference timezone, always rendered as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl FromStr for DateKey {
    type Err = ParseDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // chrono accepts unpadded fields; the key format does not.
        if s.len() != 10 {
            return Err(ParseDomainError::new("date key", s));
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(DateKey)
            .map_err(|_| ParseDomainError::new("date key", s))
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// The (course, date) scope every read, write and projection is evaluated in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassDay {
    pub course: String,
    pub date_key: DateKey,
}

impl ClassDay {
    pub fn new(course: impl Into<String>, date_key: DateKey) -> Self {
        Self {
            course: course.into(),
            date_key,
        }
    }
}

impl fmt::Display for ClassDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.course, self.date_key)
    }
}

//=========================================================================================
// Identity
//=========================================================================================

/// A stored PIN credential. Only the hash is ever kept.
#[derive(Debug, Clone)]
pub struct Credential {
    pub scope: String,
    pub name: String,
    pub role: Role,
    pub pin_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Who a logged-in browser is acting as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthIdentity {
    /// Course id for students, [`ADMIN_SCOPE`] for the instructor.
    pub scope: String,
    pub role: Role,
    pub name: String,
}

impl AuthIdentity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether this identity may read and write in the given course.
    pub fn covers_course(&self, course: &str) -> bool {
        self.is_admin() || self.scope == course
    }

    pub fn is_actor(&self, actor: &str, role: Role) -> bool {
        self.name == actor && self.role == role
    }
}

// Represents a browser login (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub identity: AuthIdentity,
    pub expires_at: DateTime<Utc>,
}

//=========================================================================================
// Class Sessions and Events
//=========================================================================================

/// Instructor-set in-class boundary for one class day, in minutes since local midnight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionWindow {
    pub day: ClassDay,
    pub start_minute: Option<u16>,
    pub end_minute: Option<u16>,
    pub updated_at: DateTime<Utc>,
}

impl SessionWindow {
    /// Both bounds, provided they form a non-empty interval.
    pub fn active_bounds(&self) -> Option<(u16, u16)> {
        match (self.start_minute, self.end_minute) {
            (Some(start), Some(end)) if end >= start => Some((start, end)),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active_bounds().is_some()
    }
}

/// One tap of the understanding check. Never modified after it is written.
#[derive(Debug, Clone)]
pub struct UnderstandingEvent {
    pub id: Uuid,
    pub day: ClassDay,
    pub actor: String,
    pub role: Role,
    pub from_color: Option<Color>,
    pub to_color: Color,
    pub created_at: DateTime<Utc>,
}

/// The latest colour per actor per class day.
#[derive(Debug, Clone)]
pub struct UnderstandingSummary {
    pub day: ClassDay,
    pub actor: String,
    pub role: Role,
    pub color: Color,
    pub updated_at: DateTime<Utc>,
}

/// A question or a reply. Roots have no `reply_to`.
#[derive(Debug, Clone)]
pub struct Question {
    pub id: Uuid,
    pub day: ClassDay,
    pub actor: String,
    pub role: Role,
    pub text: String,
    pub reply_to: Option<Uuid>,
    pub edited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Question {
    pub fn is_root(&self) -> bool {
        self.reply_to.is_none()
    }
}
