//! crates/classroom_core/src/gate.rs
//!
//! Decides whether an actor may write new taps or posts right now.

use crate::clock::ClockReading;
use crate::domain::{DateKey, Role, SessionWindow};
use crate::roster::CourseSchedule;
use std::fmt;
use std::str::FromStr;

/// Which rule governs student submissions. Instructors bypass all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionPolicy {
    /// Only while the class is meeting today: the instructor's session window
    /// when one is set, otherwise the course's weekly timetable.
    ClassSchedule,
    /// Any time after login, but never for a date after today.
    #[default]
    NoFutureDates,
    /// Any time after login, any date.
    Anytime,
}

impl FromStr for SubmissionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "class_schedule" => Ok(Self::ClassSchedule),
            "no_future_dates" => Ok(Self::NoFutureDates),
            "anytime" => Ok(Self::Anytime),
            other => Err(format!(
                "'{}' is not one of class_schedule, no_future_dates, anytime",
                other
            )),
        }
    }
}

impl fmt::Display for SubmissionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ClassSchedule => "class_schedule",
            Self::NoFutureDates => "no_future_dates",
            Self::Anytime => "anytime",
        };
        f.write_str(name)
    }
}

/// Everything the gate looks at for one decision.
#[derive(Debug, Clone, Copy)]
pub struct GateInput<'a> {
    pub role: Role,
    pub logged_in: bool,
    pub selected: DateKey,
    pub now: ClockReading,
    pub schedule: Option<&'a CourseSchedule>,
    pub window: Option<&'a SessionWindow>,
}

pub fn can_submit(policy: SubmissionPolicy, input: &GateInput<'_>) -> bool {
    if !input.logged_in {
        return false;
    }
    if input.role == Role::Admin {
        return true;
    }
    match policy {
        SubmissionPolicy::Anytime => true,
        SubmissionPolicy::NoFutureDates => input.selected <= input.now.date_key,
        SubmissionPolicy::ClassSchedule => {
            if input.selected != input.now.date_key {
                return false;
            }
            match input.window.and_then(SessionWindow::active_bounds) {
                Some((start, end)) => {
                    (start..=end).contains(&input.now.minute_of_day)
                }
                None => input
                    .schedule
                    .is_some_and(|schedule| schedule.is_in_session(&input.now)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ClassDay;
    use crate::roster::Meeting;
    use chrono::{NaiveDate, Utc, Weekday};

    const POLICIES: [SubmissionPolicy; 3] = [
        SubmissionPolicy::ClassSchedule,
        SubmissionPolicy::NoFutureDates,
        SubmissionPolicy::Anytime,
    ];

    fn key(s: &str) -> DateKey {
        s.parse().unwrap()
    }

    fn now(minute: u16) -> ClockReading {
        ClockReading {
            date_key: key("2026-01-27"),
            minute_of_day: minute,
            weekday: Weekday::Tue,
        }
    }

    fn schedule() -> CourseSchedule {
        CourseSchedule {
            term_start: NaiveDate::from_ymd_opt(2026, 1, 1),
            term_end: NaiveDate::from_ymd_opt(2026, 5, 8),
            meetings: vec![Meeting {
                weekday: Weekday::Tue,
                start_minute: 480,
                end_minute: 600,
            }],
        }
    }

    fn input<'a>(
        role: Role,
        selected: &str,
        minute: u16,
        schedule: Option<&'a CourseSchedule>,
        window: Option<&'a SessionWindow>,
    ) -> GateInput<'a> {
        GateInput {
            role,
            logged_in: true,
            selected: key(selected),
            now: now(minute),
            schedule,
            window,
        }
    }

    #[test]
    fn nobody_submits_without_logging_in() {
        for policy in POLICIES {
            for role in [Role::Student, Role::Admin] {
                let mut gate = input(role, "2026-01-27", 500, None, None);
                gate.logged_in = false;
                assert!(!can_submit(policy, &gate));
            }
        }
    }

    #[test]
    fn no_future_dates_blocks_only_dates_after_today() {
        let policy = SubmissionPolicy::NoFutureDates;
        assert!(can_submit(policy, &input(Role::Student, "2026-01-20", 1300, None, None)));
        assert!(can_submit(policy, &input(Role::Student, "2026-01-27", 1300, None, None)));
        assert!(!can_submit(policy, &input(Role::Student, "2026-01-28", 10, None, None)));
    }

    #[test]
    fn anytime_accepts_future_dates() {
        let gate = input(Role::Student, "2026-12-01", 0, None, None);
        assert!(can_submit(SubmissionPolicy::Anytime, &gate));
    }

    #[test]
    fn class_schedule_uses_the_weekly_timetable() {
        let s = schedule();
        let policy = SubmissionPolicy::ClassSchedule;
        assert!(can_submit(policy, &input(Role::Student, "2026-01-27", 500, Some(&s), None)));
        assert!(!can_submit(policy, &input(Role::Student, "2026-01-27", 700, Some(&s), None)));
        assert!(!can_submit(policy, &input(Role::Student, "2026-01-20", 500, Some(&s), None)));
        assert!(!can_submit(policy, &input(Role::Student, "2026-01-27", 500, None, None)));
    }

    #[test]
    fn an_active_window_overrides_the_timetable() {
        let s = schedule();
        let window = SessionWindow {
            day: ClassDay::new("ADV 375-01", key("2026-01-27")),
            start_minute: Some(650),
            end_minute: Some(720),
            updated_at: Utc::now(),
        };
        let policy = SubmissionPolicy::ClassSchedule;
        assert!(can_submit(policy, &input(Role::Student, "2026-01-27", 700, Some(&s), Some(&window))));
        assert!(can_submit(policy, &input(Role::Student, "2026-01-27", 720, Some(&s), Some(&window))));
        assert!(!can_submit(policy, &input(Role::Student, "2026-01-27", 500, Some(&s), Some(&window))));

        let cleared = SessionWindow {
            start_minute: None,
            end_minute: None,
            ..window
        };
        assert!(can_submit(policy, &input(Role::Student, "2026-01-27", 500, Some(&s), Some(&cleared))));
    }

    #[test]
    fn admin_is_never_more_restricted_than_a_student() {
        let s = schedule();
        for policy in POLICIES {
            for selected in ["2026-01-20", "2026-01-27", "2026-02-10"] {
                for minute in [0, 480, 599, 600, 1439] {
                    let student = can_submit(policy, &input(Role::Student, selected, minute, Some(&s), None));
                    let admin = can_submit(policy, &input(Role::Admin, selected, minute, Some(&s), None));
                    assert!(admin || !student, "{policy} {selected} {minute}");
                }
            }
        }
    }

    #[test]
    fn policy_names_parse() {
        assert_eq!("Anytime".parse::<SubmissionPolicy>(), Ok(SubmissionPolicy::Anytime));
        assert_eq!(
            SubmissionPolicy::ClassSchedule.to_string().parse::<SubmissionPolicy>(),
            Ok(SubmissionPolicy::ClassSchedule)
        );
        assert!("weekly".parse::<SubmissionPolicy>().is_err());
    }
}
