//! crates/classroom_core/src/visibility.rs
//!
//! Decides which name a viewer sees next to each event.
//!
//! Anonymous numbering is a pure function of the result set being displayed.
//! It is rebuilt for every query and never stored, so the same student may get
//! a different number on another day or after new posts arrive.

use crate::domain::{Role, SessionWindow};
use std::collections::BTreeSet;
use std::collections::HashMap;

pub const SELF_LABEL: &str = "You";

/// The person looking at the data.
#[derive(Debug, Clone, Copy)]
pub struct Viewer<'a> {
    pub role: Role,
    pub name: &'a str,
}

/// `Student N` labels for the distinct student actors of one result set,
/// numbered in lexicographic order of the real names.
#[derive(Debug, Clone, Default)]
pub struct AnonymousLabels {
    numbers: HashMap<String, usize>,
}

impl AnonymousLabels {
    pub fn from_actors<'a, I>(actors: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Role)>,
    {
        let distinct: BTreeSet<&str> = actors
            .into_iter()
            .filter(|(_, role)| *role == Role::Student)
            .map(|(name, _)| name)
            .collect();
        let numbers = distinct
            .into_iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), i + 1))
            .collect();
        Self { numbers }
    }

    pub fn label(&self, actor: &str) -> String {
        match self.numbers.get(actor) {
            Some(n) => format!("Student {}", n),
            None => "Student".to_string(),
        }
    }
}

/// First matching rule wins: instructor events, then the viewer's own events,
/// then real names for an instructor who has not hidden them, then anonymous.
pub fn display_name(
    viewer: Viewer<'_>,
    actor: &str,
    event_role: Role,
    hide_names: bool,
    labels: &AnonymousLabels,
    instructor_label: &str,
) -> String {
    if event_role == Role::Admin {
        return instructor_label.to_string();
    }
    if viewer.name == actor && viewer.role == event_role {
        return SELF_LABEL.to_string();
    }
    if viewer.role == Role::Admin && !hide_names {
        return actor.to_string();
    }
    labels.label(actor)
}

/// True only when an active window exists and `minute` lies strictly outside it.
pub fn is_out_of_class(window: Option<&SessionWindow>, minute: u16) -> bool {
    match window.and_then(SessionWindow::active_bounds) {
        Some((start, end)) => minute < start || minute > end,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ClassDay;
    use chrono::Utc;

    const PROF: &str = "Professor";

    fn labels() -> AnonymousLabels {
        AnonymousLabels::from_actors([
            ("Chan, Natalie", Role::Student),
            ("Aviv, Andie", Role::Student),
            ("Chan, Natalie", Role::Student),
            ("Administrator", Role::Admin),
        ])
    }

    #[test]
    fn hidden_names_are_numbered_lexicographically() {
        let admin = Viewer { role: Role::Admin, name: "Administrator" };
        let labels = labels();
        assert_eq!(
            display_name(admin, "Aviv, Andie", Role::Student, true, &labels, PROF),
            "Student 1"
        );
        assert_eq!(
            display_name(admin, "Chan, Natalie", Role::Student, true, &labels, PROF),
            "Student 2"
        );
    }

    #[test]
    fn admin_sees_real_names_unless_hidden() {
        let admin = Viewer { role: Role::Admin, name: "Administrator" };
        assert_eq!(
            display_name(admin, "Chan, Natalie", Role::Student, false, &labels(), PROF),
            "Chan, Natalie"
        );
    }

    #[test]
    fn instructor_events_always_show_the_role_label() {
        let student = Viewer { role: Role::Student, name: "Aviv, Andie" };
        let admin = Viewer { role: Role::Admin, name: "Administrator" };
        for viewer in [student, admin] {
            for hide in [true, false] {
                assert_eq!(
                    display_name(viewer, "Administrator", Role::Admin, hide, &labels(), PROF),
                    PROF
                );
            }
        }
    }

    #[test]
    fn students_see_themselves_and_anonymous_classmates() {
        let viewer = Viewer { role: Role::Student, name: "Chan, Natalie" };
        let labels = labels();
        assert_eq!(
            display_name(viewer, "Chan, Natalie", Role::Student, false, &labels, PROF),
            SELF_LABEL
        );
        assert_eq!(
            display_name(viewer, "Aviv, Andie", Role::Student, false, &labels, PROF),
            "Student 1"
        );
    }

    #[test]
    fn numbering_follows_the_current_result_set() {
        let before = AnonymousLabels::from_actors([("Ho, Keira", Role::Student)]);
        let after = AnonymousLabels::from_actors([
            ("Ho, Keira", Role::Student),
            ("Aviv, Andie", Role::Student),
        ]);
        assert_eq!(before.label("Ho, Keira"), "Student 1");
        assert_eq!(after.label("Ho, Keira"), "Student 2");
    }

    #[test]
    fn out_of_class_needs_an_active_window() {
        let mut window = SessionWindow {
            day: ClassDay::new("ADV 461", "2026-01-28".parse().unwrap()),
            start_minute: Some(720),
            end_minute: Some(960),
            updated_at: Utc::now(),
        };
        assert!(!is_out_of_class(None, 100));
        assert!(is_out_of_class(Some(&window), 719));
        assert!(!is_out_of_class(Some(&window), 720));
        assert!(!is_out_of_class(Some(&window), 960));
        assert!(is_out_of_class(Some(&window), 961));

        window.start_minute = None;
        assert!(!is_out_of_class(Some(&window), 100));
    }
}
