//! crates/classroom_core/src/identity.rs
//!
//! PIN rules and the mapping from a login form to a credential key.

use crate::domain::{Role, ADMIN_NAME, ADMIN_SCOPE};
use crate::ports::{PortError, PortResult};
use crate::roster::Roster;

pub const PIN_LENGTH: usize = 4;

pub fn validate_pin(pin: &str) -> PortResult<()> {
    if pin.len() == PIN_LENGTH && pin.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(PortError::Validation("PIN must be 4 digits.".to_string()))
    }
}

pub fn validate_new_pin(pin: &str, confirm: &str) -> PortResult<()> {
    validate_pin(pin)?;
    if pin != confirm {
        return Err(PortError::Validation("PINs do not match.".to_string()));
    }
    Ok(())
}

/// The credential key a person logs in under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialKey {
    pub scope: String,
    pub name: String,
    pub role: Role,
}

impl CredentialKey {
    pub fn admin() -> Self {
        Self {
            scope: ADMIN_SCOPE.to_string(),
            name: ADMIN_NAME.to_string(),
            role: Role::Admin,
        }
    }

    /// Resolves a (scope, name) pair against the roster. Students must be
    /// enrolled in the course they name; the admin scope only knows the
    /// Administrator.
    pub fn resolve(roster: &Roster, scope: &str, name: &str) -> PortResult<Self> {
        let name = name.trim();
        if scope == ADMIN_SCOPE {
            return if name == ADMIN_NAME {
                Ok(Self::admin())
            } else {
                Err(PortError::NotFound(format!("{} is not an instructor", name)))
            };
        }
        let course = roster
            .course(scope)
            .ok_or_else(|| PortError::NotFound(format!("Course {} not found", scope)))?;
        if !course.has_student(name) {
            return Err(PortError::NotFound(format!(
                "{} is not on the roster of {}",
                name, scope
            )));
        }
        Ok(Self {
            scope: scope.to_string(),
            name: name.to_string(),
            role: Role::Student,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::{Course, CourseSchedule};

    fn roster() -> Roster {
        Roster::new(vec![Course {
            id: "ADV 461".to_string(),
            label: "ADV 461".to_string(),
            students: vec!["Zong, Aidan".to_string(), "Monte, Ella".to_string()],
            schedule: CourseSchedule::default(),
        }])
    }

    #[test]
    fn pin_must_be_exactly_four_digits() {
        assert!(validate_pin("0042").is_ok());
        for bad in ["", "123", "12345", "12a4", " 123", "١٢٣٤"] {
            assert!(matches!(validate_pin(bad), Err(PortError::Validation(_))), "{bad:?}");
        }
    }

    #[test]
    fn confirmation_must_match() {
        assert!(validate_new_pin("1234", "1234").is_ok());
        assert!(matches!(
            validate_new_pin("1234", "1243"),
            Err(PortError::Validation(_))
        ));
    }

    #[test]
    fn resolve_checks_roster_membership() {
        let roster = roster();
        let key = CredentialKey::resolve(&roster, "ADV 461", " Zong, Aidan ").unwrap();
        assert_eq!(key.name, "Zong, Aidan");
        assert_eq!(key.role, Role::Student);

        assert!(matches!(
            CredentialKey::resolve(&roster, "ADV 461", "Aviv, Andie"),
            Err(PortError::NotFound(_))
        ));
        assert!(matches!(
            CredentialKey::resolve(&roster, "ADV 999", "Zong, Aidan"),
            Err(PortError::NotFound(_))
        ));
    }

    #[test]
    fn admin_scope_only_knows_the_administrator() {
        let roster = roster();
        assert_eq!(
            CredentialKey::resolve(&roster, ADMIN_SCOPE, ADMIN_NAME).unwrap(),
            CredentialKey::admin()
        );
        assert!(CredentialKey::resolve(&roster, ADMIN_SCOPE, "Zong, Aidan").is_err());
    }
}
