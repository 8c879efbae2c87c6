//! crates/classroom_core/src/service.rs
//!
//! The application service. Every user-facing operation goes through
//! `Classroom`, which combines the store port with the pure gate, projector and
//! threading functions.

use crate::clock::{ClockReading, SessionClock};
use crate::domain::{
    AuthIdentity, AuthSession, ClassDay, Color, Credential, Question, Role, SessionWindow,
    UnderstandingEvent, MINUTES_PER_DAY,
};
use crate::gate::{can_submit, GateInput, SubmissionPolicy};
use crate::identity::{validate_new_pin, validate_pin, CredentialKey};
use crate::ports::{DatabaseService, PinHasher, PortError, PortResult, TimeSource};
use crate::roster::{Course, Roster};
use crate::threads::{build_threads, descendants};
use crate::understanding::{actor_histories, missing_students, tally, Tally};
use crate::visibility::{display_name, is_out_of_class, AnonymousLabels, Viewer};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

//=========================================================================================
// Settings
//=========================================================================================

#[derive(Debug, Clone)]
pub struct ClassroomSettings {
    pub policy: SubmissionPolicy,
    /// Shown in place of the instructor's name on every event they create.
    pub instructor_label: String,
    pub question_max_chars: usize,
    pub auth_session_ttl: Duration,
    /// Deprecated plain-text instructor PIN, used only when no stored
    /// credential exists for the Administrator.
    pub static_admin_pin: Option<String>,
}

impl Default for ClassroomSettings {
    fn default() -> Self {
        Self {
            policy: SubmissionPolicy::default(),
            instructor_label: "Professor".to_string(),
            question_max_chars: 1200,
            auth_session_ttl: Duration::days(30),
            static_admin_pin: None,
        }
    }
}

//=========================================================================================
// Views returned to the web layer
//=========================================================================================

/// One history event as a given viewer may see it.
#[derive(Debug, Clone)]
pub struct TapView {
    pub id: Uuid,
    pub role: Role,
    pub display_name: String,
    pub from_color: Option<Color>,
    pub to_color: Color,
    pub created_at: DateTime<Utc>,
    /// Only computed for instructor viewers.
    pub out_of_class: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct HistoryView {
    pub display_name: String,
    pub taps: Tally,
}

#[derive(Debug, Clone)]
pub struct MissingView {
    pub count: usize,
    /// Withheld while names are hidden.
    pub names: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct UnderstandingReport {
    pub day: ClassDay,
    pub tally: Tally,
    /// Instructor only.
    pub missing: Option<MissingView>,
    /// Instructor only.
    pub histories: Option<Vec<HistoryView>>,
}

/// A post as a given viewer may see it. The author's real name is not part
/// of the view; only the projected label is.
#[derive(Debug, Clone)]
pub struct PostView {
    pub id: Uuid,
    pub reply_to: Option<Uuid>,
    pub role: Role,
    pub display_name: String,
    pub text: String,
    pub is_mine: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub out_of_class: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ThreadView {
    pub root: PostView,
    pub replies: Vec<PostView>,
}

#[derive(Debug, Clone)]
pub struct QuestionBoard {
    pub day: ClassDay,
    pub threads: Vec<ThreadView>,
}

#[derive(Debug, Clone)]
pub struct DeletedPosts {
    pub day: ClassDay,
    pub ids: Vec<Uuid>,
}

//=========================================================================================
// The Service
//=========================================================================================

pub struct Classroom {
    store: Arc<dyn DatabaseService>,
    hasher: Arc<dyn PinHasher>,
    time: Arc<dyn TimeSource>,
    clock: SessionClock,
    roster: Arc<Roster>,
    settings: ClassroomSettings,
}

impl Classroom {
    pub fn new(
        store: Arc<dyn DatabaseService>,
        hasher: Arc<dyn PinHasher>,
        time: Arc<dyn TimeSource>,
        clock: SessionClock,
        roster: Arc<Roster>,
        settings: ClassroomSettings,
    ) -> Self {
        Self {
            store,
            hasher,
            time,
            clock,
            roster,
            settings,
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn settings(&self) -> &ClassroomSettings {
        &self.settings
    }

    pub fn now(&self) -> ClockReading {
        self.clock.reading(self.time.now())
    }

    pub fn timezone(&self) -> Tz {
        self.clock.timezone()
    }

    fn course(&self, id: &str) -> PortResult<&Course> {
        self.roster
            .course(id)
            .ok_or_else(|| PortError::NotFound(format!("Course {} not found", id)))
    }

    fn course_for(&self, identity: &AuthIdentity, course: &str) -> PortResult<&Course> {
        let course = self.course(course)?;
        if !identity.covers_course(&course.id) {
            return Err(PortError::Forbidden(format!(
                "not logged in for {}",
                course.id
            )));
        }
        Ok(course)
    }

    fn require_admin(identity: &AuthIdentity) -> PortResult<()> {
        if identity.is_admin() {
            Ok(())
        } else {
            Err(PortError::Forbidden("instructor only".to_string()))
        }
    }

    fn viewer(identity: &AuthIdentity) -> Viewer<'_> {
        Viewer {
            role: identity.role,
            name: &identity.name,
        }
    }

    fn clean_text(&self, text: &str) -> String {
        text.trim()
            .chars()
            .take(self.settings.question_max_chars)
            .collect()
    }

    // --- Identity & PIN ---

    /// The configured static PIN counts as the instructor's credential.
    fn has_static_pin(&self, key: &CredentialKey) -> bool {
        key.role == Role::Admin && self.settings.static_admin_pin.is_some()
    }

    pub async fn is_registered(&self, scope: &str, name: &str) -> PortResult<bool> {
        let key = CredentialKey::resolve(&self.roster, scope, name)?;
        if self.has_static_pin(&key) {
            return Ok(true);
        }
        Ok(self.store.get_credential(&key.scope, &key.name).await?.is_some())
    }

    /// Creates the credential and logs the new holder in. An existing
    /// credential is never overwritten.
    pub async fn register(
        &self,
        scope: &str,
        name: &str,
        pin: &str,
        pin_confirm: &str,
    ) -> PortResult<AuthSession> {
        validate_new_pin(pin, pin_confirm)?;
        let key = CredentialKey::resolve(&self.roster, scope, name)?;
        if self.has_static_pin(&key) {
            warn!(scope = %key.scope, "Registration refused while ADMIN_STATIC_PIN is set");
            return Err(PortError::AlreadyRegistered);
        }
        if self.store.get_credential(&key.scope, &key.name).await?.is_some() {
            return Err(PortError::AlreadyRegistered);
        }

        let credential = Credential {
            scope: key.scope.clone(),
            name: key.name.clone(),
            role: key.role,
            pin_hash: self.hasher.hash_pin(pin)?,
            created_at: self.time.now(),
        };
        self.store.insert_credential(&credential).await?;
        info!(scope = %key.scope, name = %key.name, "PIN registered");

        self.open_session(key).await
    }

    pub async fn login(&self, scope: &str, name: &str, pin: &str) -> PortResult<AuthSession> {
        validate_pin(pin)?;
        let key = CredentialKey::resolve(&self.roster, scope, name)?;
        let stored = self.store.get_credential(&key.scope, &key.name).await?;

        let accepted = match (stored, key.role, &self.settings.static_admin_pin) {
            (Some(credential), _, _) => self.hasher.verify_pin(pin, &credential.pin_hash)?,
            (None, Role::Admin, Some(static_pin)) => {
                warn!("Instructor logged in with the static ADMIN_STATIC_PIN; register a stored PIN instead");
                static_pin == pin
            }
            (None, _, _) => return Err(PortError::NotRegistered),
        };
        if !accepted {
            return Err(PortError::WrongPin);
        }

        self.open_session(key).await
    }

    async fn open_session(&self, key: CredentialKey) -> PortResult<AuthSession> {
        let identity = AuthIdentity {
            scope: key.scope,
            role: key.role,
            name: key.name,
        };
        let now = self.time.now();
        let purged = self.store.purge_expired_auth_sessions(now).await?;
        if purged > 0 {
            debug!(purged, "Expired auth sessions removed");
        }

        let token = Uuid::new_v4().to_string();
        let expires_at = now + self.settings.auth_session_ttl;
        self.store
            .create_auth_session(&token, &identity, expires_at)
            .await?;
        Ok(AuthSession {
            token,
            identity,
            expires_at,
        })
    }

    /// Ends the login. The stored credential is untouched.
    pub async fn logout(&self, token: &str) -> PortResult<()> {
        self.store.delete_auth_session(token).await
    }

    pub async fn authenticate(&self, token: &str) -> PortResult<AuthIdentity> {
        self.store
            .validate_auth_session(token, self.time.now())
            .await
    }

    // --- Submission Gate ---

    /// Whether `identity` may post on `day` right now.
    pub async fn may_submit(&self, identity: &AuthIdentity, day: &ClassDay) -> PortResult<bool> {
        let course = self.course_for(identity, &day.course)?;
        let window = self.store.get_window(day).await?;
        Ok(can_submit(
            self.settings.policy,
            &GateInput {
                role: identity.role,
                logged_in: true,
                selected: day.date_key,
                now: self.now(),
                schedule: Some(&course.schedule),
                window: window.as_ref(),
            },
        ))
    }

    async fn ensure_can_submit(&self, identity: &AuthIdentity, day: &ClassDay) -> PortResult<()> {
        if self.may_submit(identity, day).await? {
            Ok(())
        } else {
            Err(PortError::Forbidden(format!("submissions are closed for {}", day)))
        }
    }

    // --- Understanding Check ---

    pub async fn submit_tap(
        &self,
        identity: &AuthIdentity,
        day: &ClassDay,
        color: Color,
    ) -> PortResult<UnderstandingEvent> {
        self.ensure_can_submit(identity, day).await?;
        self.store
            .record_tap(day, &identity.name, identity.role, color, self.time.now())
            .await
    }

    pub async fn understanding_report(
        &self,
        identity: &AuthIdentity,
        day: &ClassDay,
        hide_names: bool,
    ) -> PortResult<UnderstandingReport> {
        let course = self.course_for(identity, &day.course)?;
        let summaries = self.store.list_summaries(day).await?;
        let tally = tally(&summaries);

        if !identity.is_admin() {
            return Ok(UnderstandingReport {
                day: day.clone(),
                tally,
                missing: None,
                histories: None,
            });
        }

        let missing = missing_students(&course.students, &summaries);
        let missing = MissingView {
            count: missing.len(),
            names: (!hide_names).then_some(missing),
        };

        let events = self.store.list_understanding_events(day).await?;
        let labels = AnonymousLabels::from_actors(events.iter().map(|e| (e.actor.as_str(), e.role)));
        let histories = actor_histories(&events)
            .into_iter()
            .map(|h| HistoryView {
                display_name: display_name(
                    Self::viewer(identity),
                    &h.actor,
                    h.role,
                    hide_names,
                    &labels,
                    &self.settings.instructor_label,
                ),
                taps: h.taps,
            })
            .collect();

        Ok(UnderstandingReport {
            day: day.clone(),
            tally,
            missing: Some(missing),
            histories: Some(histories),
        })
    }

    /// The raw tap stream, instructor only.
    pub async fn understanding_history(
        &self,
        identity: &AuthIdentity,
        day: &ClassDay,
        hide_names: bool,
    ) -> PortResult<Vec<TapView>> {
        Self::require_admin(identity)?;
        self.course_for(identity, &day.course)?;
        let events = self.store.list_understanding_events(day).await?;
        let window = self.store.get_window(day).await?;
        let labels = AnonymousLabels::from_actors(events.iter().map(|e| (e.actor.as_str(), e.role)));

        Ok(events
            .into_iter()
            .map(|e| TapView {
                display_name: display_name(
                    Self::viewer(identity),
                    &e.actor,
                    e.role,
                    hide_names,
                    &labels,
                    &self.settings.instructor_label,
                ),
                out_of_class: Some(is_out_of_class(
                    window.as_ref(),
                    self.clock.minute_of_day(e.created_at),
                )),
                id: e.id,
                role: e.role,
                from_color: e.from_color,
                to_color: e.to_color,
                created_at: e.created_at,
            })
            .collect())
    }

    // --- Questions & Threading ---

    /// Posts a question or reply. Text that is empty after trimming is ignored.
    pub async fn submit_post(
        &self,
        identity: &AuthIdentity,
        day: &ClassDay,
        text: &str,
        reply_to: Option<Uuid>,
    ) -> PortResult<Option<Question>> {
        self.course_for(identity, &day.course)?;
        let text = self.clean_text(text);
        if text.is_empty() {
            return Ok(None);
        }
        self.ensure_can_submit(identity, day).await?;

        if let Some(parent_id) = reply_to {
            match self.store.get_question(parent_id).await? {
                Some(parent) if parent.day == *day => {}
                _ => {
                    return Err(PortError::NotFound(format!(
                        "Question {} not found in {}",
                        parent_id, day
                    )))
                }
            }
        }

        let question = Question {
            id: Uuid::new_v4(),
            day: day.clone(),
            actor: identity.name.clone(),
            role: identity.role,
            text,
            reply_to,
            edited_at: None,
            created_at: self.time.now(),
        };
        self.store.insert_question(&question).await?;
        Ok(Some(question))
    }

    async fn own_post(&self, identity: &AuthIdentity, id: Uuid) -> PortResult<Question> {
        let question = self
            .store
            .get_question(id)
            .await?
            .ok_or_else(|| PortError::NotFound(format!("Question {} not found", id)))?;
        self.course_for(identity, &question.day.course)?;
        if !identity.is_actor(&question.actor, question.role) {
            return Err(PortError::Forbidden("only the author may change a post".to_string()));
        }
        Ok(question)
    }

    pub async fn edit_post(
        &self,
        identity: &AuthIdentity,
        id: Uuid,
        text: &str,
    ) -> PortResult<Question> {
        let question = self.own_post(identity, id).await?;
        let text = self.clean_text(text);
        if text.is_empty() {
            return Err(PortError::Validation("text must not be empty".to_string()));
        }
        self.store
            .update_question_text(question.id, &text, self.time.now())
            .await
    }

    /// Deletes a post together with every reply below it.
    pub async fn delete_post(&self, identity: &AuthIdentity, id: Uuid) -> PortResult<DeletedPosts> {
        let question = self.own_post(identity, id).await?;
        let day_posts = self.store.list_questions(&question.day).await?;
        let ids = descendants(question.id, &day_posts);
        self.store.delete_questions(&ids).await?;
        Ok(DeletedPosts {
            day: question.day,
            ids,
        })
    }

    pub async fn question_board(
        &self,
        identity: &AuthIdentity,
        day: &ClassDay,
        hide_names: bool,
    ) -> PortResult<QuestionBoard> {
        self.course_for(identity, &day.course)?;
        let questions = self.store.list_questions(day).await?;
        let window = if identity.is_admin() {
            self.store.get_window(day).await?
        } else {
            None
        };
        let labels =
            AnonymousLabels::from_actors(questions.iter().map(|q| (q.actor.as_str(), q.role)));

        let project = |q: Question| PostView {
            display_name: display_name(
                Self::viewer(identity),
                &q.actor,
                q.role,
                hide_names,
                &labels,
                &self.settings.instructor_label,
            ),
            is_mine: identity.is_actor(&q.actor, q.role),
            out_of_class: identity.is_admin().then(|| {
                is_out_of_class(window.as_ref(), self.clock.minute_of_day(q.created_at))
            }),
            id: q.id,
            reply_to: q.reply_to,
            role: q.role,
            text: q.text,
            edited_at: q.edited_at,
            created_at: q.created_at,
        };

        let threads = build_threads(&questions)
            .into_iter()
            .map(|t| ThreadView {
                root: project(t.root),
                replies: t.replies.into_iter().map(&project).collect(),
            })
            .collect();

        Ok(QuestionBoard {
            day: day.clone(),
            threads,
        })
    }

    // --- Session Windows ---

    pub async fn window(
        &self,
        identity: &AuthIdentity,
        day: &ClassDay,
    ) -> PortResult<Option<SessionWindow>> {
        self.course_for(identity, &day.course)?;
        self.store.get_window(day).await
    }

    /// Sets both bounds, or clears the window when both are absent.
    pub async fn set_window(
        &self,
        identity: &AuthIdentity,
        day: &ClassDay,
        start_minute: Option<u16>,
        end_minute: Option<u16>,
    ) -> PortResult<SessionWindow> {
        Self::require_admin(identity)?;
        self.course_for(identity, &day.course)?;
        if start_minute.is_some() != end_minute.is_some() {
            return Err(PortError::Validation(
                "set both start and end, or neither".to_string(),
            ));
        }
        if start_minute.into_iter().chain(end_minute).any(|m| m >= MINUTES_PER_DAY) {
            return Err(PortError::Validation(
                "times must be within one day".to_string(),
            ));
        }
        let window = SessionWindow {
            day: day.clone(),
            start_minute,
            end_minute,
            updated_at: self.time.now(),
        };
        self.store.put_window(&window).await?;
        info!(day = %day, ?start_minute, ?end_minute, "Session window updated");
        Ok(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::roster::{CourseSchedule, Meeting};
    use chrono::{NaiveDate, TimeZone, Weekday};
    use std::sync::Mutex;

    const COURSE: &str = "ADV 375-01";
    const OTHER_COURSE: &str = "ADV 461";

    /// Stores the PIN reversed so tests can tell hashed from plain values.
    struct ReversingHasher;

    impl PinHasher for ReversingHasher {
        fn hash_pin(&self, pin: &str) -> PortResult<String> {
            Ok(pin.chars().rev().collect())
        }

        fn verify_pin(&self, pin: &str, pin_hash: &str) -> PortResult<bool> {
            Ok(pin.chars().rev().collect::<String>() == pin_hash)
        }
    }

    struct ManualTime(Mutex<DateTime<Utc>>);

    impl ManualTime {
        fn advance(&self, minutes: i64) {
            let mut now = self.0.lock().unwrap();
            *now += Duration::minutes(minutes);
        }
    }

    impl TimeSource for ManualTime {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    struct Fixture {
        classroom: Classroom,
        store: Arc<InMemoryStore>,
        time: Arc<ManualTime>,
    }

    fn roster() -> Roster {
        let students = |names: &[&str]| names.iter().map(|s| s.to_string()).collect();
        Roster::new(vec![
            Course {
                id: COURSE.to_string(),
                label: COURSE.to_string(),
                students: students(&["Aviv, Andie", "Chan, Natalie", "Ho, Keira"]),
                schedule: CourseSchedule {
                    term_start: NaiveDate::from_ymd_opt(2026, 1, 1),
                    term_end: NaiveDate::from_ymd_opt(2026, 5, 8),
                    meetings: vec![Meeting {
                        weekday: Weekday::Tue,
                        start_minute: 8 * 60,
                        end_minute: 10 * 60,
                    }],
                },
            },
            Course {
                id: OTHER_COURSE.to_string(),
                label: OTHER_COURSE.to_string(),
                students: students(&["Zong, Aidan"]),
                schedule: CourseSchedule::default(),
            },
        ])
    }

    fn fixture_with(settings: ClassroomSettings) -> Fixture {
        // Tuesday 2026-01-27, 08:30 in Los Angeles.
        let start = Utc.with_ymd_and_hms(2026, 1, 27, 16, 30, 0).unwrap();
        let time = Arc::new(ManualTime(Mutex::new(start)));
        let store = Arc::new(InMemoryStore::new());
        let classroom = Classroom::new(
            store.clone(),
            Arc::new(ReversingHasher),
            time.clone(),
            SessionClock::new(chrono_tz::America::Los_Angeles),
            Arc::new(roster()),
            settings,
        );
        Fixture {
            classroom,
            store,
            time,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(ClassroomSettings::default())
    }

    fn day(date: &str) -> ClassDay {
        ClassDay::new(COURSE, date.parse().unwrap())
    }

    fn today() -> ClassDay {
        day("2026-01-27")
    }

    async fn student(f: &Fixture, name: &str) -> AuthIdentity {
        f.classroom
            .register(COURSE, name, "1234", "1234")
            .await
            .unwrap()
            .identity
    }

    async fn admin(f: &Fixture) -> AuthIdentity {
        f.classroom
            .register(crate::domain::ADMIN_SCOPE, crate::domain::ADMIN_NAME, "9999", "9999")
            .await
            .unwrap()
            .identity
    }

    // --- Identity & PIN ---

    #[tokio::test]
    async fn register_then_login_accepts_only_the_same_pin() {
        let f = fixture();
        f.classroom
            .register(COURSE, "Ho, Keira", "0427", "0427")
            .await
            .unwrap();
        assert!(f.classroom.login(COURSE, "Ho, Keira", "0427").await.is_ok());

        for n in 0..10_000 {
            let pin = format!("{:04}", n);
            if pin == "0427" {
                continue;
            }
            assert!(
                matches!(
                    f.classroom.login(COURSE, "Ho, Keira", &pin).await,
                    Err(PortError::WrongPin)
                ),
                "{pin}"
            );
        }
    }

    #[tokio::test]
    async fn second_registration_never_overwrites_the_first_pin() {
        let f = fixture();
        f.classroom
            .register(COURSE, "Ho, Keira", "1111", "1111")
            .await
            .unwrap();
        assert!(matches!(
            f.classroom.register(COURSE, "Ho, Keira", "2222", "2222").await,
            Err(PortError::AlreadyRegistered)
        ));
        assert!(f.classroom.login(COURSE, "Ho, Keira", "1111").await.is_ok());
        assert!(matches!(
            f.classroom.login(COURSE, "Ho, Keira", "2222").await,
            Err(PortError::WrongPin)
        ));
    }

    #[tokio::test]
    async fn malformed_pins_are_rejected_before_the_store() {
        let f = fixture();
        assert!(matches!(
            f.classroom.register(COURSE, "Ho, Keira", "12", "12").await,
            Err(PortError::Validation(_))
        ));
        assert!(matches!(
            f.classroom.register(COURSE, "Ho, Keira", "1234", "4321").await,
            Err(PortError::Validation(_))
        ));
        assert!(!f.classroom.is_registered(COURSE, "Ho, Keira").await.unwrap());
    }

    #[tokio::test]
    async fn login_without_registration_reports_not_registered() {
        let f = fixture();
        assert!(matches!(
            f.classroom.login(COURSE, "Ho, Keira", "1234").await,
            Err(PortError::NotRegistered)
        ));
    }

    #[tokio::test]
    async fn logout_ends_the_session_but_keeps_the_credential() {
        let f = fixture();
        let session = f
            .classroom
            .register(COURSE, "Ho, Keira", "1234", "1234")
            .await
            .unwrap();
        assert!(f.classroom.authenticate(&session.token).await.is_ok());

        f.classroom.logout(&session.token).await.unwrap();
        assert!(matches!(
            f.classroom.authenticate(&session.token).await,
            Err(PortError::Unauthorized)
        ));
        assert!(f.classroom.is_registered(COURSE, "Ho, Keira").await.unwrap());
        assert!(f.classroom.login(COURSE, "Ho, Keira", "1234").await.is_ok());
    }

    #[tokio::test]
    async fn sessions_expire_after_the_configured_ttl() {
        let f = fixture_with(ClassroomSettings {
            auth_session_ttl: Duration::minutes(30),
            ..ClassroomSettings::default()
        });
        let session = f
            .classroom
            .register(COURSE, "Ho, Keira", "1234", "1234")
            .await
            .unwrap();
        f.time.advance(31);
        assert!(f.classroom.authenticate(&session.token).await.is_err());
    }

    #[tokio::test]
    async fn opening_a_session_purges_expired_ones() {
        let f = fixture_with(ClassroomSettings {
            auth_session_ttl: Duration::minutes(30),
            ..ClassroomSettings::default()
        });
        f.classroom
            .register(COURSE, "Ho, Keira", "1234", "1234")
            .await
            .unwrap();
        f.time.advance(31);
        f.classroom.login(COURSE, "Ho, Keira", "1234").await.unwrap();

        let now = f.time.now();
        assert_eq!(f.store.purge_expired_auth_sessions(now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn static_admin_pin_cannot_be_replaced_by_registration() {
        let f = fixture_with(ClassroomSettings {
            static_admin_pin: Some("4242".to_string()),
            ..ClassroomSettings::default()
        });
        let (scope, name) = (crate::domain::ADMIN_SCOPE, crate::domain::ADMIN_NAME);
        assert!(f.classroom.is_registered(scope, name).await.unwrap());
        assert!(f.classroom.login(scope, name, "4242").await.unwrap().identity.is_admin());
        assert!(matches!(
            f.classroom.login(scope, name, "0000").await,
            Err(PortError::WrongPin)
        ));

        assert!(matches!(
            f.classroom.register(scope, name, "0001", "0001").await,
            Err(PortError::AlreadyRegistered)
        ));
        assert!(f.classroom.login(scope, name, "4242").await.is_ok());
        assert!(matches!(
            f.classroom.login(scope, name, "0001").await,
            Err(PortError::WrongPin)
        ));
    }

    #[tokio::test]
    async fn names_off_the_roster_cannot_register() {
        let f = fixture();
        assert!(matches!(
            f.classroom.register(COURSE, "Zong, Aidan", "1234", "1234").await,
            Err(PortError::NotFound(_))
        ));
    }

    // --- Understanding Check ---

    #[tokio::test]
    async fn tally_counts_each_actor_once() {
        let f = fixture();
        let keira = student(&f, "Ho, Keira").await;
        let andie = student(&f, "Aviv, Andie").await;
        let colors = [Color::Red, Color::Green, Color::Yellow, Color::Red, Color::Green];
        for color in colors {
            f.classroom.submit_tap(&keira, &today(), color).await.unwrap();
            f.time.advance(1);
        }
        f.classroom
            .submit_tap(&andie, &today(), Color::Yellow)
            .await
            .unwrap();

        let report = f
            .classroom
            .understanding_report(&keira, &today(), false)
            .await
            .unwrap();
        assert_eq!(report.tally.total(), 2);
        assert_eq!((report.tally.red, report.tally.yellow, report.tally.green), (0, 1, 1));
        assert!(report.missing.is_none());
        assert!(report.histories.is_none());
    }

    #[tokio::test]
    async fn history_chains_previous_colors() {
        let f = fixture();
        let keira = student(&f, "Ho, Keira").await;
        let boss = admin(&f).await;
        for color in [Color::Red, Color::Green, Color::Yellow] {
            f.classroom.submit_tap(&keira, &today(), color).await.unwrap();
            f.time.advance(1);
        }

        let history = f
            .classroom
            .understanding_history(&boss, &today(), false)
            .await
            .unwrap();
        let chain: Vec<(Option<Color>, Color)> =
            history.iter().map(|t| (t.from_color, t.to_color)).collect();
        assert_eq!(
            chain,
            vec![
                (None, Color::Red),
                (Some(Color::Red), Color::Green),
                (Some(Color::Green), Color::Yellow),
            ]
        );

        let report = f
            .classroom
            .understanding_report(&boss, &today(), false)
            .await
            .unwrap();
        assert_eq!((report.tally.red, report.tally.yellow, report.tally.green), (0, 1, 0));
        let histories = report.histories.unwrap();
        assert_eq!(histories[0].display_name, "Ho, Keira");
        assert_eq!(histories[0].taps.total(), 3);
    }

    #[tokio::test]
    async fn missing_shrinks_once_per_new_student() {
        let f = fixture();
        let boss = admin(&f).await;
        let missing = |report: UnderstandingReport| report.missing.unwrap().names.unwrap();

        let report = f.classroom.understanding_report(&boss, &today(), false).await.unwrap();
        assert_eq!(missing(report), vec!["Aviv, Andie", "Chan, Natalie", "Ho, Keira"]);

        let natalie = student(&f, "Chan, Natalie").await;
        f.classroom.submit_tap(&natalie, &today(), Color::Green).await.unwrap();
        let report = f.classroom.understanding_report(&boss, &today(), false).await.unwrap();
        assert_eq!(missing(report), vec!["Aviv, Andie", "Ho, Keira"]);

        f.classroom.submit_tap(&natalie, &today(), Color::Red).await.unwrap();
        let report = f.classroom.understanding_report(&boss, &today(), false).await.unwrap();
        assert_eq!(missing(report), vec!["Aviv, Andie", "Ho, Keira"]);

        let report = f.classroom.understanding_report(&boss, &today(), true).await.unwrap();
        let hidden = report.missing.unwrap();
        assert_eq!(hidden.count, 2);
        assert!(hidden.names.is_none());
    }

    #[tokio::test]
    async fn hidden_names_number_students_alphabetically() {
        let f = fixture();
        let boss = admin(&f).await;
        let natalie = student(&f, "Chan, Natalie").await;
        let andie = student(&f, "Aviv, Andie").await;
        f.classroom.submit_tap(&natalie, &today(), Color::Red).await.unwrap();
        f.time.advance(1);
        f.classroom.submit_tap(&andie, &today(), Color::Green).await.unwrap();

        let history = f
            .classroom
            .understanding_history(&boss, &today(), true)
            .await
            .unwrap();
        let names: Vec<&str> = history.iter().map(|t| t.display_name.as_str()).collect();
        assert_eq!(names, ["Student 2", "Student 1"]);
    }

    #[tokio::test]
    async fn students_cannot_read_the_raw_history() {
        let f = fixture();
        let keira = student(&f, "Ho, Keira").await;
        assert!(matches!(
            f.classroom.understanding_history(&keira, &today(), false).await,
            Err(PortError::Forbidden(_))
        ));
    }

    // --- Submission Gate ---

    #[tokio::test]
    async fn future_dates_are_closed_to_students_but_not_the_instructor() {
        let f = fixture();
        let keira = student(&f, "Ho, Keira").await;
        let boss = admin(&f).await;
        let tomorrow = day("2026-01-28");

        assert!(matches!(
            f.classroom.submit_tap(&keira, &tomorrow, Color::Red).await,
            Err(PortError::Forbidden(_))
        ));
        assert!(matches!(
            f.classroom.submit_post(&keira, &tomorrow, "early?", None).await,
            Err(PortError::Forbidden(_))
        ));
        assert!(f.classroom.submit_tap(&keira, &day("2026-01-20"), Color::Red).await.is_ok());
        assert!(f.classroom.submit_tap(&boss, &tomorrow, Color::Green).await.is_ok());
    }

    #[tokio::test]
    async fn class_schedule_policy_follows_the_instructor_window() {
        let f = fixture_with(ClassroomSettings {
            policy: SubmissionPolicy::ClassSchedule,
            ..ClassroomSettings::default()
        });
        let keira = student(&f, "Ho, Keira").await;
        let boss = admin(&f).await;
        assert!(f.classroom.may_submit(&keira, &today()).await.unwrap());

        // 08:30 now; move the class to 11:00-12:00.
        f.classroom
            .set_window(&boss, &today(), Some(660), Some(720))
            .await
            .unwrap();
        assert!(!f.classroom.may_submit(&keira, &today()).await.unwrap());
        assert!(f.classroom.may_submit(&boss, &today()).await.unwrap());
    }

    #[tokio::test]
    async fn students_are_confined_to_their_course() {
        let f = fixture();
        let keira = student(&f, "Ho, Keira").await;
        let other = ClassDay::new(OTHER_COURSE, "2026-01-27".parse().unwrap());
        assert!(matches!(
            f.classroom.submit_tap(&keira, &other, Color::Red).await,
            Err(PortError::Forbidden(_))
        ));
        assert!(matches!(
            f.classroom.question_board(&keira, &other, false).await,
            Err(PortError::Forbidden(_))
        ));
    }

    // --- Questions & Threading ---

    #[tokio::test]
    async fn posts_are_trimmed_capped_and_blank_posts_ignored() {
        let f = fixture_with(ClassroomSettings {
            question_max_chars: 5,
            ..ClassroomSettings::default()
        });
        let keira = student(&f, "Ho, Keira").await;
        assert!(f.classroom.submit_post(&keira, &today(), "   \n", None).await.unwrap().is_none());
        let post = f
            .classroom
            .submit_post(&keira, &today(), "  what is CPM?  ", None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(post.text, "what ");
    }

    #[tokio::test]
    async fn reply_to_a_missing_post_is_rejected() {
        let f = fixture();
        let keira = student(&f, "Ho, Keira").await;
        assert!(matches!(
            f.classroom
                .submit_post(&keira, &today(), "re: nothing", Some(Uuid::new_v4()))
                .await,
            Err(PortError::NotFound(_))
        ));

        let root = f
            .classroom
            .submit_post(&keira, &day("2026-01-20"), "old question", None)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            f.classroom
                .submit_post(&keira, &today(), "cross-day reply", Some(root.id))
                .await,
            Err(PortError::NotFound(_))
        ));
        let board = f.classroom.question_board(&keira, &today(), false).await.unwrap();
        assert!(board.threads.is_empty());
    }

    #[tokio::test]
    async fn board_threads_replies_and_projects_names() {
        let f = fixture();
        let keira = student(&f, "Ho, Keira").await;
        let andie = student(&f, "Aviv, Andie").await;
        let boss = admin(&f).await;

        let root = f
            .classroom
            .submit_post(&keira, &today(), "Is the midterm cumulative?", None)
            .await
            .unwrap()
            .unwrap();
        f.time.advance(1);
        f.classroom
            .submit_post(&boss, &today(), "Yes.", Some(root.id))
            .await
            .unwrap();
        f.time.advance(1);
        f.classroom
            .submit_post(&andie, &today(), "Thanks!", Some(root.id))
            .await
            .unwrap();

        let board = f.classroom.question_board(&andie, &today(), false).await.unwrap();
        assert_eq!(board.threads.len(), 1);
        let thread = &board.threads[0];
        assert_eq!(thread.root.display_name, "Student 2");
        assert!(!thread.root.is_mine);
        assert!(thread.root.out_of_class.is_none());
        let replies: Vec<&str> = thread.replies.iter().map(|p| p.display_name.as_str()).collect();
        assert_eq!(replies, ["Professor", "You"]);

        let board = f.classroom.question_board(&boss, &today(), false).await.unwrap();
        assert_eq!(board.threads[0].root.display_name, "Ho, Keira");
        assert_eq!(board.threads[0].root.out_of_class, Some(false));
    }

    #[tokio::test]
    async fn instructor_sees_out_of_class_posts() {
        let f = fixture();
        let keira = student(&f, "Ho, Keira").await;
        let boss = admin(&f).await;
        f.classroom
            .set_window(&boss, &today(), Some(9 * 60), Some(10 * 60))
            .await
            .unwrap();
        f.classroom
            .submit_post(&keira, &today(), "before class", None)
            .await
            .unwrap();
        f.time.advance(45);
        f.classroom
            .submit_post(&keira, &today(), "during class", None)
            .await
            .unwrap();

        let board = f.classroom.question_board(&boss, &today(), false).await.unwrap();
        let flags: Vec<Option<bool>> = board.threads.iter().map(|t| t.root.out_of_class).collect();
        assert_eq!(flags, vec![Some(true), Some(false)]);
    }

    #[tokio::test]
    async fn only_the_author_edits_and_edits_keep_identity() {
        let f = fixture();
        let keira = student(&f, "Ho, Keira").await;
        let andie = student(&f, "Aviv, Andie").await;
        let boss = admin(&f).await;
        let post = f
            .classroom
            .submit_post(&keira, &today(), "first draft", None)
            .await
            .unwrap()
            .unwrap();
        f.time.advance(3);

        let edited = f.classroom.edit_post(&keira, post.id, " second draft ").await.unwrap();
        assert_eq!(edited.id, post.id);
        assert_eq!(edited.created_at, post.created_at);
        assert_eq!(edited.text, "second draft");
        assert!(edited.edited_at.is_some());

        for intruder in [&andie, &boss] {
            assert!(matches!(
                f.classroom.edit_post(intruder, post.id, "hijacked").await,
                Err(PortError::Forbidden(_))
            ));
        }
        assert!(matches!(
            f.classroom.edit_post(&keira, post.id, "   ").await,
            Err(PortError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn deleting_a_post_removes_its_replies() {
        let f = fixture();
        let keira = student(&f, "Ho, Keira").await;
        let boss = admin(&f).await;
        let root = f
            .classroom
            .submit_post(&keira, &today(), "question", None)
            .await
            .unwrap()
            .unwrap();
        let reply = f
            .classroom
            .submit_post(&boss, &today(), "answer", Some(root.id))
            .await
            .unwrap()
            .unwrap();
        f.classroom
            .submit_post(&keira, &today(), "follow-up", Some(reply.id))
            .await
            .unwrap();
        f.classroom
            .submit_post(&keira, &today(), "unrelated", None)
            .await
            .unwrap();

        assert!(matches!(
            f.classroom.delete_post(&boss, root.id).await,
            Err(PortError::Forbidden(_))
        ));
        let deleted = f.classroom.delete_post(&keira, root.id).await.unwrap();
        assert_eq!(deleted.ids.len(), 3);

        let board = f.classroom.question_board(&keira, &today(), false).await.unwrap();
        assert_eq!(board.threads.len(), 1);
        assert_eq!(board.threads[0].root.text, "unrelated");
    }

    // --- Session Windows ---

    #[tokio::test]
    async fn windows_need_both_bounds_and_an_instructor() {
        let f = fixture();
        let keira = student(&f, "Ho, Keira").await;
        let boss = admin(&f).await;
        assert!(matches!(
            f.classroom.set_window(&keira, &today(), Some(1), Some(2)).await,
            Err(PortError::Forbidden(_))
        ));
        assert!(matches!(
            f.classroom.set_window(&boss, &today(), Some(1), None).await,
            Err(PortError::Validation(_))
        ));
        assert!(matches!(
            f.classroom.set_window(&boss, &today(), Some(1), Some(1440)).await,
            Err(PortError::Validation(_))
        ));

        f.classroom.set_window(&boss, &today(), Some(480), Some(600)).await.unwrap();
        let cleared = f.classroom.set_window(&boss, &today(), None, None).await.unwrap();
        assert!(!cleared.is_active());
        let stored = f.classroom.window(&keira, &today()).await.unwrap().unwrap();
        assert!(!stored.is_active());
    }
}
