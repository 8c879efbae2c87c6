//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::adapters::Argon2PinHasher;
use crate::config::Config;
use crate::web::feed::ChangeFeed;
use chrono::Duration;
use classroom_core::{
    Classroom, ClassroomSettings, DatabaseService, Roster, SessionClock, SystemTime,
};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub classroom: Arc<Classroom>,
    pub config: Arc<Config>,
    pub feed: ChangeFeed,
}

impl AppState {
    pub fn new(config: Arc<Config>, classroom: Arc<Classroom>) -> Self {
        Self {
            classroom,
            config,
            feed: ChangeFeed::default(),
        }
    }

    /// Wires the production adapters around `store`: Argon2 PIN hashing, the
    /// system clock read in the configured reference timezone.
    pub fn from_config(config: Arc<Config>, store: Arc<dyn DatabaseService>, roster: Roster) -> Self {
        let settings = ClassroomSettings {
            policy: config.submission_policy,
            instructor_label: config.instructor_label.clone(),
            question_max_chars: config.question_max_chars,
            auth_session_ttl: Duration::days(config.auth_session_days),
            static_admin_pin: config.admin_static_pin.clone(),
        };
        let classroom = Classroom::new(
            store,
            Arc::new(Argon2PinHasher::new()),
            Arc::new(SystemTime),
            SessionClock::new(config.reference_tz),
            Arc::new(roster),
            settings,
        );
        Self::new(config, Arc::new(classroom))
    }
}
