//! crates/classroom_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete document store, hashing scheme and clock.

use crate::domain::{
    AuthIdentity, ClassDay, Color, Credential, Question, Role, SessionWindow,
    UnderstandingEvent, UnderstandingSummary,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// The error type shared by every port and by the application service.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// Malformed input that the caller can correct locally.
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("PIN already exists for this name. Please login instead.")]
    AlreadyRegistered,
    #[error("No PIN found. Please register first.")]
    NotRegistered,
    #[error("Incorrect PIN.")]
    WrongPin,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The store could not be reached or refused the operation.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Credentials ---
    async fn get_credential(&self, scope: &str, name: &str) -> PortResult<Option<Credential>>;

    /// Stores a new credential. Fails with `AlreadyRegistered` if one exists for the key.
    async fn insert_credential(&self, credential: &Credential) -> PortResult<()>;

    // --- Auth Sessions ---
    async fn create_auth_session(
        &self,
        token: &str,
        identity: &AuthIdentity,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Returns the identity bound to a live, unexpired token.
    async fn validate_auth_session(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> PortResult<AuthIdentity>;

    async fn delete_auth_session(&self, token: &str) -> PortResult<()>;

    /// Drops every session that expired at or before `now`. Returns how many went.
    async fn purge_expired_auth_sessions(&self, now: DateTime<Utc>) -> PortResult<u64>;

    // --- Session Windows ---
    async fn get_window(&self, day: &ClassDay) -> PortResult<Option<SessionWindow>>;

    async fn put_window(&self, window: &SessionWindow) -> PortResult<()>;

    // --- Understanding Check ---

    /// Reads the actor's previous colour, overwrites the summary row and appends
    /// the history event, as one unit.
    async fn record_tap(
        &self,
        day: &ClassDay,
        actor: &str,
        role: Role,
        color: Color,
        at: DateTime<Utc>,
    ) -> PortResult<UnderstandingEvent>;

    async fn list_summaries(&self, day: &ClassDay) -> PortResult<Vec<UnderstandingSummary>>;

    /// History in creation order.
    async fn list_understanding_events(
        &self,
        day: &ClassDay,
    ) -> PortResult<Vec<UnderstandingEvent>>;

    // --- Questions ---
    async fn insert_question(&self, question: &Question) -> PortResult<()>;

    async fn get_question(&self, id: Uuid) -> PortResult<Option<Question>>;

    /// Posts in creation order.
    async fn list_questions(&self, day: &ClassDay) -> PortResult<Vec<Question>>;

    async fn update_question_text(
        &self,
        id: Uuid,
        text: &str,
        edited_at: DateTime<Utc>,
    ) -> PortResult<Question>;

    /// Removes the posts with the given ids.
    async fn delete_questions(&self, ids: &[Uuid]) -> PortResult<()>;
}

/// One-way hashing of PINs before they reach the store.
pub trait PinHasher: Send + Sync {
    fn hash_pin(&self, pin: &str) -> PortResult<String>;
    fn verify_pin(&self, pin: &str, pin_hash: &str) -> PortResult<bool>;
}

/// Where "now" comes from.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTime;

impl TimeSource for SystemTime {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
