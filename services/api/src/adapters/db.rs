//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use classroom_core::domain::{
    AuthIdentity, ClassDay, Color, Credential, DateKey, Question, Role, SessionWindow,
    UnderstandingEvent, UnderstandingSummary,
};
use classroom_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use tracing::error;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
    app_id: String,
}

impl DbAdapter {
    /// Creates a new `DbAdapter` whose reads and writes are confined to `app_id`.
    pub fn new(pool: PgPool, app_id: impl Into<String>) -> Self {
        Self {
            pool,
            app_id: app_id.into(),
        }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Advisory lock name for one actor's summary row. Fields are joined with a
/// unit separator so no two keys collide.
fn tap_lock_key(app_id: &str, day: &ClassDay, actor: &str) -> String {
    format!(
        "tap\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}",
        app_id, day.course, day.date_key, actor
    )
}

fn unavailable(e: sqlx::Error) -> PortError {
    error!("Database operation failed: {:?}", e);
    PortError::BackendUnavailable(e.to_string())
}

fn parse_column<T: FromStr>(column: &str, value: &str) -> PortResult<T> {
    value.parse::<T>().map_err(|_| {
        PortError::BackendUnavailable(format!("unexpected {} value '{}' in database", column, value))
    })
}

fn minute_column(value: Option<i32>) -> PortResult<Option<u16>> {
    value
        .map(|m| {
            u16::try_from(m).map_err(|_| {
                PortError::BackendUnavailable(format!("unexpected minute value {} in database", m))
            })
        })
        .transpose()
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct CredentialRecord {
    scope: String,
    name: String,
    role: String,
    pin_hash: String,
    created_at: DateTime<Utc>,
}
impl CredentialRecord {
    fn to_domain(self) -> PortResult<Credential> {
        Ok(Credential {
            role: parse_column("role", &self.role)?,
            scope: self.scope,
            name: self.name,
            pin_hash: self.pin_hash,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct AuthSessionRecord {
    scope: String,
    role: String,
    name: String,
}
impl AuthSessionRecord {
    fn to_domain(self) -> PortResult<AuthIdentity> {
        Ok(AuthIdentity {
            role: parse_column("role", &self.role)?,
            scope: self.scope,
            name: self.name,
        })
    }
}

#[derive(FromRow)]
struct WindowRecord {
    course: String,
    date_key: NaiveDate,
    start_minute: Option<i32>,
    end_minute: Option<i32>,
    updated_at: DateTime<Utc>,
}
impl WindowRecord {
    fn to_domain(self) -> PortResult<SessionWindow> {
        Ok(SessionWindow {
            day: ClassDay::new(self.course, DateKey::new(self.date_key)),
            start_minute: minute_column(self.start_minute)?,
            end_minute: minute_column(self.end_minute)?,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct SummaryRecord {
    course: String,
    date_key: NaiveDate,
    actor: String,
    role: String,
    color: String,
    updated_at: DateTime<Utc>,
}
impl SummaryRecord {
    fn to_domain(self) -> PortResult<UnderstandingSummary> {
        Ok(UnderstandingSummary {
            role: parse_column("role", &self.role)?,
            color: parse_column("color", &self.color)?,
            day: ClassDay::new(self.course, DateKey::new(self.date_key)),
            actor: self.actor,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct EventRecord {
    id: Uuid,
    course: String,
    date_key: NaiveDate,
    actor: String,
    role: String,
    from_color: Option<String>,
    to_color: String,
    created_at: DateTime<Utc>,
}
impl EventRecord {
    fn to_domain(self) -> PortResult<UnderstandingEvent> {
        Ok(UnderstandingEvent {
            id: self.id,
            role: parse_column("role", &self.role)?,
            from_color: self
                .from_color
                .as_deref()
                .map(|c| parse_column("from_color", c))
                .transpose()?,
            to_color: parse_column("to_color", &self.to_color)?,
            day: ClassDay::new(self.course, DateKey::new(self.date_key)),
            actor: self.actor,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct QuestionRecord {
    id: Uuid,
    course: String,
    date_key: NaiveDate,
    actor: String,
    role: String,
    text: String,
    reply_to: Option<Uuid>,
    edited_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}
impl QuestionRecord {
    fn to_domain(self) -> PortResult<Question> {
        Ok(Question {
            id: self.id,
            role: parse_column("role", &self.role)?,
            day: ClassDay::new(self.course, DateKey::new(self.date_key)),
            actor: self.actor,
            text: self.text,
            reply_to: self.reply_to,
            edited_at: self.edited_at,
            created_at: self.created_at,
        })
    }
}

const QUESTION_COLUMNS: &str =
    "id, course, date_key, actor, role, text, reply_to, edited_at, created_at";

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn get_credential(&self, scope: &str, name: &str) -> PortResult<Option<Credential>> {
        let record = sqlx::query_as::<_, CredentialRecord>(
            "SELECT scope, name, role, pin_hash, created_at FROM pin_credentials
             WHERE app_id = $1 AND scope = $2 AND name = $3",
        )
        .bind(&self.app_id)
        .bind(scope)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;
        record.map(CredentialRecord::to_domain).transpose()
    }

    async fn insert_credential(&self, credential: &Credential) -> PortResult<()> {
        let result = sqlx::query(
            "INSERT INTO pin_credentials (app_id, scope, name, role, pin_hash, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (app_id, scope, name) DO NOTHING",
        )
        .bind(&self.app_id)
        .bind(&credential.scope)
        .bind(&credential.name)
        .bind(credential.role.as_str())
        .bind(&credential.pin_hash)
        .bind(credential.created_at)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        if result.rows_affected() == 0 {
            return Err(PortError::AlreadyRegistered);
        }
        Ok(())
    }

    async fn create_auth_session(
        &self,
        token: &str,
        identity: &AuthIdentity,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO auth_sessions (token, app_id, scope, role, name, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(token)
        .bind(&self.app_id)
        .bind(&identity.scope)
        .bind(identity.role.as_str())
        .bind(&identity.name)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn validate_auth_session(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> PortResult<AuthIdentity> {
        let record = sqlx::query_as::<_, AuthSessionRecord>(
            "SELECT scope, role, name FROM auth_sessions
             WHERE app_id = $1 AND token = $2 AND expires_at > $3",
        )
        .bind(&self.app_id)
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        match record {
            Some(record) => record.to_domain(),
            None => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, token: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE app_id = $1 AND token = $2")
            .bind(&self.app_id)
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn purge_expired_auth_sessions(&self, now: DateTime<Utc>) -> PortResult<u64> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE app_id = $1 AND expires_at <= $2")
            .bind(&self.app_id)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(result.rows_affected())
    }

    async fn get_window(&self, day: &ClassDay) -> PortResult<Option<SessionWindow>> {
        let record = sqlx::query_as::<_, WindowRecord>(
            "SELECT course, date_key, start_minute, end_minute, updated_at FROM session_windows
             WHERE app_id = $1 AND course = $2 AND date_key = $3",
        )
        .bind(&self.app_id)
        .bind(&day.course)
        .bind(day.date_key.date())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;
        record.map(WindowRecord::to_domain).transpose()
    }

    async fn put_window(&self, window: &SessionWindow) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO session_windows (app_id, course, date_key, start_minute, end_minute, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (app_id, course, date_key) DO UPDATE
             SET start_minute = EXCLUDED.start_minute,
                 end_minute = EXCLUDED.end_minute,
                 updated_at = EXCLUDED.updated_at",
        )
        .bind(&self.app_id)
        .bind(&window.day.course)
        .bind(window.day.date_key.date())
        .bind(window.start_minute.map(i32::from))
        .bind(window.end_minute.map(i32::from))
        .bind(window.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn record_tap(
        &self,
        day: &ClassDay,
        actor: &str,
        role: Role,
        color: Color,
        at: DateTime<Utc>,
    ) -> PortResult<UnderstandingEvent> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        // Row locks cannot cover an actor's first tap, so serialise on the key itself.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(tap_lock_key(&self.app_id, day, actor))
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;

        let previous: Option<String> = sqlx::query_scalar(
            "SELECT color FROM understanding_summaries
             WHERE app_id = $1 AND course = $2 AND date_key = $3 AND actor = $4
             FOR UPDATE",
        )
        .bind(&self.app_id)
        .bind(&day.course)
        .bind(day.date_key.date())
        .bind(actor)
        .fetch_optional(&mut *tx)
        .await
        .map_err(unavailable)?;
        let from_color: Option<Color> = previous
            .as_deref()
            .map(|c| parse_column("color", c))
            .transpose()?;

        sqlx::query(
            "INSERT INTO understanding_summaries (app_id, course, date_key, actor, role, color, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (app_id, course, date_key, actor) DO UPDATE
             SET role = EXCLUDED.role, color = EXCLUDED.color, updated_at = EXCLUDED.updated_at",
        )
        .bind(&self.app_id)
        .bind(&day.course)
        .bind(day.date_key.date())
        .bind(actor)
        .bind(role.as_str())
        .bind(color.as_str())
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(unavailable)?;

        let event = UnderstandingEvent {
            id: Uuid::new_v4(),
            day: day.clone(),
            actor: actor.to_string(),
            role,
            from_color,
            to_color: color,
            created_at: at,
        };
        sqlx::query(
            "INSERT INTO understanding_events
                 (id, app_id, course, date_key, actor, role, from_color, to_color, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(event.id)
        .bind(&self.app_id)
        .bind(&day.course)
        .bind(day.date_key.date())
        .bind(actor)
        .bind(role.as_str())
        .bind(from_color.map(|c| c.as_str()))
        .bind(color.as_str())
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(unavailable)?;

        tx.commit().await.map_err(unavailable)?;
        Ok(event)
    }

    async fn list_summaries(&self, day: &ClassDay) -> PortResult<Vec<UnderstandingSummary>> {
        let records = sqlx::query_as::<_, SummaryRecord>(
            "SELECT course, date_key, actor, role, color, updated_at FROM understanding_summaries
             WHERE app_id = $1 AND course = $2 AND date_key = $3
             ORDER BY actor ASC",
        )
        .bind(&self.app_id)
        .bind(&day.course)
        .bind(day.date_key.date())
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        records.into_iter().map(SummaryRecord::to_domain).collect()
    }

    async fn list_understanding_events(
        &self,
        day: &ClassDay,
    ) -> PortResult<Vec<UnderstandingEvent>> {
        let records = sqlx::query_as::<_, EventRecord>(
            "SELECT id, course, date_key, actor, role, from_color, to_color, created_at
             FROM understanding_events
             WHERE app_id = $1 AND course = $2 AND date_key = $3
             ORDER BY created_at ASC",
        )
        .bind(&self.app_id)
        .bind(&day.course)
        .bind(day.date_key.date())
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        records.into_iter().map(EventRecord::to_domain).collect()
    }

    async fn insert_question(&self, question: &Question) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO questions
                 (id, app_id, course, date_key, actor, role, text, reply_to, edited_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(question.id)
        .bind(&self.app_id)
        .bind(&question.day.course)
        .bind(question.day.date_key.date())
        .bind(&question.actor)
        .bind(question.role.as_str())
        .bind(&question.text)
        .bind(question.reply_to)
        .bind(question.edited_at)
        .bind(question.created_at)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn get_question(&self, id: Uuid) -> PortResult<Option<Question>> {
        let record = sqlx::query_as::<_, QuestionRecord>(&format!(
            "SELECT {} FROM questions WHERE app_id = $1 AND id = $2",
            QUESTION_COLUMNS
        ))
        .bind(&self.app_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;
        record.map(QuestionRecord::to_domain).transpose()
    }

    async fn list_questions(&self, day: &ClassDay) -> PortResult<Vec<Question>> {
        let records = sqlx::query_as::<_, QuestionRecord>(&format!(
            "SELECT {} FROM questions
             WHERE app_id = $1 AND course = $2 AND date_key = $3
             ORDER BY created_at ASC",
            QUESTION_COLUMNS
        ))
        .bind(&self.app_id)
        .bind(&day.course)
        .bind(day.date_key.date())
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        records.into_iter().map(QuestionRecord::to_domain).collect()
    }

    async fn update_question_text(
        &self,
        id: Uuid,
        text: &str,
        edited_at: DateTime<Utc>,
    ) -> PortResult<Question> {
        let record = sqlx::query_as::<_, QuestionRecord>(&format!(
            "UPDATE questions SET text = $1, edited_at = $2
             WHERE app_id = $3 AND id = $4
             RETURNING {}",
            QUESTION_COLUMNS
        ))
        .bind(text)
        .bind(edited_at)
        .bind(&self.app_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        match record {
            Some(record) => record.to_domain(),
            None => Err(PortError::NotFound(format!("Question {} not found", id))),
        }
    }

    async fn delete_questions(&self, ids: &[Uuid]) -> PortResult<()> {
        sqlx::query("DELETE FROM questions WHERE app_id = $1 AND id = ANY($2)")
            .bind(&self.app_id)
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}
