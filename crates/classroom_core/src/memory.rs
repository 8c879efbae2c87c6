//! crates/classroom_core/src/memory.rs
//!
//! An in-process implementation of the `DatabaseService` port. Used for local
//! runs without PostgreSQL and as the store behind the test suites.

use crate::domain::{
    AuthIdentity, ClassDay, Color, Credential, Question, Role, SessionWindow,
    UnderstandingEvent, UnderstandingSummary,
};
use crate::ports::{DatabaseService, PortError, PortResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    credentials: HashMap<(String, String), Credential>,
    auth_sessions: HashMap<String, (AuthIdentity, DateTime<Utc>)>,
    windows: HashMap<ClassDay, SessionWindow>,
    summaries: HashMap<(ClassDay, String), UnderstandingSummary>,
    events: Vec<UnderstandingEvent>,
    questions: Vec<Question>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> PortResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| PortError::BackendUnavailable("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl DatabaseService for InMemoryStore {
    async fn get_credential(&self, scope: &str, name: &str) -> PortResult<Option<Credential>> {
        let tables = self.tables()?;
        Ok(tables
            .credentials
            .get(&(scope.to_string(), name.to_string()))
            .cloned())
    }

    async fn insert_credential(&self, credential: &Credential) -> PortResult<()> {
        let mut tables = self.tables()?;
        let key = (credential.scope.clone(), credential.name.clone());
        if tables.credentials.contains_key(&key) {
            return Err(PortError::AlreadyRegistered);
        }
        tables.credentials.insert(key, credential.clone());
        Ok(())
    }

    async fn create_auth_session(
        &self,
        token: &str,
        identity: &AuthIdentity,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut tables = self.tables()?;
        tables
            .auth_sessions
            .insert(token.to_string(), (identity.clone(), expires_at));
        Ok(())
    }

    async fn validate_auth_session(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> PortResult<AuthIdentity> {
        let tables = self.tables()?;
        match tables.auth_sessions.get(token) {
            Some((identity, expires_at)) if *expires_at > now => Ok(identity.clone()),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, token: &str) -> PortResult<()> {
        self.tables()?.auth_sessions.remove(token);
        Ok(())
    }

    async fn purge_expired_auth_sessions(&self, now: DateTime<Utc>) -> PortResult<u64> {
        let mut tables = self.tables()?;
        let before = tables.auth_sessions.len();
        tables
            .auth_sessions
            .retain(|_, (_, expires_at)| *expires_at > now);
        Ok((before - tables.auth_sessions.len()) as u64)
    }

    async fn get_window(&self, day: &ClassDay) -> PortResult<Option<SessionWindow>> {
        Ok(self.tables()?.windows.get(day).cloned())
    }

    async fn put_window(&self, window: &SessionWindow) -> PortResult<()> {
        self.tables()?
            .windows
            .insert(window.day.clone(), window.clone());
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
        let mut tables = self.tables()?;
        let key = (day.clone(), actor.to_string());
        let from_color = tables.summaries.get(&key).map(|s| s.color);
        tables.summaries.insert(
            key,
            UnderstandingSummary {
                day: day.clone(),
                actor: actor.to_string(),
                role,
                color,
                updated_at: at,
            },
        );
        let event = UnderstandingEvent {
            id: Uuid::new_v4(),
            day: day.clone(),
            actor: actor.to_string(),
            role,
            from_color,
            to_color: color,
            created_at: at,
        };
        tables.events.push(event.clone());
        Ok(event)
    }

    async fn list_summaries(&self, day: &ClassDay) -> PortResult<Vec<UnderstandingSummary>> {
        let tables = self.tables()?;
        let mut rows: Vec<UnderstandingSummary> = tables
            .summaries
            .values()
            .filter(|s| &s.day == day)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.actor.cmp(&b.actor));
        Ok(rows)
    }

    async fn list_understanding_events(
        &self,
        day: &ClassDay,
    ) -> PortResult<Vec<UnderstandingEvent>> {
        let tables = self.tables()?;
        let mut events: Vec<UnderstandingEvent> = tables
            .events
            .iter()
            .filter(|e| &e.day == day)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.created_at);
        Ok(events)
    }

    async fn insert_question(&self, question: &Question) -> PortResult<()> {
        self.tables()?.questions.push(question.clone());
        Ok(())
    }

    async fn get_question(&self, id: Uuid) -> PortResult<Option<Question>> {
        let tables = self.tables()?;
        Ok(tables.questions.iter().find(|q| q.id == id).cloned())
    }

    async fn list_questions(&self, day: &ClassDay) -> PortResult<Vec<Question>> {
        let tables = self.tables()?;
        let mut questions: Vec<Question> = tables
            .questions
            .iter()
            .filter(|q| &q.day == day)
            .cloned()
            .collect();
        questions.sort_by_key(|q| q.created_at);
        Ok(questions)
    }

    async fn update_question_text(
        &self,
        id: Uuid,
        text: &str,
        edited_at: DateTime<Utc>,
    ) -> PortResult<Question> {
        let mut tables = self.tables()?;
        let question = tables
            .questions
            .iter_mut()
            .find(|q| q.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Question {} not found", id)))?;
        question.text = text.to_string();
        question.edited_at = Some(edited_at);
        Ok(question.clone())
    }

    async fn delete_questions(&self, ids: &[Uuid]) -> PortResult<()> {
        self.tables()?.questions.retain(|q| !ids.contains(&q.id));
        Ok(())
    }
}
