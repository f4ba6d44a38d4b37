use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lockside_core::error::AuthError;
use lockside_core::user::User;

use crate::{Handshake, Session, SessionStore};

/// Postgres-backed [`SessionStore`] for multi-instance deployments.
///
/// Handshakes live in their own table so consumption is a single
/// `DELETE … RETURNING`: the row exists exactly until the first callback
/// redeems it, regardless of which instance initiated the flow.
///
/// Expected schema:
///
/// ```sql
/// CREATE TABLE lockside_sessions (
///     id         TEXT PRIMARY KEY,
///     user_data  TEXT,
///     created_at TIMESTAMPTZ NOT NULL,
///     expires_at TIMESTAMPTZ NOT NULL
/// );
/// CREATE TABLE lockside_handshakes (
///     session_id    TEXT PRIMARY KEY,
///     code_verifier TEXT NOT NULL,
///     state         TEXT NOT NULL,
///     created_at    TIMESTAMPTZ NOT NULL,
///     return_to     TEXT
/// );
/// ```
#[derive(Clone, Debug)]
pub struct PgSessionStore {
    pool: sqlx::PgPool,
    sessions_table: String,
    handshakes_table: String,
}

impl PgSessionStore {
    /// Build a store over the given pool with the default table names.
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self {
            pool,
            sessions_table: "lockside_sessions".to_string(),
            handshakes_table: "lockside_handshakes".to_string(),
        }
    }

    /// Build a store with custom table names.
    pub fn with_table_names(
        pool: sqlx::PgPool,
        sessions_table: String,
        handshakes_table: String,
    ) -> Self {
        Self {
            pool,
            sessions_table,
            handshakes_table,
        }
    }

    fn decode_user(raw: Option<String>) -> Result<Option<User>, AuthError> {
        raw.map(|json| {
            serde_json::from_str(&json)
                .map_err(|e| AuthError::Store(format!("user deserialization error: {e}")))
        })
        .transpose()
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn load(&self, id: &str) -> Result<Option<Session>, AuthError> {
        let query = format!(
            "SELECT user_data, created_at, expires_at FROM {} WHERE id = $1 AND expires_at > $2",
            self.sessions_table
        );
        let row: Option<(Option<String>, DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(&query)
            .bind(id)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuthError::Store(format!("load session: {e}")))?;

        let Some((user_data, created_at, expires_at)) = row else {
            return Ok(None);
        };

        let query = format!(
            "SELECT code_verifier, state, created_at, return_to FROM {} WHERE session_id = $1",
            self.handshakes_table
        );
        let handshake: Option<(String, String, DateTime<Utc>, Option<String>)> =
            sqlx::query_as(&query)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AuthError::Store(format!("load handshake: {e}")))?;

        Ok(Some(Session {
            id: id.to_string(),
            user: Self::decode_user(user_data)?,
            handshake: handshake.map(|(code_verifier, state, created_at, return_to)| Handshake {
                code_verifier,
                state,
                created_at,
                return_to,
            }),
            created_at,
            expires_at,
        }))
    }

    async fn save(&self, session: &Session) -> Result<(), AuthError> {
        let user_data = session
            .user
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| AuthError::Store(format!("user serialization error: {e}")))?;

        let query = format!(
            "INSERT INTO {} (id, user_data, created_at, expires_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO UPDATE SET
             user_data = $2, created_at = $3, expires_at = $4",
            self.sessions_table
        );
        sqlx::query(&query)
            .bind(&session.id)
            .bind(user_data)
            .bind(session.created_at)
            .bind(session.expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Store(format!("save session: {e}")))?;

        match &session.handshake {
            Some(handshake) => {
                let query = format!(
                    "INSERT INTO {} (session_id, code_verifier, state, created_at, return_to)
                     VALUES ($1, $2, $3, $4, $5)
                     ON CONFLICT (session_id) DO UPDATE SET
                     code_verifier = $2, state = $3, created_at = $4, return_to = $5",
                    self.handshakes_table
                );
                sqlx::query(&query)
                    .bind(&session.id)
                    .bind(&handshake.code_verifier)
                    .bind(&handshake.state)
                    .bind(handshake.created_at)
                    .bind(&handshake.return_to)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| AuthError::Store(format!("save handshake: {e}")))?;
            }
            None => {
                let query = format!("DELETE FROM {} WHERE session_id = $1", self.handshakes_table);
                sqlx::query(&query)
                    .bind(&session.id)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| AuthError::Store(format!("clear handshake: {e}")))?;
            }
        }

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), AuthError> {
        let query = format!("DELETE FROM {} WHERE session_id = $1", self.handshakes_table);
        sqlx::query(&query)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Store(format!("delete handshake: {e}")))?;

        let query = format!("DELETE FROM {} WHERE id = $1", self.sessions_table);
        sqlx::query(&query)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Store(format!("delete session: {e}")))?;
        Ok(())
    }

    async fn take_handshake(&self, id: &str) -> Result<Option<Handshake>, AuthError> {
        // DELETE … RETURNING is the atomic read-then-delete: a concurrent
        // replay of the same callback deletes zero rows and gets nothing.
        let query = format!(
            "DELETE FROM {} WHERE session_id = $1
             RETURNING code_verifier, state, created_at, return_to",
            self.handshakes_table
        );
        let row: Option<(String, String, DateTime<Utc>, Option<String>)> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuthError::Store(format!("take handshake: {e}")))?;

        Ok(
            row.map(|(code_verifier, state, created_at, return_to)| Handshake {
                code_verifier,
                state,
                created_at,
                return_to,
            }),
        )
    }
}
