use std::collections::HashMap;

use async_trait::async_trait;
use lockside_core::error::AuthError;
use log::debug;
use tokio::sync::RwLock;

use crate::{Handshake, Session, SessionStore};

/// In-memory [`SessionStore`].
///
/// Single-instance only: handshake state held here cannot be redeemed by a
/// callback that lands on a different process, and nothing survives restart
/// (which is exactly what the handshake artifacts require).
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &str) -> Result<Option<Session>, AuthError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get(id) {
            Some(session) if session.is_expired() => {
                debug!("session {id} expired, dropping");
                sessions.remove(id);
                Ok(None)
            }
            Some(session) => Ok(Some(session.clone())),
            None => Ok(None),
        }
    }

    async fn save(&self, session: &Session) -> Result<(), AuthError> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), AuthError> {
        self.sessions.write().await.remove(id);
        Ok(())
    }

    async fn take_handshake(&self, id: &str) -> Result<Option<Handshake>, AuthError> {
        // One write lock covers the read and the removal, so two racing
        // callbacks cannot both redeem the same handshake.
        let mut sessions = self.sessions.write().await;
        Ok(sessions.get_mut(id).and_then(|s| s.handshake.take()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    fn session_with_handshake() -> Session {
        let mut session = Session::anonymous(Duration::hours(24));
        session.handshake = Some(Handshake::new(
            "verifier".into(),
            "state-token".into(),
            Some("/portfolio".into()),
        ));
        session
    }

    #[tokio::test]
    async fn save_load_delete_round_trip() {
        let store = MemorySessionStore::new();
        let session = Session::anonymous(Duration::hours(1));
        store.save(&session).await.unwrap();
        assert!(store.load(&session.id).await.unwrap().is_some());
        store.delete(&session.id).await.unwrap();
        assert!(store.load(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_sessions_load_as_absent() {
        let store = MemorySessionStore::new();
        let mut session = Session::anonymous(Duration::hours(1));
        session.expires_at = Utc::now() - Duration::seconds(1);
        store.save(&session).await.unwrap();
        assert!(store.load(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn handshake_is_taken_exactly_once() {
        let store = MemorySessionStore::new();
        let session = session_with_handshake();
        store.save(&session).await.unwrap();

        let first = store.take_handshake(&session.id).await.unwrap();
        assert_eq!(first.unwrap().state, "state-token");
        assert!(store.take_handshake(&session.id).await.unwrap().is_none());

        // The session itself survives, minus the handshake.
        let reloaded = store.load(&session.id).await.unwrap().unwrap();
        assert!(reloaded.handshake.is_none());
    }

    #[tokio::test]
    async fn concurrent_takes_yield_a_single_winner() {
        let store = Arc::new(MemorySessionStore::new());
        let session = session_with_handshake();
        store.save(&session).await.unwrap();

        let (a, b) = tokio::join!(
            store.take_handshake(&session.id),
            store.take_handshake(&session.id),
        );
        let winners = [a.unwrap(), b.unwrap()]
            .into_iter()
            .filter(Option::is_some)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn handshake_ttl_boundary() {
        let mut handshake = Handshake::new("v".into(), "s".into(), None);
        assert!(!handshake.is_expired());
        handshake.created_at = Utc::now() - Duration::minutes(crate::HANDSHAKE_TTL_MINUTES + 1);
        assert!(handshake.is_expired());
    }
}
