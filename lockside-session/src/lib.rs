//! Session management for lockside.
//!
//! A [`Session`] is an explicit entity owning a nullable [`User`] reference
//! and, while a PKCE handshake is in flight, the [`Handshake`] artifacts that
//! correlate its two HTTP legs. Stores implement [`SessionStore`]; the
//! in-memory backend is for tests and single-instance deployments, a
//! Postgres-backed store is available behind the `postgres` feature for
//! multi-instance setups where the initiating request and the callback are
//! not guaranteed to land on the same process.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use lockside_core::error::AuthError;
use lockside_core::user::User;
use serde::{Deserialize, Serialize};

mod memory;
pub use memory::MemorySessionStore;

#[cfg(feature = "postgres")]
mod sql_store;
#[cfg(feature = "postgres")]
pub use sql_store::PgSessionStore;

/// How long an initiated handshake stays redeemable, in minutes.
///
/// The verifier and state tokens are single-use either way; the window only
/// bounds how long an abandoned initiation can linger.
pub const HANDSHAKE_TTL_MINUTES: i64 = 10;

/// Ephemeral artifacts of one PKCE handshake, held between the initiation
/// redirect and the provider callback.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Handshake {
    /// The PKCE secret; never leaves the server.
    pub code_verifier: String,
    /// Anti-forgery token round-tripped through the provider.
    pub state: String,
    /// When the handshake was initiated.
    pub created_at: DateTime<Utc>,
    /// Where to send the browser after a successful login.
    pub return_to: Option<String>,
}

impl Handshake {
    /// Create a handshake stamped with the current time.
    pub fn new(code_verifier: String, state: String, return_to: Option<String>) -> Self {
        Self {
            code_verifier,
            state,
            created_at: Utc::now(),
            return_to,
        }
    }

    /// Whether the handshake has outlived [`HANDSHAKE_TTL_MINUTES`].
    pub fn is_expired(&self) -> bool {
        Utc::now() - self.created_at > Duration::minutes(HANDSHAKE_TTL_MINUTES)
    }
}

/// One browser session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    /// Random identifier carried by the session cookie.
    pub id: String,
    /// The authenticated user, if any. A cached copy: callers that mutate the
    /// user must refresh it.
    pub user: Option<User>,
    /// The pending PKCE handshake, if one is in flight.
    pub handshake: Option<Handshake>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Hard expiry; stores treat an expired session as absent.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// A fresh session with no user attached.
    pub fn anonymous(max_age: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user: None,
            handshake: None,
            created_at: now,
            expires_at: now + max_age,
        }
    }

    /// A fresh session authenticated as `user`.
    pub fn for_user(user: User, max_age: Duration) -> Self {
        let mut session = Self::anonymous(max_age);
        session.user = Some(user);
        session
    }

    /// Whether the session itself has expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Controls whether the session cookie is sent with cross-site requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    /// Sent with "safe" cross-site navigations. Required here: the OAuth
    /// callback is a cross-site top-level navigation.
    Lax,
    /// Same-site requests only.
    Strict,
    /// All requests, including cross-site. Requires `Secure`.
    None,
}

/// Cookie settings for the session.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Name of the session cookie.
    pub cookie_name: String,
    /// Cookie path.
    pub path: String,
    /// Only send over HTTPS.
    pub secure: bool,
    /// Hide from client-side scripts.
    pub http_only: bool,
    /// Cross-site policy.
    pub same_site: SameSite,
    /// Session lifetime.
    pub max_age: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "lockside_sid".to_string(),
            path: "/".to_string(),
            secure: true,
            http_only: true,
            same_site: SameSite::Lax,
            max_age: Duration::hours(24),
        }
    }
}

/// Persistence seam for sessions.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Load a live session. Expired sessions are treated as absent.
    async fn load(&self, id: &str) -> Result<Option<Session>, AuthError>;

    /// Create or replace a session.
    async fn save(&self, session: &Session) -> Result<(), AuthError>;

    /// Destroy a session.
    async fn delete(&self, id: &str) -> Result<(), AuthError>;

    /// Atomically remove and return the session's pending handshake.
    ///
    /// The single point where handshake artifacts are read: a replayed
    /// callback observes `None` on its second attempt because the first,
    /// successful or not, already consumed them.
    async fn take_handshake(&self, id: &str) -> Result<Option<Handshake>, AuthError>;
}
