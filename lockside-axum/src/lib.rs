//! Axum route orchestrator for lockside.
//!
//! Binds the credential verifier, the identity resolver, the session store,
//! the delegated flows and the PKCE handshake engine to the `/auth/*` HTTP
//! surface. Local endpoints speak JSON; OAuth endpoints are browser-navigated
//! and always answer failures with a redirect carrying a machine-readable
//! `error` query parameter.

use std::collections::HashMap;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use lockside_core::DelegatedFlow;
use lockside_flow::PkceHandshake;
use lockside_identity::{CredentialVerifier, IdentityResolver, UserStore};
use lockside_session::{SessionConfig, SessionStore};
use tower_cookies::CookieManagerLayer;

pub mod config;
mod error;
mod extract;
mod handlers;

pub use config::{build_state, AuthConfig, OAuthKeys};
pub use error::ApiError;
pub use extract::AuthSession;

/// A delegated flow registered under a route key, with the diagnostic code
/// its failures redirect with.
#[derive(Clone)]
pub struct RegisteredFlow {
    /// The type-erased flow.
    pub flow: Arc<dyn DelegatedFlow>,
    /// e.g. `google_auth_failed`.
    pub failure_code: &'static str,
}

/// Everything the `/auth/*` handlers need.
#[derive(Clone)]
pub struct AppState {
    /// User persistence collaborator.
    pub users: Arc<dyn UserStore>,
    /// Session persistence collaborator.
    pub sessions: Arc<dyn SessionStore>,
    /// Session cookie settings.
    pub session_config: SessionConfig,
    /// Local register/login.
    pub verifier: Arc<CredentialVerifier>,
    /// Federated find-or-create and display-name updates.
    pub resolver: Arc<IdentityResolver>,
    /// Delegated flows by route key (`google`, `facebook`, `twitter_fallback`).
    pub delegated: HashMap<String, RegisteredFlow>,
    /// The hand-rolled Twitter PKCE engine, absent when unconfigured.
    pub twitter_pkce: Option<Arc<PkceHandshake>>,
}

impl AppState {
    /// State with no providers registered yet.
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        session_config: SessionConfig,
    ) -> Self {
        Self {
            verifier: Arc::new(CredentialVerifier::new(users.clone())),
            resolver: Arc::new(IdentityResolver::new(users.clone())),
            users,
            sessions,
            session_config,
            delegated: HashMap::new(),
            twitter_pkce: None,
        }
    }

    /// Register a delegated flow under a route key.
    pub fn register_delegated(
        &mut self,
        key: impl Into<String>,
        flow: Arc<dyn DelegatedFlow>,
        failure_code: &'static str,
    ) {
        self.delegated
            .insert(key.into(), RegisteredFlow { flow, failure_code });
    }
}

/// Build the complete `/auth` router, cookie layer included.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/me", get(handlers::me))
        .route("/auth/status", get(handlers::status))
        .route("/auth/update-display-name", post(handlers::update_display_name))
        .route("/auth/twitter", get(handlers::twitter_begin))
        .route("/auth/twitter/callback", get(handlers::twitter_callback))
        .route("/auth/twitter/fallback", get(handlers::twitter_fallback_begin))
        .route(
            "/auth/twitter/fallback/callback",
            get(handlers::twitter_fallback_callback),
        )
        .route("/auth/{provider}", get(handlers::delegated_begin))
        .route("/auth/{provider}/callback", get(handlers::delegated_callback))
        .layer(CookieManagerLayer::new())
        .with_state(state)
}
