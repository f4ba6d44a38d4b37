//! Environment-derived configuration for the auth stack.
//!
//! Providers whose credentials are absent are simply not registered: their
//! routes answer with a graceful diagnostic instead of a crash at startup.

use std::sync::Arc;

use lockside_core::error::AuthError;
use lockside_flow::{OAuth2Flow, PkceConfig, PkceHandshake};
use lockside_identity::UserStore;
use lockside_providers_facebook::FacebookProvider;
use lockside_providers_google::GoogleProvider;
use lockside_providers_twitter::TwitterProvider;
use lockside_session::{SessionConfig, SessionStore};
use log::info;

use crate::AppState;

/// One provider's credential pair.
#[derive(Clone, Debug)]
pub struct OAuthKeys {
    /// Client id / app id / consumer key.
    pub id: String,
    /// Client secret / app secret / consumer secret.
    pub secret: String,
}

/// Everything read from the environment.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET`.
    pub google: Option<OAuthKeys>,
    /// `FACEBOOK_APP_ID` / `FACEBOOK_APP_SECRET`.
    pub facebook: Option<OAuthKeys>,
    /// `TWITTER_CONSUMER_KEY` / `TWITTER_CONSUMER_SECRET`.
    pub twitter: Option<OAuthKeys>,
    /// Externally-visible base URL callbacks are derived from.
    pub callback_base: String,
}

fn keys_from_env(id_var: &str, secret_var: &str) -> Option<OAuthKeys> {
    match (std::env::var(id_var), std::env::var(secret_var)) {
        (Ok(id), Ok(secret)) if !id.is_empty() && !secret.is_empty() => {
            Some(OAuthKeys { id, secret })
        }
        _ => None,
    }
}

impl AuthConfig {
    /// Read configuration from the process environment.
    ///
    /// With `APP_DOMAIN` set the callback base is `https://{APP_DOMAIN}`
    /// (production); otherwise it defaults to the local development server.
    pub fn from_env() -> Self {
        let callback_base = match std::env::var("APP_DOMAIN") {
            Ok(domain) if !domain.is_empty() => format!("https://{domain}"),
            _ => "http://localhost:3000".to_string(),
        };
        Self {
            google: keys_from_env("GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET"),
            facebook: keys_from_env("FACEBOOK_APP_ID", "FACEBOOK_APP_SECRET"),
            twitter: keys_from_env("TWITTER_CONSUMER_KEY", "TWITTER_CONSUMER_SECRET"),
            callback_base,
        }
    }

    /// Absolute callback URL for a route path.
    pub fn callback_url(&self, path: &str) -> String {
        format!("{}{path}", self.callback_base)
    }
}

/// Wire configured providers into an [`AppState`].
pub fn build_state(
    config: &AuthConfig,
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    session_config: SessionConfig,
) -> Result<AppState, AuthError> {
    let mut state = AppState::new(users, sessions, session_config);

    if let Some(keys) = &config.google {
        let provider = GoogleProvider::new(
            keys.id.clone(),
            keys.secret.clone(),
            config.callback_url("/auth/google/callback"),
        )?;
        state.register_delegated(
            "google",
            Arc::new(OAuth2Flow::new(provider)),
            "google_auth_failed",
        );
        info!("registered google login");
    }

    if let Some(keys) = &config.facebook {
        let provider = FacebookProvider::new(
            keys.id.clone(),
            keys.secret.clone(),
            config.callback_url("/auth/facebook/callback"),
        )?;
        state.register_delegated(
            "facebook",
            Arc::new(OAuth2Flow::new(provider)),
            "facebook_auth_failed",
        );
        info!("registered facebook login");
    }

    if let Some(keys) = &config.twitter {
        let engine = PkceHandshake::new(PkceConfig::new(
            keys.id.clone(),
            keys.secret.clone(),
            config.callback_url("/auth/twitter/callback"),
        ))?;
        state.twitter_pkce = Some(Arc::new(engine));

        let provider = TwitterProvider::new(
            keys.id.clone(),
            keys.secret.clone(),
            config.callback_url("/auth/twitter/fallback/callback"),
        )?;
        state.register_delegated(
            "twitter_fallback",
            Arc::new(OAuth2Flow::new(provider)),
            "twitter_fallback_failed",
        );
        info!("registered twitter login (pkce + fallback)");
    }

    Ok(state)
}
