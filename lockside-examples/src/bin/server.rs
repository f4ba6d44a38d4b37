//! Demo auth server backed by the in-memory stores.
//!
//! Configure providers through the environment (a `.env` file is honored):
//!
//! ```text
//! GOOGLE_CLIENT_ID=...      GOOGLE_CLIENT_SECRET=...
//! FACEBOOK_APP_ID=...       FACEBOOK_APP_SECRET=...
//! TWITTER_CONSUMER_KEY=...  TWITTER_CONSUMER_SECRET=...
//! APP_DOMAIN=game.example.com   # omit for http://localhost:3000
//! ```
//!
//! Providers without credentials are simply not registered; local
//! register/login always works.

use std::sync::Arc;

use lockside_axum::{build_state, router, AuthConfig};
use lockside_identity::MemoryUserStore;
use lockside_session::{MemorySessionStore, SessionConfig};
use log::info;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = AuthConfig::from_env();
    let session_config = SessionConfig {
        // Secure cookies only work once we are behind the https domain.
        secure: config.callback_base.starts_with("https://"),
        ..Default::default()
    };

    let state = build_state(
        &config,
        Arc::new(MemoryUserStore::new()),
        Arc::new(MemorySessionStore::new()),
        session_config,
    )
    .expect("provider wiring failed");

    let app = router(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000")
        .await
        .expect("bind 0.0.0.0:3000");
    info!("listening on http://0.0.0.0:3000");
    axum::serve(listener, app).await.expect("server error");
}
