use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use lockside_core::error::AuthError;
use lockside_core::user::User;
use lockside_session::Session;
use tower_cookies::Cookies;

use crate::error::ApiError;
use crate::AppState;

/// Extractor for an authenticated session.
///
/// Rejects with 401 when there is no session cookie, the session is unknown
/// or expired, or the session has no user attached.
pub struct AuthSession {
    /// The live session record.
    pub session: Session,
    /// The session's cached user copy.
    pub user: User,
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let cookies = Cookies::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| ApiError(AuthError::Internal(msg.to_string())))?;

        let session = crate::handlers::load_session(state, &cookies)
            .await?
            .ok_or(ApiError(AuthError::Unauthenticated))?;

        match session.user.clone() {
            Some(user) => Ok(AuthSession { session, user }),
            None => Err(ApiError(AuthError::Unauthenticated)),
        }
    }
}
