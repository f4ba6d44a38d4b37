use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use lockside_core::error::{AuthError, ProtocolError};
use log::error;
use serde_json::json;

/// JSON-surface error wrapper.
///
/// Local endpoints answer every failure with `{ "message": … }`; internal
/// detail is logged and redacted from the body.
#[derive(Debug)]
pub struct ApiError(pub AuthError);

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            AuthError::Validation(msg) | AuthError::Conflict(msg) => {
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            AuthError::InvalidCredentials | AuthError::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, self.0.to_string())
            }
            AuthError::Store(detail) | AuthError::Internal(detail) => {
                error!("internal error on json endpoint: {detail}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            // OAuth-surface failures are turned into redirects by their
            // handlers; one reaching the JSON mapper is itself a server bug.
            AuthError::Config(_) | AuthError::Protocol(_) => {
                error!("oauth-surface error leaked to json endpoint: {}", self.0);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

/// A `302 Found` redirect. The OAuth endpoints are browser-navigated, so
/// both their success and failure answers are plain redirects.
pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Redirect to the application root with a machine-readable error code.
pub(crate) fn error_redirect(code: &str) -> Response {
    found(&format!("/?error={code}"))
}

/// Map a PKCE handshake failure to its diagnostic code.
pub(crate) fn twitter_error_code(err: &AuthError) -> &'static str {
    match err {
        AuthError::Config(_) => "twitter_config_missing",
        AuthError::Protocol(ProtocolError::MissingParams) => "twitter_missing_params",
        AuthError::Protocol(ProtocolError::StateMismatch) => "twitter_state_mismatch",
        _ => "twitter_auth_failed",
    }
}
