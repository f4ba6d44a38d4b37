use thiserror::Error;

/// The error taxonomy shared by every lockside crate.
///
/// Transport mapping lives in the HTTP adapter: JSON endpoints answer with a
/// `{message}` body and the matching status code, OAuth endpoints answer with
/// a redirect carrying a machine-readable `error` query parameter.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed or missing input. Maps to 400.
    #[error("{0}")]
    Validation(String),

    /// A uniqueness constraint was violated. Maps to 400.
    #[error("{0}")]
    Conflict(String),

    /// Bad credentials. Deliberately generic: the caller must not learn
    /// whether the username, the password, or the account type was wrong.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// No authenticated session. Maps to 401.
    #[error("Not authenticated")]
    Unauthenticated,

    /// Provider credentials are not configured. Surfaced as a redirect
    /// diagnostic on the OAuth surface, never as a 5xx.
    #[error("provider credentials not configured: {0}")]
    Config(&'static str),

    /// A failure inside the OAuth handshake itself.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The persistence collaborator failed. Maps to 500.
    #[error("storage error: {0}")]
    Store(String),

    /// Anything unexpected. Maps to 500; full detail is logged server-side
    /// and never leaks to the client.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Distinct outcomes of a failed OAuth handshake.
///
/// Each variant maps to its own redirect diagnostic code so the front end can
/// render a specific message, and so a timeout is never mistaken for a
/// provider rejection.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The callback arrived without `code` or `state`.
    #[error("authorization callback is missing code or state")]
    MissingParams,

    /// The callback's state token does not match the pending handshake, the
    /// handshake has expired, or there is no pending handshake at all.
    #[error("state token does not match the pending handshake")]
    StateMismatch,

    /// The provider reported an error instead of an authorization code.
    #[error("provider denied the authorization request: {0}")]
    ProviderDenied(String),

    /// The code-for-token exchange was rejected.
    #[error("token exchange failed: {0}")]
    Exchange(String),

    /// The userinfo fetch was rejected.
    #[error("userinfo request failed: {0}")]
    UserInfo(String),

    /// An outbound provider call exceeded its bounded timeout.
    #[error("provider did not respond in time during {0}")]
    Timeout(&'static str),
}
