use async_trait::async_trait;
use lockside_core::error::AuthError;
use lockside_core::user::{Provider, User};
use uuid::Uuid;

/// Which uniqueness constraint an insert or update ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// `username` is already taken.
    Username,
    /// `email` is already registered (comparison is on the lower-cased form).
    Email,
    /// `display_name` is already held by another user.
    DisplayName,
    /// `(provider, provider_id)` already exists.
    ProviderIdentity,
}

impl ConflictKind {
    /// Client-facing message for this conflict.
    pub fn message(&self) -> &'static str {
        match self {
            ConflictKind::Username => "Username already taken",
            ConflictKind::Email => "Email already registered",
            ConflictKind::DisplayName => "Display name already taken",
            ConflictKind::ProviderIdentity => "Account already linked",
        }
    }
}

/// Errors surfaced by a [`UserStore`] backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated. The store is the single source
    /// of truth for uniqueness; callers react to this, they do not pre-lock.
    #[error("{}", .0.message())]
    Conflict(ConflictKind),
    /// The backend itself failed.
    #[error("backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(kind) => AuthError::Conflict(kind.message().to_string()),
            StoreError::Backend(msg) => AuthError::Store(msg),
        }
    }
}

/// Interface boundary of the persisted-storage collaborator.
///
/// Every method that writes enforces the uniqueness constraints atomically;
/// concurrent identical inserts must make exactly one row and fail the rest
/// with [`StoreError::Conflict`].
#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Insert a fully-formed user, enforcing all uniqueness constraints.
    async fn insert(&self, user: User) -> Result<User, StoreError>;

    /// Fetch by id.
    async fn get(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Fetch by exact username.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Fetch by lower-cased email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Fetch by the stable federated key.
    async fn find_federated(
        &self,
        provider: Provider,
        provider_id: &str,
    ) -> Result<Option<User>, StoreError>;

    /// Update a user's display name, enforcing uniqueness against all other
    /// users at update time.
    async fn set_display_name(&self, id: Uuid, display_name: &str) -> Result<User, StoreError>;
}
