use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity sources a [`User`] can originate from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Username + password account stored locally.
    Local,
    /// Google, through the delegated strategy.
    Google,
    /// Facebook, through the delegated strategy.
    Facebook,
    /// Twitter, through the PKCE handshake or the legacy fallback.
    Twitter,
}

impl Provider {
    /// Lower-case wire name of the provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Local => "local",
            Provider::Google => "google",
            Provider::Facebook => "facebook",
            Provider::Twitter => "twitter",
        }
    }

    /// Whether this provider authenticates through an external party.
    pub fn is_federated(&self) -> bool {
        !matches!(self, Provider::Local)
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted user identity.
///
/// Exactly one of `password_hash` and `provider_id` is present: a user is
/// either local or federated, never both. `(provider, provider_id)` is the
/// stable, immutable key for federated users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Opaque unique identifier, assigned at creation, never reused.
    pub id: Uuid,
    /// Unique across all users, case-sensitive as stored.
    pub username: String,
    /// Lower-cased before storage and lookup; absent for pure-OAuth identities.
    pub email: Option<String>,
    /// Argon2id PHC string, present only for local accounts.
    pub password_hash: Option<String>,
    /// Which identity source this user came from.
    pub provider: Provider,
    /// Provider-assigned identifier, unique per provider for federated users.
    pub provider_id: Option<String>,
    /// Unique across all users; mutable after creation.
    pub display_name: String,
    /// Optional avatar URL.
    pub avatar: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Project into the client-safe summary.
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.to_string(),
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            avatar: self.avatar.clone(),
            provider: self.provider,
        }
    }
}

/// The subset of a [`User`] that is safe to send to the client.
///
/// Never carries the password hash or the email address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    /// String form of the user id.
    pub id: String,
    /// Login name.
    pub username: String,
    /// Public display name.
    pub display_name: String,
    /// Optional avatar URL.
    pub avatar: Option<String>,
    /// Identity source.
    pub provider: Provider,
}

/// What a completed provider exchange tells us about the user.
///
/// Informational at login time: an existing federated user is returned
/// unchanged, profile fields only seed newly created identities.
#[derive(Debug, Clone)]
pub struct ProviderProfile {
    /// Which provider vouched for this identity.
    pub provider: Provider,
    /// The provider's stable identifier for the user.
    pub provider_id: String,
    /// Provider-side handle (e.g. the Twitter username), when one exists.
    pub handle: Option<String>,
    /// Provider-side display name.
    pub display_name: Option<String>,
    /// Email, when the provider shares one.
    pub email: Option<String>,
    /// Profile image URL.
    pub avatar: Option<String>,
}
