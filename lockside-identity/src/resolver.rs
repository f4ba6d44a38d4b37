use std::sync::Arc;

use chrono::Utc;
use lockside_core::error::AuthError;
use lockside_core::user::{ProviderProfile, User};
use log::{debug, warn};
use uuid::Uuid;

use crate::store::{ConflictKind, StoreError, UserStore};

/// Display name length bounds, after trimming.
const DISPLAY_NAME_MIN: usize = 2;
const DISPLAY_NAME_MAX: usize = 50;

/// Finds-or-creates a local [`User`] for a federated identity, and owns the
/// display-name update path.
pub struct IdentityResolver {
    store: Arc<dyn UserStore>,
}

impl IdentityResolver {
    /// Build a resolver on top of the given store.
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Resolve a `(provider, provider_id)` pair to a persisted user.
    ///
    /// Idempotent: an existing user is returned unchanged, the provider's
    /// profile fields never overwrite a stored identity at login time. Safe
    /// under concurrent identical callbacks: the store's uniqueness
    /// constraints are the single source of truth, and an insert that loses
    /// the race re-fetches the winner instead of failing.
    pub async fn resolve_federated(&self, profile: &ProviderProfile) -> Result<User, AuthError> {
        if let Some(existing) = self
            .store
            .find_federated(profile.provider, &profile.provider_id)
            .await
            .map_err(AuthError::from)?
        {
            debug!(
                "federated login matched existing user {} ({})",
                existing.id, existing.username
            );
            return Ok(existing);
        }

        let fallback_username = format!("{}_{}", profile.provider, profile.provider_id);
        let username = profile
            .handle
            .clone()
            .unwrap_or_else(|| fallback_username.clone());
        let display_name = profile
            .display_name
            .clone()
            .or_else(|| profile.handle.clone())
            .unwrap_or_else(|| username.clone());

        let mut candidate = User {
            id: Uuid::new_v4(),
            username,
            email: profile.email.as_ref().map(|e| e.to_lowercase()),
            password_hash: None,
            provider: profile.provider,
            provider_id: Some(profile.provider_id.clone()),
            display_name,
            avatar: profile.avatar.clone(),
            created_at: Utc::now(),
        };

        // Each conflict kind has exactly one fallback, so a handful of
        // attempts covers every combination.
        for _ in 0..4 {
            match self.store.insert(candidate.clone()).await {
                Ok(created) => {
                    debug!(
                        "created user {} for {}:{}",
                        created.id, profile.provider, profile.provider_id
                    );
                    return Ok(created);
                }
                Err(StoreError::Conflict(ConflictKind::ProviderIdentity)) => {
                    // A concurrent callback for the same identity won the
                    // race; the winner's row is the identity.
                    warn!(
                        "lost federated insert race for {}:{}, re-fetching",
                        profile.provider, profile.provider_id
                    );
                    return self
                        .store
                        .find_federated(profile.provider, &profile.provider_id)
                        .await
                        .map_err(AuthError::from)?
                        .ok_or_else(|| {
                            AuthError::Store("federated identity vanished after conflict".into())
                        });
                }
                Err(StoreError::Conflict(ConflictKind::Username)) => {
                    if candidate.username == fallback_username {
                        // The deterministic fallback itself is squatted by an
                        // unrelated account; this needs human disambiguation.
                        return Err(AuthError::Conflict(
                            ConflictKind::Username.message().to_string(),
                        ));
                    }
                    candidate.username = fallback_username.clone();
                }
                Err(StoreError::Conflict(ConflictKind::DisplayName)) => {
                    if candidate.display_name == candidate.username {
                        return Err(AuthError::Conflict(
                            ConflictKind::DisplayName.message().to_string(),
                        ));
                    }
                    candidate.display_name = candidate.username.clone();
                }
                Err(StoreError::Conflict(ConflictKind::Email)) => {
                    // Another account already owns the address; a federated
                    // identity does not need one to log in.
                    candidate.email = None;
                }
                Err(err @ StoreError::Backend(_)) => return Err(err.into()),
            }
        }

        Err(AuthError::Conflict(
            "Unable to allocate a unique identity for this account".into(),
        ))
    }

    /// Change a user's display name.
    ///
    /// Length is validated after trimming; uniqueness against other users is
    /// enforced by the store at update time. Renaming to one's own current
    /// value succeeds.
    pub async fn update_display_name(
        &self,
        user_id: Uuid,
        new_name: &str,
    ) -> Result<User, AuthError> {
        let name = new_name.trim();
        let len = name.chars().count();
        if !(DISPLAY_NAME_MIN..=DISPLAY_NAME_MAX).contains(&len) {
            return Err(AuthError::Validation(format!(
                "Display name must be between {DISPLAY_NAME_MIN} and {DISPLAY_NAME_MAX} characters"
            )));
        }
        Ok(self.store.set_display_name(user_id, name).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CredentialVerifier, MemoryUserStore};
    use lockside_core::user::Provider;

    fn twitter_profile(id: &str, handle: Option<&str>) -> ProviderProfile {
        ProviderProfile {
            provider: Provider::Twitter,
            provider_id: id.into(),
            handle: handle.map(Into::into),
            display_name: Some("Day Trader".into()),
            email: None,
            avatar: Some("https://pbs.example/avatar.png".into()),
        }
    }

    fn resolver_with_store() -> (IdentityResolver, Arc<MemoryUserStore>) {
        let store = Arc::new(MemoryUserStore::new());
        (IdentityResolver::new(store.clone()), store)
    }

    #[tokio::test]
    async fn resolve_is_idempotent() {
        let (resolver, _) = resolver_with_store();
        let profile = twitter_profile("42", Some("daytrader"));

        let first = resolver.resolve_federated(&profile).await.unwrap();
        assert_eq!(first.username, "daytrader");
        assert_eq!(first.display_name, "Day Trader");
        assert_eq!(first.avatar.as_deref(), Some("https://pbs.example/avatar.png"));
        assert!(first.password_hash.is_none());

        let second = resolver.resolve_federated(&profile).await.unwrap();
        assert_eq!(second.id, first.id);
    }

    #[tokio::test]
    async fn concurrent_resolutions_converge_on_one_user() {
        let (resolver, store) = resolver_with_store();
        let resolver = Arc::new(resolver);
        let profile = twitter_profile("42", Some("daytrader"));

        let (a, b) = tokio::join!(
            resolver.resolve_federated(&profile),
            resolver.resolve_federated(&profile),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.id, b.id);
        assert!(store
            .find_federated(Provider::Twitter, "42")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn missing_handle_uses_deterministic_fallback() {
        let (resolver, _) = resolver_with_store();
        let user = resolver
            .resolve_federated(&twitter_profile("42", None))
            .await
            .unwrap();
        assert_eq!(user.username, "twitter_42");
    }

    #[tokio::test]
    async fn taken_handle_falls_back_then_squatted_fallback_conflicts() {
        let (resolver, store) = resolver_with_store();
        let verifier = CredentialVerifier::new(store.clone());
        verifier
            .register("daytrader", "dt@x.com", "secret123")
            .await
            .unwrap();

        // Handle taken by a local account: fall back deterministically.
        let user = resolver
            .resolve_federated(&twitter_profile("42", Some("daytrader")))
            .await
            .unwrap();
        assert_eq!(user.username, "twitter_42");

        // Now squat the deterministic fallback for a different identity.
        verifier
            .register("twitter_43", "sq@x.com", "secret123")
            .await
            .unwrap();
        let err = resolver
            .resolve_federated(&twitter_profile("43", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));
    }

    #[tokio::test]
    async fn display_name_collision_falls_back_to_username() {
        let (resolver, _) = resolver_with_store();
        resolver
            .resolve_federated(&twitter_profile("1", Some("alpha")))
            .await
            .unwrap();
        // Same display name, different identity and handle.
        let user = resolver
            .resolve_federated(&twitter_profile("2", Some("beta")))
            .await
            .unwrap();
        assert_eq!(user.display_name, "beta");
    }

    #[tokio::test]
    async fn update_display_name_validates_and_conflicts() {
        let (resolver, store) = resolver_with_store();
        let verifier = CredentialVerifier::new(store.clone());
        let alice = verifier
            .register("alice", "a@x.com", "secret123")
            .await
            .unwrap();
        verifier
            .register("bob", "b@x.com", "secret123")
            .await
            .unwrap();

        let too_long = "x".repeat(51);
        for bad in ["a", " a ", too_long.as_str()] {
            let err = resolver
                .update_display_name(alice.id, bad)
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::Validation(_)), "{bad:?}");
        }

        let err = resolver.update_display_name(alice.id, "bob").await.unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));

        let renamed = resolver
            .update_display_name(alice.id, "  Alice the Bold  ")
            .await
            .unwrap();
        assert_eq!(renamed.display_name, "Alice the Bold");

        // A no-op rename to the current value is allowed.
        let same = resolver
            .update_display_name(alice.id, "Alice the Bold")
            .await
            .unwrap();
        assert_eq!(same.display_name, "Alice the Bold");
    }
}
