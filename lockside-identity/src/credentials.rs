use std::sync::Arc;

use chrono::Utc;
use lockside_core::error::AuthError;
use lockside_core::user::{Provider, User};
use log::error;
use uuid::Uuid;

use crate::password;
use crate::store::UserStore;

/// Local username/password authentication.
pub struct CredentialVerifier {
    store: Arc<dyn UserStore>,
}

impl CredentialVerifier {
    /// Build a verifier on top of the given store.
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Create a local account.
    ///
    /// The email is lower-cased before storage so uniqueness is
    /// case-insensitive. The store's own constraints decide conflicts; this
    /// method just maps them.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let username = username.trim();
        let email = email.trim().to_lowercase();
        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "Username, email and password are required".into(),
            ));
        }

        let password_hash = password::hash_password(password)?;
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: Some(email),
            password_hash: Some(password_hash),
            provider: Provider::Local,
            provider_id: None,
            display_name: username.to_string(),
            avatar: None,
            created_at: Utc::now(),
        };
        Ok(self.store.insert(user).await?)
    }

    /// Authenticate a local account.
    ///
    /// Every failure path returns the same [`AuthError::InvalidCredentials`]:
    /// unknown username, federated-only account, and wrong password are
    /// indistinguishable to the caller.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let user = self
            .store
            .find_by_username(username)
            .await
            .map_err(AuthError::from)?
            .ok_or(AuthError::InvalidCredentials)?;

        let hash = user
            .password_hash
            .as_deref()
            .ok_or(AuthError::InvalidCredentials)?;

        match password::verify_password(password, hash) {
            Ok(true) => Ok(user),
            Ok(false) => Err(AuthError::InvalidCredentials),
            Err(e) => {
                error!("stored hash for {username:?} is unreadable: {e}");
                Err(AuthError::InvalidCredentials)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryUserStore;

    fn verifier() -> CredentialVerifier {
        CredentialVerifier::new(Arc::new(MemoryUserStore::new()))
    }

    #[tokio::test]
    async fn register_then_login() {
        let verifier = verifier();
        let created = verifier
            .register("trader1", "t1@x.com", "secret123")
            .await
            .unwrap();
        assert_eq!(created.provider, Provider::Local);
        assert_eq!(created.email.as_deref(), Some("t1@x.com"));
        assert!(created.password_hash.is_some());
        assert!(created.provider_id.is_none());

        let logged_in = verifier.login("trader1", "secret123").await.unwrap();
        assert_eq!(logged_in.id, created.id);
    }

    #[tokio::test]
    async fn register_rejects_empty_fields() {
        let verifier = verifier();
        for (u, e, p) in [
            ("", "t1@x.com", "secret123"),
            ("trader1", "", "secret123"),
            ("trader1", "t1@x.com", ""),
            ("   ", "t1@x.com", "secret123"),
        ] {
            let err = verifier.register(u, e, p).await.unwrap_err();
            assert!(matches!(err, AuthError::Validation(_)), "{u:?}/{e:?}/{p:?}");
        }
    }

    #[tokio::test]
    async fn email_uniqueness_is_case_insensitive() {
        let verifier = verifier();
        verifier
            .register("trader1", "A@x.com", "secret123")
            .await
            .unwrap();
        let err = verifier
            .register("trader2", "a@x.com", "secret123")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let verifier = verifier();
        verifier
            .register("trader1", "t1@x.com", "secret123")
            .await
            .unwrap();
        let err = verifier
            .register("trader1", "t2@x.com", "secret123")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let store = Arc::new(MemoryUserStore::new());
        let verifier = CredentialVerifier::new(store.clone());
        verifier
            .register("trader1", "t1@x.com", "secret123")
            .await
            .unwrap();

        // A federated-only identity with no password hash.
        store
            .insert(User {
                id: Uuid::new_v4(),
                username: "tw_user".into(),
                email: None,
                password_hash: None,
                provider: Provider::Twitter,
                provider_id: Some("42".into()),
                display_name: "tw_user".into(),
                avatar: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let unknown = verifier.login("nobody", "secret123").await.unwrap_err();
        let wrong = verifier.login("trader1", "wrong").await.unwrap_err();
        let federated = verifier.login("tw_user", "secret123").await.unwrap_err();

        for err in [&unknown, &wrong, &federated] {
            assert!(matches!(err, AuthError::InvalidCredentials));
        }
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert_eq!(wrong.to_string(), federated.to_string());
    }
}
