use std::collections::HashMap;

use async_trait::async_trait;
use lockside_core::user::{Provider, User};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::{ConflictKind, StoreError, UserStore};

/// In-memory [`UserStore`] backend.
///
/// Reference implementation for tests and single-instance deployments. All
/// uniqueness checks happen under one write lock, so the check-then-insert
/// window that would race in a naive implementation does not exist here.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn check_conflicts(users: &HashMap<Uuid, User>, candidate: &User) -> Result<(), StoreError> {
        for existing in users.values() {
            if existing.id == candidate.id {
                continue;
            }
            if existing.username == candidate.username {
                return Err(StoreError::Conflict(ConflictKind::Username));
            }
            if let (Some(a), Some(b)) = (&existing.email, &candidate.email) {
                if a == b {
                    return Err(StoreError::Conflict(ConflictKind::Email));
                }
            }
            if existing.display_name == candidate.display_name {
                return Err(StoreError::Conflict(ConflictKind::DisplayName));
            }
            if candidate.provider.is_federated()
                && existing.provider == candidate.provider
                && existing.provider_id == candidate.provider_id
            {
                return Err(StoreError::Conflict(ConflictKind::ProviderIdentity));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: User) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        Self::check_conflicts(&users, &user)?;
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn find_federated(
        &self,
        provider: Provider,
        provider_id: &str,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.provider == provider && u.provider_id.as_deref() == Some(provider_id))
            .cloned())
    }

    async fn set_display_name(&self, id: Uuid, display_name: &str) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        let taken = users
            .values()
            .any(|u| u.id != id && u.display_name == display_name);
        if taken {
            return Err(StoreError::Conflict(ConflictKind::DisplayName));
        }
        let user = users
            .get_mut(&id)
            .ok_or_else(|| StoreError::Backend(format!("no such user: {id}")))?;
        user.display_name = display_name.to_string();
        Ok(user.clone())
    }
}
