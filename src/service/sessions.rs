use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::{DbUser, Role};

/// Who is logged in behind a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
}

impl From<&DbUser> for SessionUser {
    fn from(u: &DbUser) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            email: u.email.clone(),
            phone: u.phone.clone(),
            role: u.role,
        }
    }
}

/// In-memory session table keyed by random v4 tokens.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, SessionUser>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, user: SessionUser) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.inner.write().await.insert(token.clone(), user);
        token
    }

    pub async fn resolve(&self, token: &str) -> Option<SessionUser> {
        self.inner.read().await.get(token).cloned()
    }

    pub async fn revoke(&self, token: &str) -> bool {
        self.inner.write().await.remove(token).is_some()
    }

    /// Drop every session of `user_id`, e.g. after the account is deleted.
    pub async fn revoke_user(&self, user_id: i64) -> usize {
        let mut map = self.inner.write().await;
        let before = map.len();
        map.retain(|_, u| u.id != user_id);
        before - map.len()
    }

    /// Refresh cached identity fields after a profile edit.
    pub async fn rename_user(&self, user_id: i64, username: &str) {
        let mut map = self.inner.write().await;
        for user in map.values_mut().filter(|u| u.id == user_id) {
            user.username = username.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64) -> SessionUser {
        SessionUser {
            id,
            username: format!("user{id}"),
            email: format!("user{id}@shop.my"),
            phone: "0123456789".into(),
            role: Role::Cashier,
        }
    }

    #[tokio::test]
    async fn tokens_resolve_until_revoked() {
        let store = SessionStore::new();
        let a = store.create(user(1)).await;
        let b = store.create(user(1)).await;
        let c = store.create(user(2)).await;
        assert_ne!(a, b);
        assert_eq!(store.resolve(&a).await.map(|u| u.id), Some(1));

        assert!(store.revoke(&a).await);
        assert!(!store.revoke(&a).await);
        assert!(store.resolve(&a).await.is_none());

        store.rename_user(1, "renamed").await;
        assert_eq!(store.resolve(&b).await.unwrap().username, "renamed");

        assert_eq!(store.revoke_user(1).await, 1);
        assert!(store.resolve(&c).await.is_some());
    }
}
