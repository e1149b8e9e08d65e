use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryUserRepo {
    users: RwLock<HashMap<UserId, UserRecord>>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl UserRepo for MemoryUserRepo {
    async fn create(&self, user: NewUser) -> Result<(), AuthError> {
        let mut users = self.users.write().await;

        let taken = users.values().any(|u| {
            u.email.eq_ignore_ascii_case(&user.email)
                || u.username.eq_ignore_ascii_case(&user.username)
        });
        if taken || users.contains_key(&user.user_id) {
            return Err(AuthError::UserExists);
        }

        users.insert(
            user.user_id,
            UserRecord {
                user_id: user.user_id,
                username: user.username,
                email: user.email,
                name: user.name,
                password_hash: user.password_hash,
                is_active: true,
                last_login_at: None,
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn get_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, AuthError> {
        Ok(self.users.read().await.get(&user_id).cloned())
    }

    async fn touch_last_login(
        &self,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&user_id).ok_or(AuthError::UserNotFound)?;
        user.last_login_at = Some(at);
        Ok(())
    }
}
