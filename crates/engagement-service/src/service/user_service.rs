//! 用户注册、登录与修改密码
//!
//! 用户名即邮箱，大小写不敏感唯一

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::auth::{JwtManager, hash_password, verify_password};
use crate::error::{ApiError, Result};
use crate::models::{NewUser, User, UserProfile};
use crate::repository::UserRepositoryTrait;

const LOGIN_FAILED: &str = "Unable to log in with provided credentials.";

/// 按空格拆分全名，取前两个片段；缺少第二个片段时姓为空
pub fn split_full_name(full_name: &str) -> (String, String) {
    let mut parts = full_name.split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let last = parts.next().unwrap_or_default().to_string();
    (first, last)
}

pub struct UserService {
    users: Arc<dyn UserRepositoryTrait>,
    jwt: Arc<JwtManager>,
    hash_cost: u32,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepositoryTrait>, jwt: Arc<JwtManager>, hash_cost: u32) -> Self {
        Self {
            users,
            jwt,
            hash_cost,
        }
    }

    fn issue_token(&self, user: &User) -> Result<String> {
        self.jwt.generate_token(user.id, &user.username, user.is_staff)
    }

    /// 注册用户并签发 Token
    #[instrument(skip(self, full_name, password))]
    pub async fn create_user(
        &self,
        full_name: &str,
        email: &str,
        password: &str,
    ) -> Result<(User, String)> {
        let email = email.trim();
        if email.split('@').count() != 2 {
            return Err(ApiError::field("email", "Wrong email format"));
        }
        if self.users.find_by_username(email).await?.is_some() {
            return Err(ApiError::field("email", "Email address already used"));
        }

        let (first_name, last_name) = split_full_name(full_name);
        let new_user = NewUser {
            username: email.to_string(),
            email: email.to_string(),
            first_name,
            last_name,
            password_hash: hash_password(password, self.hash_cost)?,
        };

        let user = self.users.create_user(&new_user).await?;
        info!(user_id = user.id, "User registered");

        let token = self.issue_token(&user)?;
        Ok((user, token))
    }

    /// 用户名密码登录
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<(User, String)> {
        let Some(user) = self.users.find_by_username(username).await? else {
            warn!("Login failed: unknown user");
            return Err(ApiError::non_field(LOGIN_FAILED));
        };

        if !user.is_active || !verify_password(password, &user.password_hash) {
            warn!(user_id = user.id, "Login failed");
            return Err(ApiError::non_field(LOGIN_FAILED));
        }

        let token = self.issue_token(&user)?;
        Ok((user, token))
    }

    /// 用户及其档案（可能不存在）
    pub async fn get_user_detail(&self, user_id: i64) -> Result<(User, Option<UserProfile>)> {
        let user = self
            .users
            .get_user(user_id)
            .await?
            .ok_or(ApiError::UserNotFound(user_id))?;
        let profile = self.users.get_profile(user_id).await?;
        Ok((user, profile))
    }

    #[instrument(skip(self, current_password, new_password, new_password2))]
    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
        new_password2: &str,
    ) -> Result<()> {
        let user = self
            .users
            .get_user(user_id)
            .await?
            .ok_or(ApiError::UserNotFound(user_id))?;

        if !verify_password(current_password, &user.password_hash) {
            return Err(ApiError::non_field("Wrong current password"));
        }
        if new_password != new_password2 {
            return Err(ApiError::non_field("The new passwords do not match"));
        }

        let password_hash = hash_password(new_password, self.hash_cost)?;
        self.users.set_password(user_id, &password_hash).await?;
        info!(user_id, "Password changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtConfig;
    use crate::error::NON_FIELD_ERRORS;
    use crate::repository::{MemoryStore, MockUserRepositoryTrait};

    const TEST_COST: u32 = 4;

    fn service(users: Arc<dyn UserRepositoryTrait>) -> UserService {
        UserService::new(users, Arc::new(JwtManager::new(JwtConfig::default())), TEST_COST)
    }

    #[test]
    fn test_split_full_name() {
        assert_eq!(
            split_full_name("Ada Lovelace"),
            ("Ada".to_string(), "Lovelace".to_string())
        );
        assert_eq!(split_full_name("Ada"), ("Ada".to_string(), String::new()));
        assert_eq!(
            split_full_name("  Ada  King Lovelace "),
            ("Ada".to_string(), "King".to_string())
        );
    }

    #[tokio::test]
    async fn test_wrong_email_format() {
        let mut repo = MockUserRepositoryTrait::new();
        repo.expect_find_by_username().never();

        let service = service(Arc::new(repo));
        for email in ["no-at-sign", "a@b@c"] {
            let err = service.create_user("Ada", email, "pw").await.unwrap_err();
            assert_eq!(err.field_errors().unwrap()["email"], vec!["Wrong email format"]);
        }
    }

    #[tokio::test]
    async fn test_register_then_login_case_insensitive() {
        let service = service(Arc::new(MemoryStore::new()));

        let (user, token) = service
            .create_user("Ada Lovelace", "  Ada@Example.org ", "secret")
            .await
            .unwrap();
        assert_eq!(user.username, "Ada@Example.org");
        assert_eq!(user.last_name, "Lovelace");
        assert!(!token.is_empty());

        let err = service
            .create_user("Other", "ada@example.org", "x")
            .await
            .unwrap_err();
        assert_eq!(
            err.field_errors().unwrap()["email"],
            vec!["Email address already used"]
        );

        let (logged_in, _) = service.login("ADA@example.org", "secret").await.unwrap();
        assert_eq!(logged_in.id, user.id);

        let err = service.login("ada@example.org", "wrong").await.unwrap_err();
        assert_eq!(err.field_errors().unwrap()[NON_FIELD_ERRORS], vec![LOGIN_FAILED]);
    }

    #[tokio::test]
    async fn test_change_password_flow() {
        let service = service(Arc::new(MemoryStore::new()));
        let (user, _) = service
            .create_user("Ada", "ada@example.org", "old-pw")
            .await
            .unwrap();

        let err = service
            .change_password(user.id, "bad", "n1", "n1")
            .await
            .unwrap_err();
        assert_eq!(
            err.field_errors().unwrap()[NON_FIELD_ERRORS],
            vec!["Wrong current password"]
        );

        let err = service
            .change_password(user.id, "old-pw", "n1", "n2")
            .await
            .unwrap_err();
        assert_eq!(
            err.field_errors().unwrap()[NON_FIELD_ERRORS],
            vec!["The new passwords do not match"]
        );

        service
            .change_password(user.id, "old-pw", "n1", "n1")
            .await
            .unwrap();
        assert!(service.login("ada@example.org", "n1").await.is_ok());
        assert!(service.login("ada@example.org", "old-pw").await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_user_detail() {
        let service = service(Arc::new(MemoryStore::new()));
        let err = service.get_user_detail(42).await.unwrap_err();
        assert!(matches!(err, ApiError::UserNotFound(42)));
    }
}
