//! User service
//!
//! Registration, login and account management. The first user to register
//! becomes an admin; everyone after that starts as a regular user.

use async_graphql::SimpleObject;
use bson::oid::ObjectId;
use chrono::Utc;
use std::sync::Arc;

use super::auth::{generate_token, hash_password, validate_token, verify_password, Claims, JwtConfig};
use super::email::EmailService;
use super::error::{OrNotFound, ServiceError, ServiceResult};
use super::rate_limiter::AttemptLimiter;
use super::validation;
use crate::db::{Filter, Page, Query, Store, StoreError, Update};
use crate::models::{RegisterInput, UpdateProfileInput, User, UserRole};

/// Returned by register and login
#[derive(Debug, Clone, SimpleObject)]
pub struct AuthPayload {
    pub token: String,
    pub user: User,
}

pub struct UserService {
    users: Arc<dyn Store<User>>,
    email: Arc<EmailService>,
    jwt: JwtConfig,
    login_limiter: AttemptLimiter,
}

impl UserService {
    pub fn new(users: Arc<dyn Store<User>>, email: Arc<EmailService>, jwt: JwtConfig) -> Self {
        Self {
            users,
            email,
            jwt,
            login_limiter: AttemptLimiter::for_logins(),
        }
    }

    pub async fn register(&self, input: RegisterInput) -> ServiceResult<AuthPayload> {
        let name = validation::required("Name", &input.name)?;
        let email = validation::email(&input.email)?;
        validation::password(&input.password)?;

        if self.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict(format!("Email '{}' is already registered", email)));
        }

        let is_first = self.users.count(Filter::all()).await? == 0;
        let password_hash = hash_password(&input.password)?;
        let mut user = User::new(name, email, password_hash);
        if is_first {
            user.role = UserRole::Admin;
        }

        match self.users.insert(&user).await {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => {
                return Err(ServiceError::Conflict(format!(
                    "Email '{}' is already registered",
                    user.email
                )))
            }
            Err(e) => return Err(e.into()),
        }
        tracing::info!(user_id = %user.id, admin = is_first, "User registered");

        self.email.send_welcome(&user.name, &user.email).await;
        self.issue(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<AuthPayload> {
        let email = email.trim().to_lowercase();
        if self.login_limiter.is_limited(&email).await {
            return Err(ServiceError::Unauthorized(
                "Too many failed login attempts, try again later".to_string(),
            ));
        }

        let user = match self.find_by_email(&email).await? {
            Some(user) if verify_password(password, &user.password_hash).unwrap_or(false) => user,
            _ => {
                self.login_limiter.record(&email).await;
                tracing::debug!(email = %email, "Failed login attempt");
                return Err(ServiceError::Unauthorized("Invalid email or password".to_string()));
            }
        };

        self.login_limiter.clear(&email).await;
        self.issue(user)
    }

    fn issue(&self, user: User) -> ServiceResult<AuthPayload> {
        let token = generate_token(&user, &self.jwt)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to sign token: {}", e)))?;
        Ok(AuthPayload { token, user })
    }

    /// Forget login failures whose window has passed
    pub async fn cleanup_login_attempts(&self) {
        self.login_limiter.cleanup().await;
    }

    /// Decode a bearer token into claims; invalid tokens yield `None`
    pub fn claims_from_token(&self, token: &str) -> Option<Claims> {
        validate_token(token, &self.jwt).ok()
    }

    /// Current user for validated claims (deleted users yield `None`)
    pub async fn user_from_claims(&self, claims: &Claims) -> ServiceResult<Option<User>> {
        match claims.user_id() {
            Ok(id) => Ok(self.users.get(id).await?),
            Err(_) => Ok(None),
        }
    }

    pub async fn get(&self, id: ObjectId) -> ServiceResult<Option<User>> {
        Ok(self.users.get(id).await?)
    }

    pub async fn find_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        Ok(self
            .users
            .find_one(Filter::all().eq("email", email.trim().to_lowercase()))
            .await?)
    }

    pub async fn list(&self, actor: &User, page: Page) -> ServiceResult<Vec<User>> {
        validation::ensure_admin(actor)?;
        Ok(self.users.find(Query::new(Filter::all()).newest_first().page(page)).await?)
    }

    pub async fn update_profile(&self, actor: &User, input: UpdateProfileInput) -> ServiceResult<User> {
        let mut update = Update::new().set("updated_at", Utc::now());
        if let Some(name) = input.name {
            update = update.set("name", validation::required("Name", &name)?);
        }
        if let Some(avatar) = input.avatar {
            update = update.set("avatar", avatar.trim());
        }
        if let Some(bio) = input.bio {
            update = update.set("bio", bio.trim());
        }

        self.users
            .update_one(Filter::id(actor.id), update)
            .await?
            .or_not_found("User")
    }

    pub async fn change_password(&self, actor: &User, current: &str, new: &str) -> ServiceResult<()> {
        if !verify_password(current, &actor.password_hash)? {
            return Err(ServiceError::Unauthorized("Current password is incorrect".to_string()));
        }
        validation::password(new)?;

        let hash = hash_password(new)?;
        self.users
            .update_one(
                Filter::id(actor.id),
                Update::new().set("password_hash", hash).set("updated_at", Utc::now()),
            )
            .await?
            .or_not_found("User")?;
        tracing::info!(user_id = %actor.id, "Password changed");
        Ok(())
    }

    pub async fn set_role(&self, actor: &User, user_id: ObjectId, role: UserRole) -> ServiceResult<User> {
        validation::ensure_admin(actor)?;
        if actor.id == user_id && role != UserRole::Admin {
            return Err(ServiceError::validation("You cannot remove your own admin role"));
        }
        self.users
            .update_one(
                Filter::id(user_id),
                Update::new().set("role", role.as_str()).set("updated_at", Utc::now()),
            )
            .await?
            .or_not_found("User")
    }

    pub async fn set_group_member(&self, actor: &User, user_id: ObjectId, member: bool) -> ServiceResult<User> {
        validation::ensure_admin(actor)?;
        self.users
            .update_one(
                Filter::id(user_id),
                Update::new().set("is_group_member", member).set("updated_at", Utc::now()),
            )
            .await?
            .or_not_found("User")
    }

    pub async fn delete(&self, actor: &User, user_id: ObjectId) -> ServiceResult<bool> {
        validation::ensure_admin(actor)?;
        if actor.id == user_id {
            return Err(ServiceError::validation("You cannot delete your own account"));
        }
        let deleted = self.users.delete(user_id).await?;
        if !deleted {
            return Err(ServiceError::not_found("User"));
        }
        tracing::info!(user_id = %user_id, by = %actor.id, "User deleted");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::TestEnv;

    fn input(name: &str, email: &str) -> RegisterInput {
        RegisterInput {
            name: name.to_string(),
            email: email.to_string(),
            password: "password123".to_string(),
        }
    }

    #[tokio::test]
    async fn test_first_user_becomes_admin() {
        let env = TestEnv::new();
        let first = env.services.users.register(input("Ada", "Ada@Example.org")).await.unwrap();
        assert_eq!(first.user.role, UserRole::Admin);
        assert_eq!(first.user.email, "ada@example.org");

        let second = env.services.users.register(input("Bob", "bob@example.org")).await.unwrap();
        assert_eq!(second.user.role, UserRole::User);

        let outbox = env.services.email.outbox().await;
        assert_eq!(outbox.len(), 2);
        assert!(outbox[0].subject.starts_with("Welcome"));
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let env = TestEnv::new();
        env.services.users.register(input("Ada", "ada@example.org")).await.unwrap();
        let err = env
            .services
            .users
            .register(input("Other", "ADA@example.org"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
    }

    #[tokio::test]
    async fn test_register_validation() {
        let env = TestEnv::new();
        let mut short = input("Ada", "ada@example.org");
        short.password = "short".into();
        assert_eq!(env.services.users.register(short).await.unwrap_err().code(), "VALIDATION_ERROR");
        assert!(env.services.users.register(input(" ", "x@example.org")).await.is_err());
        assert!(env.services.users.register(input("Ada", "nope")).await.is_err());
    }

    #[tokio::test]
    async fn test_login_and_token() {
        let env = TestEnv::new();
        let registered = env.services.users.register(input("Ada", "ada@example.org")).await.unwrap();

        let payload = env.services.users.login("ADA@example.org", "password123").await.unwrap();
        let claims = env.services.users.claims_from_token(&payload.token).unwrap();
        let me = env.services.users.user_from_claims(&claims).await.unwrap().unwrap();
        assert_eq!(me.id, registered.user.id);

        let err = env.services.users.login("ada@example.org", "wrong-password").await.unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
        assert!(env.services.users.claims_from_token("garbage").is_none());
    }

    #[tokio::test]
    async fn test_login_rate_limited() {
        let env = TestEnv::new();
        env.services.users.register(input("Ada", "ada@example.org")).await.unwrap();

        for _ in 0..5 {
            assert!(env.services.users.login("ada@example.org", "wrong").await.is_err());
        }
        let err = env
            .services
            .users
            .login("ada@example.org", "password123")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Too many"));
    }

    #[tokio::test]
    async fn test_admin_operations() {
        let env = TestEnv::new();
        let admin = env.services.users.register(input("Ada", "ada@example.org")).await.unwrap().user;
        let bob = env.services.users.register(input("Bob", "bob@example.org")).await.unwrap().user;

        let member = env.services.users.set_group_member(&admin, bob.id, true).await.unwrap();
        assert!(member.is_group_member);

        assert_eq!(
            env.services.users.set_role(&bob, admin.id, UserRole::User).await.unwrap_err().code(),
            "FORBIDDEN"
        );
        assert!(env.services.users.delete(&admin, admin.id).await.is_err());
        assert!(env.services.users.delete(&admin, bob.id).await.unwrap());
        assert!(env.services.users.get(bob.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_profile_and_password() {
        let env = TestEnv::new();
        let ada = env.services.users.register(input("Ada", "ada@example.org")).await.unwrap().user;

        let updated = env
            .services
            .users
            .update_profile(
                &ada,
                UpdateProfileInput {
                    bio: Some("Volunteer".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.bio.as_deref(), Some("Volunteer"));
        assert_eq!(updated.name, "Ada");

        assert!(env.services.users.change_password(&ada, "nope", "newpassword").await.is_err());
        env.services
            .users
            .change_password(&ada, "password123", "newpassword")
            .await
            .unwrap();
        assert!(env.services.users.login("ada@example.org", "newpassword").await.is_ok());
    }
}
