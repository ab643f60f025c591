//! Accounts: registration, login, profile and role management

use async_graphql::{ComplexObject, Context, Object, Result, ResultExt};
use bson::oid::ObjectId;

use super::context::{page, ContextExt};
use crate::models::{RegisterInput, UpdateProfileInput, User, UserRole};
use crate::services::AuthPayload;

#[ComplexObject]
impl User {
    /// Visible to the user themselves and to admins
    async fn email(&self, ctx: &Context<'_>) -> Option<String> {
        ctx.viewer()
            .filter(|viewer| viewer.can_manage(self.id))
            .map(|_| self.email.clone())
    }
}

#[derive(Default)]
pub struct UserQuery;

#[Object]
impl UserQuery {
    /// Current user, null when anonymous
    async fn me(&self, ctx: &Context<'_>) -> Option<User> {
        ctx.viewer().cloned()
    }

    async fn user(&self, ctx: &Context<'_>, id: ObjectId) -> Result<Option<User>> {
        ctx.require_admin()?;
        ctx.services().users.get(id).await.extend()
    }

    async fn users(&self, ctx: &Context<'_>, limit: Option<i32>, offset: Option<i32>) -> Result<Vec<User>> {
        let actor = ctx.require_user()?;
        ctx.services().users.list(actor, page(limit, offset)).await.extend()
    }
}

#[derive(Default)]
pub struct UserMutation;

#[Object]
impl UserMutation {
    async fn register(&self, ctx: &Context<'_>, input: RegisterInput) -> Result<AuthPayload> {
        ctx.services().users.register(input).await.extend()
    }

    async fn login(&self, ctx: &Context<'_>, email: String, password: String) -> Result<AuthPayload> {
        ctx.services().users.login(&email, &password).await.extend()
    }

    async fn update_profile(&self, ctx: &Context<'_>, input: UpdateProfileInput) -> Result<User> {
        let actor = ctx.require_user()?;
        ctx.services().users.update_profile(actor, input).await.extend()
    }

    async fn change_password(&self, ctx: &Context<'_>, current: String, new: String) -> Result<bool> {
        let actor = ctx.require_user()?;
        ctx.services()
            .users
            .change_password(actor, &current, &new)
            .await
            .map(|_| true)
            .extend()
    }

    async fn set_user_role(&self, ctx: &Context<'_>, user_id: ObjectId, role: UserRole) -> Result<User> {
        let actor = ctx.require_user()?;
        ctx.services().users.set_role(actor, user_id, role).await.extend()
    }

    async fn set_group_member(&self, ctx: &Context<'_>, user_id: ObjectId, member: bool) -> Result<User> {
        let actor = ctx.require_user()?;
        ctx.services()
            .users
            .set_group_member(actor, user_id, member)
            .await
            .extend()
    }

    async fn delete_user(&self, ctx: &Context<'_>, user_id: ObjectId) -> Result<bool> {
        let actor = ctx.require_user()?;
        ctx.services().users.delete(actor, user_id).await.extend()
    }
}
