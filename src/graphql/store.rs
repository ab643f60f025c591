//! Merchandise store

use async_graphql::{ComplexObject, Context, Object, Result, ResultExt};
use bson::oid::ObjectId;

use super::context::{page, ContextExt};
use super::loaders;
use crate::models::{Campaign, CreateStoreItemInput, PaymentIntentPayload, StoreItem, UpdateStoreItemInput};
use crate::services::PurchaseRequest;

#[ComplexObject]
impl StoreItem {
    #[graphql(name = "inStock")]
    async fn resolve_in_stock(&self) -> bool {
        self.in_stock()
    }

    /// Campaign receiving the proceeds
    async fn campaign(&self, ctx: &Context<'_>) -> Result<Option<Campaign>> {
        match self.campaign_id {
            Some(id) => loaders::campaign(ctx, id).await,
            None => Ok(None),
        }
    }
}

#[derive(Default)]
pub struct StoreQuery;

#[Object]
impl StoreQuery {
    /// Active items; admins may include inactive ones
    async fn store_items(
        &self,
        ctx: &Context<'_>,
        category: Option<String>,
        #[graphql(default)] include_inactive: bool,
        limit: Option<i32>,
        offset: Option<i32>,
    ) -> Result<Vec<StoreItem>> {
        ctx.services()
            .store
            .list(ctx.viewer(), category, include_inactive, page(limit, offset))
            .await
            .extend()
    }

    async fn store_item(&self, ctx: &Context<'_>, id: ObjectId) -> Result<Option<StoreItem>> {
        ctx.services().store.get(ctx.viewer(), id).await.extend()
    }
}

#[derive(Default)]
pub struct StoreMutation;

#[Object]
impl StoreMutation {
    async fn create_store_item(&self, ctx: &Context<'_>, input: CreateStoreItemInput) -> Result<StoreItem> {
        let actor = ctx.require_user()?;
        ctx.services().store.create(actor, input).await.extend()
    }

    async fn update_store_item(
        &self,
        ctx: &Context<'_>,
        id: ObjectId,
        input: UpdateStoreItemInput,
    ) -> Result<StoreItem> {
        let actor = ctx.require_user()?;
        ctx.services().store.update(actor, id, input).await.extend()
    }

    async fn delete_store_item(&self, ctx: &Context<'_>, id: ObjectId) -> Result<bool> {
        let actor = ctx.require_user()?;
        ctx.services().store.delete(actor, id).await.extend()
    }

    /// Start a purchase; the client completes it with the returned secret
    async fn purchase_store_item(
        &self,
        ctx: &Context<'_>,
        item_id: ObjectId,
        #[graphql(default = 1)] quantity: i32,
        name: String,
        email: String,
    ) -> Result<PaymentIntentPayload> {
        let request = PurchaseRequest {
            item_id,
            quantity: i64::from(quantity),
            name,
            email,
        };
        ctx.services()
            .payments
            .purchase_store_item(ctx.viewer(), request)
            .await
            .extend()
    }
}
