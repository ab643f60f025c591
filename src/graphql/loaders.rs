//! DataLoaders
//!
//! Batch the reference lookups (authors, organizers, donors, campaigns) that
//! list queries would otherwise issue one by one.

use async_graphql::dataloader::{DataLoader, Loader};
use async_graphql::{Context, ErrorExtensions, Result};
use bson::oid::ObjectId;
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::{Entity, Store};
use crate::models::{Campaign, Donor, User};
use crate::services::ServiceError;

/// Loads any entity by id through its store
pub struct EntityLoader<T: Entity> {
    store: Arc<dyn Store<T>>,
}

impl<T: Entity> EntityLoader<T> {
    pub fn new(store: Arc<dyn Store<T>>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl<T: Entity> Loader<ObjectId> for EntityLoader<T> {
    type Value = T;
    type Error = Arc<ServiceError>;

    async fn load(&self, keys: &[ObjectId]) -> Result<HashMap<ObjectId, T>, Self::Error> {
        let found = self
            .store
            .get_many(keys)
            .await
            .map_err(|e| Arc::new(ServiceError::from(e)))?;
        Ok(found.into_iter().map(|entity| (entity.id(), entity)).collect())
    }
}

pub type UserLoader = DataLoader<EntityLoader<User>>;
pub type CampaignLoader = DataLoader<EntityLoader<Campaign>>;
pub type DonorLoader = DataLoader<EntityLoader<Donor>>;

async fn load<T: Entity>(ctx: &Context<'_>, id: ObjectId) -> Result<Option<T>> {
    ctx.data_unchecked::<DataLoader<EntityLoader<T>>>()
        .load_one(id)
        .await
        .map_err(|e| e.extend())
}

pub async fn user(ctx: &Context<'_>, id: ObjectId) -> Result<Option<User>> {
    load(ctx, id).await
}

pub async fn campaign(ctx: &Context<'_>, id: ObjectId) -> Result<Option<Campaign>> {
    load(ctx, id).await
}

pub async fn donor(ctx: &Context<'_>, id: ObjectId) -> Result<Option<Donor>> {
    load(ctx, id).await
}
