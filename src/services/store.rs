//! Charity store service

use bson::oid::ObjectId;
use chrono::Utc;

use super::error::{OrNotFound, ServiceError, ServiceResult};
use super::validation;
use crate::db::{Filter, Page, Query, Repositories, Update};
use crate::models::{CreateStoreItemInput, StoreItem, UpdateStoreItemInput, User};

pub struct StoreService {
    repos: Repositories,
    currency: String,
}

impl StoreService {
    pub fn new(repos: Repositories, currency: String) -> Self {
        Self { repos, currency }
    }

    /// Item by id; inactive items only for admins
    pub async fn get(&self, viewer: Option<&User>, id: ObjectId) -> ServiceResult<Option<StoreItem>> {
        let show_inactive = viewer.is_some_and(User::is_admin);
        Ok(self
            .repos
            .store_items
            .get(id)
            .await?
            .filter(|item| item.active || show_inactive))
    }

    pub async fn list(
        &self,
        viewer: Option<&User>,
        category: Option<String>,
        include_inactive: bool,
        page: Page,
    ) -> ServiceResult<Vec<StoreItem>> {
        let mut filter = Filter::all().eq_opt("category", category);
        if !(include_inactive && viewer.is_some_and(User::is_admin)) {
            filter = filter.eq("active", true);
        }
        Ok(self
            .repos
            .store_items
            .find(Query::new(filter).newest_first().page(page))
            .await?)
    }

    async fn check_campaign(&self, campaign_id: Option<ObjectId>) -> ServiceResult<()> {
        if let Some(id) = campaign_id {
            self.repos.campaigns.get(id).await?.or_not_found("Campaign")?;
        }
        Ok(())
    }

    pub async fn create(&self, actor: &User, input: CreateStoreItemInput) -> ServiceResult<StoreItem> {
        validation::ensure_admin(actor)?;
        let name = validation::title(&input.name)?;
        let description = validation::required("Description", &input.description)?;
        let category = validation::required("Category", &input.category)?;
        validation::non_negative("Price", input.price)?;
        validation::non_negative("Stock", input.stock)?;
        let currency = match input.currency.as_deref() {
            Some(c) => validation::currency(c)?,
            None => self.currency.clone(),
        };
        self.check_campaign(input.campaign_id).await?;

        let now = Utc::now();
        let item = StoreItem {
            id: ObjectId::new(),
            name,
            description,
            price: input.price,
            currency,
            stock: input.stock,
            category,
            images: input.images,
            campaign_id: input.campaign_id,
            active: input.active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };
        self.repos.store_items.insert(&item).await?;
        tracing::info!(item_id = %item.id, "Store item created");
        Ok(item)
    }

    pub async fn update(&self, actor: &User, id: ObjectId, input: UpdateStoreItemInput) -> ServiceResult<StoreItem> {
        validation::ensure_admin(actor)?;

        let mut update = Update::new().set("updated_at", Utc::now());
        if let Some(name) = input.name {
            update = update.set("name", validation::title(&name)?);
        }
        if let Some(description) = input.description {
            update = update.set("description", validation::required("Description", &description)?);
        }
        if let Some(category) = input.category {
            update = update.set("category", validation::required("Category", &category)?);
        }
        if let Some(price) = input.price {
            validation::non_negative("Price", price)?;
            update = update.set("price", price);
        }
        if let Some(stock) = input.stock {
            validation::non_negative("Stock", stock)?;
            update = update.set("stock", stock);
        }
        if let Some(images) = input.images {
            update = update.set("images", images);
        }
        if let Some(campaign_id) = input.campaign_id {
            self.check_campaign(Some(campaign_id)).await?;
            update = update.set("campaign_id", campaign_id);
        }
        if let Some(active) = input.active {
            update = update.set("active", active);
        }

        self.repos
            .store_items
            .update_one(Filter::id(id), update)
            .await?
            .or_not_found("Store item")
    }

    pub async fn delete(&self, actor: &User, id: ObjectId) -> ServiceResult<bool> {
        validation::ensure_admin(actor)?;
        if !self.repos.store_items.delete(id).await? {
            return Err(ServiceError::not_found("Store item"));
        }
        tracing::info!(item_id = %id, "Store item deleted");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::TestEnv;

    fn input(name: &str) -> CreateStoreItemInput {
        CreateStoreItemInput {
            name: name.into(),
            description: "Handmade".into(),
            price: 1200,
            currency: None,
            stock: 5,
            category: "crafts".into(),
            images: vec![],
            campaign_id: None,
            active: None,
        }
    }

    #[tokio::test]
    async fn test_admin_crud_and_validation() {
        let env = TestEnv::new();
        let admin = env.admin().await;
        let bob = env.user("bob").await;

        assert!(env.services.store.create(&bob, input("Mug")).await.is_err());

        let mut negative = input("Mug");
        negative.stock = -1;
        assert_eq!(
            env.services.store.create(&admin, negative).await.unwrap_err().code(),
            "VALIDATION_ERROR"
        );

        let mut unknown_campaign = input("Mug");
        unknown_campaign.campaign_id = Some(ObjectId::new());
        assert_eq!(
            env.services.store.create(&admin, unknown_campaign).await.unwrap_err().code(),
            "NOT_FOUND"
        );

        let item = env.services.store.create(&admin, input("Mug")).await.unwrap();
        assert!(item.active);
        assert_eq!(item.currency, "usd");

        let updated = env
            .services
            .store
            .update(
                &admin,
                item.id,
                UpdateStoreItemInput {
                    price: Some(900),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.price, 900);
        assert_eq!(updated.name, "Mug");

        assert!(env.services.store.delete(&admin, item.id).await.unwrap());
        assert!(env.services.store.delete(&admin, item.id).await.is_err());
    }

    #[tokio::test]
    async fn test_inactive_items_hidden_from_public() {
        let env = TestEnv::new();
        let admin = env.admin().await;
        let mut hidden = input("Prototype");
        hidden.active = Some(false);
        let hidden = env.services.store.create(&admin, hidden).await.unwrap();
        env.services.store.create(&admin, input("Mug")).await.unwrap();

        let public = env.services.store.list(None, None, true, Page::default()).await.unwrap();
        assert_eq!(public.len(), 1);
        let all = env
            .services
            .store
            .list(Some(&admin), None, true, Page::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        assert!(env.services.store.get(None, hidden.id).await.unwrap().is_none());
        assert!(env.services.store.get(Some(&admin), hidden.id).await.unwrap().is_some());
    }
}
