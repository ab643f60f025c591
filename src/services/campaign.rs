//! Campaign service
//!
//! Campaign CRUD, aggregate statistics and donor rankings. Statistics are
//! cached and invalidated whenever campaigns or payments change.

use bson::oid::ObjectId;
use chrono::Utc;
use std::sync::Arc;

use super::error::{OrNotFound, ServiceResult};
use super::hashtag::{extract_from, HashtagService};
use super::validation;
use crate::cache::{Cache, CacheLayer};
use crate::db::{Filter, Page, Query, Repositories, SortOrder, Update};
use crate::models::{
    Campaign, CampaignStats, CampaignStatus, CreateCampaignInput, Donor, HashtagCategory,
    UpdateCampaignInput, User,
};

/// Cache key of the aggregate statistics
pub const CAMPAIGN_STATS_KEY: &str = "campaign:stats";

/// Filters for campaign listings
#[derive(Debug, Clone, Default)]
pub struct CampaignFilter {
    pub active_only: bool,
    pub category: Option<String>,
    pub hashtag: Option<String>,
}

pub struct CampaignService {
    repos: Repositories,
    hashtags: Arc<HashtagService>,
    cache: Arc<Cache>,
}

impl CampaignService {
    pub fn new(repos: Repositories, hashtags: Arc<HashtagService>, cache: Arc<Cache>) -> Self {
        Self { repos, hashtags, cache }
    }

    pub async fn get(&self, id: ObjectId) -> ServiceResult<Option<Campaign>> {
        Ok(self.repos.campaigns.get(id).await?)
    }

    pub async fn list(&self, filter: CampaignFilter, page: Page) -> ServiceResult<Vec<Campaign>> {
        let mut query = Filter::all()
            .eq_opt("category", filter.category)
            .eq_opt("hashtags", filter.hashtag.map(|h| h.trim_start_matches('#').to_lowercase()));
        if filter.active_only {
            let now = Utc::now();
            query = query
                .eq("status", CampaignStatus::Active.as_str())
                .lte("start_date", now)
                .gte("end_date", now);
        }
        Ok(self
            .repos
            .campaigns
            .find(Query::new(query).newest_first().page(page))
            .await?)
    }

    pub async fn create(&self, actor: &User, input: CreateCampaignInput) -> ServiceResult<Campaign> {
        validation::ensure_admin(actor)?;
        let title = validation::title(&input.title)?;
        let description = validation::required("Description", &input.description)?;
        let category = validation::required("Category", &input.category)?;
        validation::positive("Goal amount", input.goal_amount)?;
        let currency = validation::currency(input.currency.as_deref().unwrap_or("usd"))?;

        let now = Utc::now();
        let start_date = input.start_date.unwrap_or(now);
        if input.end_date <= start_date {
            return Err(super::ServiceError::validation("End date must be after the start date"));
        }

        let hashtags = extract_from(&[&title, &description]);
        let campaign = Campaign {
            id: ObjectId::new(),
            title,
            description,
            category,
            goal_amount: input.goal_amount,
            current_amount: 0,
            currency,
            donor_count: 0,
            start_date,
            end_date: input.end_date,
            status: CampaignStatus::Active,
            image: input.image,
            hashtags,
            created_by: actor.id,
            created_at: now,
            updated_at: now,
        };
        self.repos.campaigns.insert(&campaign).await?;
        self.hashtags.track(&campaign.hashtags, HashtagCategory::Campaign).await?;
        self.invalidate_stats().await;

        tracing::info!(campaign_id = %campaign.id, "Campaign created");
        Ok(campaign)
    }

    pub async fn update(&self, actor: &User, id: ObjectId, input: UpdateCampaignInput) -> ServiceResult<Campaign> {
        validation::ensure_admin(actor)?;
        let existing = self.repos.campaigns.get(id).await?.or_not_found("Campaign")?;

        let title = input.title.as_deref().map(validation::title).transpose()?;
        let description = input
            .description
            .as_deref()
            .map(|d| validation::required("Description", d))
            .transpose()?;
        if let Some(goal) = input.goal_amount {
            validation::positive("Goal amount", goal)?;
        }
        let start = input.start_date.unwrap_or(existing.start_date);
        let end = input.end_date.unwrap_or(existing.end_date);
        if end <= start {
            return Err(super::ServiceError::validation("End date must be after the start date"));
        }

        let hashtags = extract_from(&[
            title.as_deref().unwrap_or(&existing.title),
            description.as_deref().unwrap_or(&existing.description),
        ]);

        let mut update = Update::new()
            .set("start_date", start)
            .set("end_date", end)
            .set("hashtags", hashtags.clone())
            .set("updated_at", Utc::now());
        if let Some(title) = title {
            update = update.set("title", title);
        }
        if let Some(description) = description {
            update = update.set("description", description);
        }
        if let Some(category) = input.category {
            update = update.set("category", validation::required("Category", &category)?);
        }
        if let Some(goal) = input.goal_amount {
            update = update.set("goal_amount", goal);
        }
        if let Some(status) = input.status {
            update = update.set("status", status.as_str());
        }
        if let Some(image) = input.image {
            update = update.set("image", image);
        }

        let updated = self
            .repos
            .campaigns
            .update_one(Filter::id(id), update)
            .await?
            .or_not_found("Campaign")?;
        self.hashtags
            .sync(&existing.hashtags, &hashtags, HashtagCategory::Campaign)
            .await?;
        self.invalidate_stats().await;
        Ok(updated)
    }

    pub async fn delete(&self, actor: &User, id: ObjectId) -> ServiceResult<bool> {
        validation::ensure_admin(actor)?;
        let existing = self.repos.campaigns.get(id).await?.or_not_found("Campaign")?;
        self.repos.campaigns.delete(id).await?;
        self.hashtags
            .untrack(&existing.hashtags, HashtagCategory::Campaign)
            .await?;
        self.invalidate_stats().await;
        tracing::info!(campaign_id = %id, "Campaign deleted");
        Ok(true)
    }

    /// Aggregate figures, cached until the next change
    pub async fn stats(&self) -> ServiceResult<CampaignStats> {
        if let Ok(Some(cached)) = self.cache.get::<CampaignStats>(CAMPAIGN_STATS_KEY).await {
            return Ok(cached);
        }

        let now = Utc::now();
        let campaigns = self.repos.campaigns.find(Query::new(Filter::all())).await?;
        let stats = CampaignStats {
            total_raised: campaigns.iter().map(|c| c.current_amount).sum(),
            total_goal: campaigns.iter().map(|c| c.goal_amount).sum(),
            campaign_count: campaigns.len() as i64,
            active_campaign_count: campaigns.iter().filter(|c| c.is_active_at(now)).count() as i64,
            donor_count: self.repos.donors.count(Filter::all().gte("donation_count", 1i64)).await? as i64,
            donation_count: self.repos.donations.count(Filter::all()).await? as i64,
        };

        if let Err(e) = self
            .cache
            .set(CAMPAIGN_STATS_KEY, &stats, self.cache.default_ttl())
            .await
        {
            tracing::warn!(error = %e, "Failed to cache campaign stats");
        }
        Ok(stats)
    }

    /// Donors ranked by net amount donated
    pub async fn top_donors(&self, actor: &User, limit: i64) -> ServiceResult<Vec<Donor>> {
        validation::ensure_admin(actor)?;
        Ok(self
            .repos
            .donors
            .find(
                Query::new(Filter::all().gte("donation_count", 1i64))
                    .sort("total_donations", SortOrder::Descending)
                    .limit(limit.clamp(1, 100)),
            )
            .await?)
    }

    async fn invalidate_stats(&self) {
        if let Err(e) = self.cache.delete_pattern("campaign:*").await {
            tracing::warn!(error = %e, "Failed to invalidate campaign cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::TestEnv;
    use chrono::Duration;

    pub(crate) fn input(title: &str) -> CreateCampaignInput {
        CreateCampaignInput {
            title: title.to_string(),
            description: "Help us build #wells and #schools".to_string(),
            category: "water".to_string(),
            goal_amount: 100_000,
            currency: None,
            start_date: None,
            end_date: Utc::now() + Duration::days(30),
            image: None,
        }
    }

    #[tokio::test]
    async fn test_create_requires_admin_and_valid_input() {
        let env = TestEnv::new();
        let admin = env.admin().await;
        let user = env.user("bob").await;

        assert_eq!(
            env.services.campaigns.create(&user, input("Wells")).await.unwrap_err().code(),
            "FORBIDDEN"
        );

        let mut bad = input("Wells");
        bad.goal_amount = 0;
        assert!(env.services.campaigns.create(&admin, bad).await.is_err());

        let mut backwards = input("Wells");
        backwards.end_date = Utc::now() - Duration::days(1);
        assert!(env.services.campaigns.create(&admin, backwards).await.is_err());

        let campaign = env.services.campaigns.create(&admin, input("Wells")).await.unwrap();
        assert_eq!(campaign.hashtags, vec!["wells", "schools"]);
        assert_eq!(campaign.currency, "usd");
        assert!(campaign.is_active_at(Utc::now()));
    }

    #[tokio::test]
    async fn test_list_filters() {
        let env = TestEnv::new();
        let admin = env.admin().await;
        let a = env.services.campaigns.create(&admin, input("A")).await.unwrap();
        env.services.campaigns.create(&admin, input("B")).await.unwrap();

        env.services
            .campaigns
            .update(
                &admin,
                a.id,
                UpdateCampaignInput {
                    status: Some(CampaignStatus::Paused),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let active = env
            .services
            .campaigns
            .list(
                CampaignFilter {
                    active_only: true,
                    ..Default::default()
                },
                Page::default(),
            )
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].title, "B");

        let tagged = env
            .services
            .campaigns
            .list(
                CampaignFilter {
                    hashtag: Some("#Wells".into()),
                    ..Default::default()
                },
                Page::default(),
            )
            .await
            .unwrap();
        assert_eq!(tagged.len(), 2);
    }

    #[tokio::test]
    async fn test_update_resyncs_hashtags_and_delete_releases() {
        let env = TestEnv::new();
        let admin = env.admin().await;
        let campaign = env.services.campaigns.create(&admin, input("Wells")).await.unwrap();

        let updated = env
            .services
            .campaigns
            .update(
                &admin,
                campaign.id,
                UpdateCampaignInput {
                    description: Some("Now about #water".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.hashtags, vec!["water"]);

        let names: Vec<String> = env
            .services
            .hashtags
            .trending(Some(HashtagCategory::Campaign), 10)
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.name)
            .collect();
        assert_eq!(names, vec!["water"]);

        env.services.campaigns.delete(&admin, campaign.id).await.unwrap();
        assert!(env
            .services
            .hashtags
            .trending(Some(HashtagCategory::Campaign), 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_stats_are_cached_and_invalidated() {
        let env = TestEnv::new();
        let admin = env.admin().await;
        env.services.campaigns.create(&admin, input("A")).await.unwrap();

        let stats = env.services.campaigns.stats().await.unwrap();
        assert_eq!(stats.campaign_count, 1);
        assert_eq!(stats.total_goal, 100_000);
        assert_eq!(stats.active_campaign_count, 1);

        env.services.campaigns.create(&admin, input("B")).await.unwrap();
        let stats = env.services.campaigns.stats().await.unwrap();
        assert_eq!(stats.campaign_count, 2);
    }
}
