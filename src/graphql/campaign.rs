//! Campaigns, their statistics and donations

use async_graphql::{ComplexObject, Context, Object, Result, ResultExt};
use bson::oid::ObjectId;
use chrono::{DateTime, Utc};

use super::context::{page, ContextExt};
use super::loaders;
use crate::models::{Campaign, CampaignStats, CreateCampaignInput, Donation, Donor, UpdateCampaignInput, User};
use crate::services::CampaignFilter;

#[ComplexObject]
impl Campaign {
    async fn created_by(&self, ctx: &Context<'_>) -> Result<Option<User>> {
        loaders::user(ctx, self.created_by).await
    }

    /// Share of the goal raised so far, in percent
    #[graphql(name = "percentageFunded")]
    async fn resolve_percentage_funded(&self) -> f64 {
        self.percentage_funded()
    }

    #[graphql(name = "daysRemaining")]
    async fn resolve_days_remaining(&self) -> i64 {
        self.days_remaining(Utc::now())
    }

    async fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }

    /// Most recent donations first
    async fn donations(&self, ctx: &Context<'_>, limit: Option<i32>, offset: Option<i32>) -> Result<Vec<Donation>> {
        ctx.services()
            .payments
            .campaign_donations(self.id, page(limit, offset))
            .await
            .extend()
    }
}

#[ComplexObject]
impl Donation {
    /// Hidden for anonymous donations unless the viewer is an admin
    async fn donor(&self, ctx: &Context<'_>) -> Result<Option<Donor>> {
        if self.anonymous && !ctx.viewer().is_some_and(User::is_admin) {
            return Ok(None);
        }
        loaders::donor(ctx, self.donor_id).await
    }

    async fn donor_name(&self, ctx: &Context<'_>) -> Result<String> {
        if self.anonymous && !ctx.viewer().is_some_and(User::is_admin) {
            return Ok("Anonymous".to_string());
        }
        Ok(loaders::donor(ctx, self.donor_id)
            .await?
            .map(|d| d.name)
            .unwrap_or_else(|| "Anonymous".to_string()))
    }

    async fn campaign(&self, ctx: &Context<'_>) -> Result<Option<Campaign>> {
        match self.campaign_id {
            Some(id) => loaders::campaign(ctx, id).await,
            None => Ok(None),
        }
    }
}

#[ComplexObject]
impl Donor {
    async fn email(&self, ctx: &Context<'_>) -> Option<String> {
        self.is_visible_to(ctx.viewer()).then(|| self.email.clone())
    }

    // Totals include anonymous gifts, so they stay with admins and the donor
    #[graphql(name = "totalDonations")]
    async fn resolve_total_donations(&self, ctx: &Context<'_>) -> Option<i64> {
        self.is_visible_to(ctx.viewer()).then_some(self.total_donations)
    }

    #[graphql(name = "donationCount")]
    async fn resolve_donation_count(&self, ctx: &Context<'_>) -> Option<i64> {
        self.is_visible_to(ctx.viewer()).then_some(self.donation_count)
    }

    #[graphql(name = "averageDonation")]
    async fn resolve_average_donation(&self, ctx: &Context<'_>) -> Option<i64> {
        self.is_visible_to(ctx.viewer()).then(|| self.average_donation())
    }

    #[graphql(name = "lastDonationAt")]
    async fn resolve_last_donation_at(&self, ctx: &Context<'_>) -> Option<DateTime<Utc>> {
        self.is_visible_to(ctx.viewer()).then_some(self.last_donation_at).flatten()
    }

    /// Anonymous donations are listed for admins and the donor only
    async fn donations(&self, ctx: &Context<'_>, limit: Option<i32>, offset: Option<i32>) -> Result<Vec<Donation>> {
        let include_anonymous = self.is_visible_to(ctx.viewer());
        ctx.services()
            .payments
            .donor_donations(self.id, include_anonymous, page(limit, offset))
            .await
            .extend()
    }
}

#[derive(Default)]
pub struct CampaignQuery;

#[Object]
impl CampaignQuery {
    async fn campaigns(
        &self,
        ctx: &Context<'_>,
        #[graphql(default)] active_only: bool,
        category: Option<String>,
        hashtag: Option<String>,
        limit: Option<i32>,
        offset: Option<i32>,
    ) -> Result<Vec<Campaign>> {
        let filter = CampaignFilter {
            active_only,
            category,
            hashtag,
        };
        ctx.services()
            .campaigns
            .list(filter, page(limit, offset))
            .await
            .extend()
    }

    async fn campaign(&self, ctx: &Context<'_>, id: ObjectId) -> Result<Option<Campaign>> {
        ctx.services().campaigns.get(id).await.extend()
    }

    async fn campaign_stats(&self, ctx: &Context<'_>) -> Result<CampaignStats> {
        ctx.services().campaigns.stats().await.extend()
    }

    async fn top_donors(&self, ctx: &Context<'_>, #[graphql(default = 10)] limit: i32) -> Result<Vec<Donor>> {
        let actor = ctx.require_user()?;
        ctx.services()
            .campaigns
            .top_donors(actor, i64::from(limit))
            .await
            .extend()
    }
}

#[derive(Default)]
pub struct CampaignMutation;

#[Object]
impl CampaignMutation {
    async fn create_campaign(&self, ctx: &Context<'_>, input: CreateCampaignInput) -> Result<Campaign> {
        let actor = ctx.require_user()?;
        ctx.services().campaigns.create(actor, input).await.extend()
    }

    async fn update_campaign(&self, ctx: &Context<'_>, id: ObjectId, input: UpdateCampaignInput) -> Result<Campaign> {
        let actor = ctx.require_user()?;
        ctx.services().campaigns.update(actor, id, input).await.extend()
    }

    async fn delete_campaign(&self, ctx: &Context<'_>, id: ObjectId) -> Result<bool> {
        let actor = ctx.require_user()?;
        ctx.services().campaigns.delete(actor, id).await.extend()
    }
}
