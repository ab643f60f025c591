//! Campaign model
//!
//! A fundraising campaign with a goal and a running total. Amounts are
//! integers in the currency's minor unit.

use async_graphql::{Enum, InputObject, SimpleObject};
use bson::oid::ObjectId;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Entity;

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
#[graphql(complex)]
pub struct Campaign {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub goal_amount: i64,
    pub current_amount: i64,
    pub currency: String,
    pub donor_count: i64,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_date: DateTime<Utc>,
    pub status: CampaignStatus,
    pub image: Option<String>,
    pub hashtags: Vec<String>,
    #[graphql(skip)]
    pub created_by: ObjectId,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Raised share of the goal in percent, rounded to one decimal
    pub fn percentage_funded(&self) -> f64 {
        if self.goal_amount <= 0 {
            return 0.0;
        }
        let pct = self.current_amount as f64 / self.goal_amount as f64 * 100.0;
        (pct * 10.0).round() / 10.0
    }

    /// Whole days until the end date, never negative
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.end_date - now).num_days().max(0)
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == CampaignStatus::Active && self.start_date <= now && now <= self.end_date
    }
}

impl Entity for Campaign {
    const COLLECTION: &'static str = "campaigns";

    fn id(&self) -> ObjectId {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Enum)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    #[default]
    Active,
    Paused,
    Closed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Active => "active",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, InputObject)]
pub struct CreateCampaignInput {
    pub title: String,
    pub description: String,
    pub category: String,
    pub goal_amount: i64,
    pub currency: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: DateTime<Utc>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, InputObject)]
pub struct UpdateCampaignInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub goal_amount: Option<i64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: Option<CampaignStatus>,
    pub image: Option<String>,
}

/// Aggregate figures over all campaigns and donations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, SimpleObject)]
pub struct CampaignStats {
    pub total_raised: i64,
    pub total_goal: i64,
    pub campaign_count: i64,
    pub active_campaign_count: i64,
    pub donor_count: i64,
    pub donation_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn campaign(goal: i64, current: i64) -> Campaign {
        let now = Utc::now();
        Campaign {
            id: ObjectId::new(),
            title: "Wells".into(),
            description: "Clean water".into(),
            category: "water".into(),
            goal_amount: goal,
            current_amount: current,
            currency: "usd".into(),
            donor_count: 0,
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(10),
            status: CampaignStatus::Active,
            image: None,
            hashtags: vec![],
            created_by: ObjectId::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_percentage_funded() {
        assert_eq!(campaign(3000, 1000).percentage_funded(), 33.3);
        assert_eq!(campaign(1000, 1500).percentage_funded(), 150.0);
        assert_eq!(campaign(0, 1500).percentage_funded(), 0.0);
    }

    #[test]
    fn test_activity_window() {
        let c = campaign(100, 0);
        let now = Utc::now();
        assert!(c.is_active_at(now));
        assert!(!c.is_active_at(now + Duration::days(11)));
        assert_eq!(c.days_remaining(now + Duration::days(20)), 0);
        assert!(c.days_remaining(now) >= 9);

        let mut paused = c.clone();
        paused.status = CampaignStatus::Paused;
        assert!(!paused.is_active_at(now));
    }
}
