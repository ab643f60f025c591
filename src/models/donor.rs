//! Donor and donation models
//!
//! Donors are keyed by email so anonymous visitors and registered users share
//! one giving history. A donation is the record of one successful donation
//! payment.

use async_graphql::SimpleObject;
use bson::oid::ObjectId;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{Entity, IndexSpec};
use crate::models::User;

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
#[graphql(complex)]
pub struct Donor {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    /// Visible to admins and the linked user only
    #[graphql(skip)]
    pub email: String,
    pub user_id: Option<ObjectId>,
    #[graphql(skip)]
    pub stripe_customer_id: Option<String>,
    /// Net amount donated in minor units (refunds subtracted)
    #[graphql(skip)]
    pub total_donations: i64,
    #[graphql(skip)]
    pub donation_count: i64,
    #[graphql(skip)]
    #[serde(default, with = "crate::models::datetime")]
    pub last_donation_at: Option<DateTime<Utc>>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Donor {
    pub fn new(name: String, email: String, user_id: Option<ObjectId>) -> Self {
        Self {
            id: ObjectId::new(),
            name,
            email,
            user_id,
            stripe_customer_id: None,
            total_donations: 0,
            donation_count: 0,
            last_donation_at: None,
            created_at: Utc::now(),
        }
    }

    /// Whether the viewer may see the full giving history, anonymous gifts included
    pub fn is_visible_to(&self, viewer: Option<&User>) -> bool {
        viewer.is_some_and(|v| v.is_admin() || self.user_id == Some(v.id))
    }

    /// Mean donation in minor units, 0 without donations
    pub fn average_donation(&self) -> i64 {
        if self.donation_count == 0 {
            0
        } else {
            self.total_donations / self.donation_count
        }
    }
}

impl Entity for Donor {
    const COLLECTION: &'static str = "donors";

    fn id(&self) -> ObjectId {
        self.id
    }

    fn indexes() -> &'static [IndexSpec] {
        &[IndexSpec {
            fields: &["email"],
            unique: true,
        }]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
#[graphql(complex)]
pub struct Donation {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[graphql(skip)]
    pub donor_id: ObjectId,
    pub campaign_id: Option<ObjectId>,
    /// One donation per payment
    pub payment_id: ObjectId,
    pub amount: i64,
    pub currency: String,
    pub message: Option<String>,
    pub anonymous: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Entity for Donation {
    const COLLECTION: &'static str = "donations";

    fn id(&self) -> ObjectId {
        self.id
    }

    fn indexes() -> &'static [IndexSpec] {
        &[
            IndexSpec {
                fields: &["payment_id"],
                unique: true,
            },
            IndexSpec {
                fields: &["campaign_id"],
                unique: false,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_donation() {
        let mut donor = Donor::new("Ada".into(), "ada@example.org".into(), None);
        assert_eq!(donor.average_donation(), 0);

        donor.total_donations = 3000;
        donor.donation_count = 4;
        assert_eq!(donor.average_donation(), 750);
    }
}
