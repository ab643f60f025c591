//! Initiative model
//!
//! Volunteer initiatives members can join, optionally capped in size.

use async_graphql::{InputObject, SimpleObject};
use bson::oid::ObjectId;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Entity;

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
#[graphql(complex)]
pub struct Initiative {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_date: DateTime<Utc>,
    #[serde(default, with = "crate::models::datetime")]
    pub end_date: Option<DateTime<Utc>>,
    /// `None` means unlimited
    pub max_participants: Option<i32>,
    #[graphql(skip)]
    pub participants: Vec<ObjectId>,
    pub image: Option<String>,
    pub hashtags: Vec<String>,
    #[graphql(skip)]
    pub created_by: ObjectId,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Initiative {
    pub fn participant_count(&self) -> i32 {
        self.participants.len() as i32
    }

    pub fn spots_remaining(&self) -> Option<i32> {
        self.max_participants
            .map(|max| (max - self.participant_count()).max(0))
    }

    pub fn is_full(&self) -> bool {
        self.spots_remaining() == Some(0)
    }

    /// Started and not yet ended
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.start_date <= now && self.end_date.map_or(true, |end| now <= end)
    }

    pub fn has_ended_at(&self, now: DateTime<Utc>) -> bool {
        self.end_date.is_some_and(|end| end < now)
    }
}

impl Entity for Initiative {
    const COLLECTION: &'static str = "initiatives";

    fn id(&self) -> ObjectId {
        self.id
    }
}

#[derive(Debug, Clone, InputObject)]
pub struct CreateInitiativeInput {
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub max_participants: Option<i32>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, InputObject)]
pub struct UpdateInitiativeInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub max_participants: Option<i32>,
    pub image: Option<String>,
}
