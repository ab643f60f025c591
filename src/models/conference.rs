//! Conference model

use async_graphql::{InputObject, SimpleObject};
use bson::oid::ObjectId;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Entity;

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
#[graphql(complex)]
pub struct Conference {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    pub description: String,
    pub location: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_date: DateTime<Utc>,
    pub speakers: Vec<String>,
    /// `None` means unlimited seating
    pub capacity: Option<i32>,
    #[graphql(skip)]
    pub attendees: Vec<ObjectId>,
    pub image: Option<String>,
    pub hashtags: Vec<String>,
    #[graphql(skip)]
    pub created_by: ObjectId,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Conference {
    pub fn attendee_count(&self) -> i32 {
        self.attendees.len() as i32
    }

    pub fn seats_remaining(&self) -> Option<i32> {
        self.capacity.map(|cap| (cap - self.attendee_count()).max(0))
    }

    pub fn is_upcoming_at(&self, now: DateTime<Utc>) -> bool {
        self.start_date > now
    }

    pub fn is_past_at(&self, now: DateTime<Utc>) -> bool {
        self.end_date < now
    }
}

impl Entity for Conference {
    const COLLECTION: &'static str = "conferences";

    fn id(&self) -> ObjectId {
        self.id
    }
}

#[derive(Debug, Clone, InputObject)]
pub struct CreateConferenceInput {
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[graphql(default)]
    pub speakers: Vec<String>,
    pub capacity: Option<i32>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, InputObject)]
pub struct UpdateConferenceInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub speakers: Option<Vec<String>>,
    pub capacity: Option<i32>,
    pub image: Option<String>,
}
