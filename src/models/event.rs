//! Event model

use async_graphql::{InputObject, SimpleObject};
use bson::oid::ObjectId;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Entity;

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
#[graphql(complex)]
pub struct Event {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    pub description: String,
    pub location: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub date: DateTime<Utc>,
    pub category: String,
    pub image: Option<String>,
    #[graphql(skip)]
    pub attendees: Vec<ObjectId>,
    pub hashtags: Vec<String>,
    #[graphql(skip)]
    pub organizer_id: ObjectId,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn is_past_at(&self, now: DateTime<Utc>) -> bool {
        self.date < now
    }
}

impl Entity for Event {
    const COLLECTION: &'static str = "events";

    fn id(&self) -> ObjectId {
        self.id
    }
}

#[derive(Debug, Clone, InputObject)]
pub struct CreateEventInput {
    pub title: String,
    pub description: String,
    pub location: String,
    pub date: DateTime<Utc>,
    pub category: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, InputObject)]
pub struct UpdateEventInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub category: Option<String>,
    pub image: Option<String>,
}
