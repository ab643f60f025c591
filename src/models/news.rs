//! News model

use async_graphql::{InputObject, SimpleObject};
use bson::oid::ObjectId;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Entity;

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
#[graphql(complex)]
pub struct News {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub image: Option<String>,
    #[graphql(skip)]
    pub author_id: ObjectId,
    pub published: bool,
    pub hashtags: Vec<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Entity for News {
    const COLLECTION: &'static str = "news";

    fn id(&self) -> ObjectId {
        self.id
    }
}

#[derive(Debug, Clone, InputObject)]
pub struct CreateNewsInput {
    pub title: String,
    pub summary: String,
    pub content: String,
    pub image: Option<String>,
    pub published: Option<bool>,
}

#[derive(Debug, Clone, Default, InputObject)]
pub struct UpdateNewsInput {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub image: Option<String>,
    pub published: Option<bool>,
}
