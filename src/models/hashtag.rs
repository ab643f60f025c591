//! Hashtag model
//!
//! A tag is counted separately per content category, so `#water` on a
//! campaign and on a blog post are two records.

use async_graphql::{Enum, SimpleObject};
use bson::oid::ObjectId;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::{Entity, IndexSpec};

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
pub struct Hashtag {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    /// Lowercase, without the leading `#`
    pub name: String,
    pub category: HashtagCategory,
    pub count: i64,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub last_used_at: DateTime<Utc>,
}

impl Entity for Hashtag {
    const COLLECTION: &'static str = "hashtags";

    fn id(&self) -> ObjectId {
        self.id
    }

    fn indexes() -> &'static [IndexSpec] {
        &[IndexSpec {
            fields: &["name", "category"],
            unique: true,
        }]
    }
}

/// Content kinds that carry hashtags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Enum)]
#[serde(rename_all = "lowercase")]
pub enum HashtagCategory {
    Campaign,
    Initiative,
    Conference,
    Event,
    News,
    Blog,
    Recipe,
    Story,
}

impl HashtagCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashtagCategory::Campaign => "campaign",
            HashtagCategory::Initiative => "initiative",
            HashtagCategory::Conference => "conference",
            HashtagCategory::Event => "event",
            HashtagCategory::News => "news",
            HashtagCategory::Blog => "blog",
            HashtagCategory::Recipe => "recipe",
            HashtagCategory::Story => "story",
        }
    }
}

impl fmt::Display for HashtagCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
