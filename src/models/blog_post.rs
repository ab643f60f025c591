//! Blog post and comment models
//!
//! Posts by regular members wait for admin approval; posts by admins and
//! group members are approved on creation. Comments are only accepted on
//! approved posts.

use async_graphql::{InputObject, SimpleObject};
use bson::oid::ObjectId;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{Entity, IndexSpec};

/// Excerpt length in characters
pub const EXCERPT_LENGTH: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
#[graphql(complex)]
pub struct BlogPost {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    #[graphql(skip)]
    pub author_id: ObjectId,
    pub approved: bool,
    /// Users who liked the post
    #[graphql(skip)]
    pub likes: Vec<ObjectId>,
    pub comment_count: i64,
    pub hashtags: Vec<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl BlogPost {
    pub fn like_count(&self) -> i32 {
        self.likes.len() as i32
    }

    pub fn is_liked_by(&self, user_id: ObjectId) -> bool {
        self.likes.contains(&user_id)
    }

    pub fn excerpt(&self) -> String {
        excerpt(&self.content, EXCERPT_LENGTH)
    }
}

impl Entity for BlogPost {
    const COLLECTION: &'static str = "blog_posts";

    fn id(&self) -> ObjectId {
        self.id
    }
}

/// Cut text to at most `max` characters, appending an ellipsis when cut
pub fn excerpt(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", trimmed[..end].trim_end()),
        None => trimmed.to_string(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
#[graphql(complex)]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub post_id: ObjectId,
    #[graphql(skip)]
    pub author_id: ObjectId,
    pub content: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Entity for Comment {
    const COLLECTION: &'static str = "comments";

    fn id(&self) -> ObjectId {
        self.id
    }

    fn indexes() -> &'static [IndexSpec] {
        &[IndexSpec {
            fields: &["post_id"],
            unique: false,
        }]
    }
}

#[derive(Debug, Clone, InputObject)]
pub struct CreateBlogPostInput {
    pub title: String,
    pub content: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, InputObject)]
pub struct UpdateBlogPostInput {
    pub title: Option<String>,
    pub content: Option<String>,
    pub image: Option<String>,
}
