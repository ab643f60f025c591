//! Chat message model

use async_graphql::SimpleObject;
use bson::oid::ObjectId;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{Entity, IndexSpec};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SimpleObject)]
#[graphql(complex)]
pub struct ChatMessage {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub room: String,
    pub sender_id: ObjectId,
    pub content: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Entity for ChatMessage {
    const COLLECTION: &'static str = "chat_messages";

    fn id(&self) -> ObjectId {
        self.id
    }

    fn indexes() -> &'static [IndexSpec] {
        &[IndexSpec {
            fields: &["room", "created_at"],
            unique: false,
        }]
    }
}
