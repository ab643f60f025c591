//! Charity store item
//!
//! Proceeds of an item may be attributed to a campaign.

use async_graphql::{InputObject, SimpleObject};
use bson::oid::ObjectId;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Entity;

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
#[graphql(complex)]
pub struct StoreItem {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub description: String,
    /// Unit price in minor units
    pub price: i64,
    pub currency: String,
    pub stock: i64,
    pub category: String,
    pub images: Vec<String>,
    pub campaign_id: Option<ObjectId>,
    /// Inactive items are hidden from non-admins and cannot be bought
    pub active: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl StoreItem {
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

impl Entity for StoreItem {
    const COLLECTION: &'static str = "store_items";

    fn id(&self) -> ObjectId {
        self.id
    }
}

#[derive(Debug, Clone, InputObject)]
pub struct CreateStoreItemInput {
    pub name: String,
    pub description: String,
    pub price: i64,
    pub currency: Option<String>,
    pub stock: i64,
    pub category: String,
    #[graphql(default)]
    pub images: Vec<String>,
    pub campaign_id: Option<ObjectId>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Default, InputObject)]
pub struct UpdateStoreItemInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub stock: Option<i64>,
    pub category: Option<String>,
    pub images: Option<Vec<String>>,
    pub campaign_id: Option<ObjectId>,
    pub active: Option<bool>,
}
