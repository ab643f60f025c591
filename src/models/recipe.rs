//! Recipe model

use async_graphql::{InputObject, SimpleObject};
use bson::oid::ObjectId;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Entity;

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
#[graphql(complex)]
pub struct Recipe {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    pub description: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub prep_minutes: i32,
    pub cook_minutes: i32,
    pub servings: i32,
    pub image: Option<String>,
    #[graphql(skip)]
    pub author_id: ObjectId,
    pub hashtags: Vec<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Recipe {
    pub fn total_minutes(&self) -> i32 {
        self.prep_minutes + self.cook_minutes
    }
}

impl Entity for Recipe {
    const COLLECTION: &'static str = "recipes";

    fn id(&self) -> ObjectId {
        self.id
    }
}

#[derive(Debug, Clone, InputObject)]
pub struct CreateRecipeInput {
    pub title: String,
    pub description: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    #[graphql(default)]
    pub prep_minutes: i32,
    #[graphql(default)]
    pub cook_minutes: i32,
    #[graphql(default = 1)]
    pub servings: i32,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, InputObject)]
pub struct UpdateRecipeInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub ingredients: Option<Vec<String>>,
    pub instructions: Option<Vec<String>>,
    pub prep_minutes: Option<i32>,
    pub cook_minutes: Option<i32>,
    pub servings: Option<i32>,
    pub image: Option<String>,
}
