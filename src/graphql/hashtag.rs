use async_graphql::{Context, Object, Result, ResultExt};

use super::context::ContextExt;
use crate::models::{Hashtag, HashtagCategory};

#[derive(Default)]
pub struct HashtagQuery;

#[Object]
impl HashtagQuery {
    /// Most used tags, optionally within one category
    async fn trending_hashtags(
        &self,
        ctx: &Context<'_>,
        category: Option<HashtagCategory>,
        #[graphql(default = 10)] limit: i32,
    ) -> Result<Vec<Hashtag>> {
        ctx.services()
            .hashtags
            .trending(category, i64::from(limit))
            .await
            .extend()
    }

    async fn search_hashtags(
        &self,
        ctx: &Context<'_>,
        prefix: String,
        #[graphql(default = 10)] limit: i32,
    ) -> Result<Vec<Hashtag>> {
        ctx.services()
            .hashtags
            .search(&prefix, i64::from(limit))
            .await
            .extend()
    }
}
