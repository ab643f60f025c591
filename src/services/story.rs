//! Story service
//!
//! Member stories follow the blog approval rule.

use bson::oid::ObjectId;
use chrono::Utc;
use std::sync::Arc;

use super::error::{OrNotFound, ServiceResult};
use super::hashtag::{extract_from, HashtagService};
use super::validation;
use crate::db::{Filter, Page, Query, Repositories, Update};
use crate::models::{CreateStoryInput, HashtagCategory, Story, User};

pub struct StoryService {
    repos: Repositories,
    hashtags: Arc<HashtagService>,
}

impl StoryService {
    pub fn new(repos: Repositories, hashtags: Arc<HashtagService>) -> Self {
        Self { repos, hashtags }
    }

    pub async fn get(&self, viewer: Option<&User>, id: ObjectId) -> ServiceResult<Option<Story>> {
        Ok(self
            .repos
            .stories
            .get(id)
            .await?
            .filter(|s| s.approved || viewer.is_some_and(|u| u.can_manage(s.author_id))))
    }

    pub async fn list(&self, viewer: Option<&User>, include_pending: bool, page: Page) -> ServiceResult<Vec<Story>> {
        let mut filter = Filter::all();
        if !(include_pending && viewer.is_some_and(User::is_admin)) {
            filter = filter.eq("approved", true);
        }
        Ok(self
            .repos
            .stories
            .find(Query::new(filter).newest_first().page(page))
            .await?)
    }

    pub async fn create(&self, actor: &User, input: CreateStoryInput) -> ServiceResult<Story> {
        let title = validation::title(&input.title)?;
        let content = validation::required("Content", &input.content)?;

        let now = Utc::now();
        let story = Story {
            id: ObjectId::new(),
            hashtags: extract_from(&[&title, &content]),
            title,
            content,
            image: input.image,
            author_id: actor.id,
            approved: actor.is_trusted(),
            created_at: now,
            updated_at: now,
        };
        self.repos.stories.insert(&story).await?;
        self.hashtags.track(&story.hashtags, HashtagCategory::Story).await?;
        Ok(story)
    }

    pub async fn approve(&self, actor: &User, id: ObjectId) -> ServiceResult<Story> {
        validation::ensure_admin(actor)?;
        self.repos
            .stories
            .update_one(
                Filter::id(id),
                Update::new().set("approved", true).set("updated_at", Utc::now()),
            )
            .await?
            .or_not_found("Story")
    }

    pub async fn delete(&self, actor: &User, id: ObjectId) -> ServiceResult<bool> {
        let existing = self.repos.stories.get(id).await?.or_not_found("Story")?;
        validation::ensure_can_manage(actor, existing.author_id)?;
        self.repos.stories.delete(id).await?;
        self.hashtags.untrack(&existing.hashtags, HashtagCategory::Story).await?;
        Ok(true)
    }
}
