//! News service

use bson::oid::ObjectId;
use chrono::Utc;
use std::sync::Arc;

use super::error::{OrNotFound, ServiceResult};
use super::hashtag::{extract_from, HashtagService};
use super::validation;
use crate::db::{Filter, Page, Query, Repositories, Update};
use crate::models::{CreateNewsInput, HashtagCategory, News, UpdateNewsInput, User};

pub struct NewsService {
    repos: Repositories,
    hashtags: Arc<HashtagService>,
}

impl NewsService {
    pub fn new(repos: Repositories, hashtags: Arc<HashtagService>) -> Self {
        Self { repos, hashtags }
    }

    /// Drafts are only visible to admins
    pub async fn get(&self, viewer: Option<&User>, id: ObjectId) -> ServiceResult<Option<News>> {
        let is_admin = viewer.is_some_and(User::is_admin);
        Ok(self
            .repos
            .news
            .get(id)
            .await?
            .filter(|n| n.published || is_admin))
    }

    pub async fn list(&self, viewer: Option<&User>, published_only: bool, page: Page) -> ServiceResult<Vec<News>> {
        let mut filter = Filter::all();
        if published_only || !viewer.is_some_and(User::is_admin) {
            filter = filter.eq("published", true);
        }
        Ok(self
            .repos
            .news
            .find(Query::new(filter).newest_first().page(page))
            .await?)
    }

    pub async fn create(&self, actor: &User, input: CreateNewsInput) -> ServiceResult<News> {
        validation::ensure_admin(actor)?;
        let title = validation::title(&input.title)?;
        let summary = validation::required("Summary", &input.summary)?;
        let content = validation::required("Content", &input.content)?;

        let now = Utc::now();
        let news = News {
            id: ObjectId::new(),
            hashtags: extract_from(&[&title, &summary, &content]),
            title,
            summary,
            content,
            image: input.image,
            author_id: actor.id,
            published: input.published.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };
        self.repos.news.insert(&news).await?;
        self.hashtags.track(&news.hashtags, HashtagCategory::News).await?;
        Ok(news)
    }

    pub async fn update(&self, actor: &User, id: ObjectId, input: UpdateNewsInput) -> ServiceResult<News> {
        validation::ensure_admin(actor)?;
        let existing = self.repos.news.get(id).await?.or_not_found("News")?;

        let title = input.title.as_deref().map(validation::title).transpose()?;
        let summary = input
            .summary
            .as_deref()
            .map(|s| validation::required("Summary", s))
            .transpose()?;
        let content = input
            .content
            .as_deref()
            .map(|c| validation::required("Content", c))
            .transpose()?;
        let hashtags = extract_from(&[
            title.as_deref().unwrap_or(&existing.title),
            summary.as_deref().unwrap_or(&existing.summary),
            content.as_deref().unwrap_or(&existing.content),
        ]);

        let mut update = Update::new()
            .set("hashtags", hashtags.clone())
            .set("updated_at", Utc::now());
        if let Some(title) = title {
            update = update.set("title", title);
        }
        if let Some(summary) = summary {
            update = update.set("summary", summary);
        }
        if let Some(content) = content {
            update = update.set("content", content);
        }
        if let Some(image) = input.image {
            update = update.set("image", image);
        }
        if let Some(published) = input.published {
            update = update.set("published", published);
        }

        let updated = self
            .repos
            .news
            .update_one(Filter::id(id), update)
            .await?
            .or_not_found("News")?;
        self.hashtags
            .sync(&existing.hashtags, &hashtags, HashtagCategory::News)
            .await?;
        Ok(updated)
    }

    pub async fn delete(&self, actor: &User, id: ObjectId) -> ServiceResult<bool> {
        validation::ensure_admin(actor)?;
        let existing = self.repos.news.get(id).await?.or_not_found("News")?;
        self.repos.news.delete(id).await?;
        self.hashtags.untrack(&existing.hashtags, HashtagCategory::News).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::TestEnv;

    fn input(title: &str, published: bool) -> CreateNewsInput {
        CreateNewsInput {
            title: title.into(),
            summary: "Short".into(),
            content: "We opened a new #shelter".into(),
            image: None,
            published: Some(published),
        }
    }

    #[tokio::test]
    async fn test_drafts_hidden_from_public() {
        let env = TestEnv::new();
        let admin = env.admin().await;
        let draft = env.services.news.create(&admin, input("Draft", false)).await.unwrap();
        env.services.news.create(&admin, input("Live", true)).await.unwrap();

        assert_eq!(env.services.news.list(None, false, Page::default()).await.unwrap().len(), 1);
        assert_eq!(
            env.services.news.list(Some(&admin), false, Page::default()).await.unwrap().len(),
            2
        );
        assert_eq!(
            env.services.news.list(Some(&admin), true, Page::default()).await.unwrap().len(),
            1
        );
        assert!(env.services.news.get(None, draft.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_admin_only_writes() {
        let env = TestEnv::new();
        let admin = env.admin().await;
        let carol = env.member("carol").await;
        assert!(env.services.news.create(&carol, input("Hi", true)).await.is_err());

        let news = env.services.news.create(&admin, input("Hi", true)).await.unwrap();
        assert_eq!(news.hashtags, vec!["shelter"]);
        let updated = env
            .services
            .news
            .update(
                &admin,
                news.id,
                UpdateNewsInput {
                    published: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!updated.published);
        assert!(env.services.news.delete(&carol, news.id).await.is_err());
        assert!(env.services.news.delete(&admin, news.id).await.unwrap());
    }
}
