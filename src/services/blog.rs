//! Blog service
//!
//! Posts, likes and comments. Posts by trusted authors are published
//! directly; the rest wait for an admin. Pending posts are visible to their
//! author and to admins only.

use bson::oid::ObjectId;
use chrono::Utc;
use std::sync::Arc;

use super::error::{OrNotFound, ServiceError, ServiceResult};
use super::hashtag::{extract_from, HashtagService};
use super::validation;
use crate::db::{Filter, Page, Query, Repositories, SortOrder, Update};
use crate::models::{BlogPost, Comment, CreateBlogPostInput, HashtagCategory, UpdateBlogPostInput, User};

pub const MAX_COMMENT_LENGTH: usize = 2000;

pub struct BlogService {
    repos: Repositories,
    hashtags: Arc<HashtagService>,
}

fn visible_to(post: &BlogPost, viewer: Option<&User>) -> bool {
    post.approved || viewer.is_some_and(|u| u.can_manage(post.author_id))
}

impl BlogService {
    pub fn new(repos: Repositories, hashtags: Arc<HashtagService>) -> Self {
        Self { repos, hashtags }
    }

    pub async fn get(&self, viewer: Option<&User>, id: ObjectId) -> ServiceResult<Option<BlogPost>> {
        Ok(self
            .repos
            .blog_posts
            .get(id)
            .await?
            .filter(|post| visible_to(post, viewer)))
    }

    pub async fn list(
        &self,
        viewer: Option<&User>,
        hashtag: Option<String>,
        include_pending: bool,
        page: Page,
    ) -> ServiceResult<Vec<BlogPost>> {
        let mut filter =
            Filter::all().eq_opt("hashtags", hashtag.map(|h| h.trim_start_matches('#').to_lowercase()));
        if !(include_pending && viewer.is_some_and(User::is_admin)) {
            filter = filter.eq("approved", true);
        }
        Ok(self
            .repos
            .blog_posts
            .find(Query::new(filter).newest_first().page(page))
            .await?)
    }

    pub async fn create(&self, actor: &User, input: CreateBlogPostInput) -> ServiceResult<BlogPost> {
        let title = validation::title(&input.title)?;
        let content = validation::required("Content", &input.content)?;

        let now = Utc::now();
        let post = BlogPost {
            id: ObjectId::new(),
            hashtags: extract_from(&[&title, &content]),
            title,
            content,
            image: input.image,
            author_id: actor.id,
            approved: actor.is_trusted(),
            likes: Vec::new(),
            comment_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.repos.blog_posts.insert(&post).await?;
        self.hashtags.track(&post.hashtags, HashtagCategory::Blog).await?;
        tracing::info!(post_id = %post.id, approved = post.approved, "Blog post created");
        Ok(post)
    }

    pub async fn update(&self, actor: &User, id: ObjectId, input: UpdateBlogPostInput) -> ServiceResult<BlogPost> {
        let existing = self.repos.blog_posts.get(id).await?.or_not_found("Blog post")?;
        validation::ensure_can_manage(actor, existing.author_id)?;

        let title = input.title.as_deref().map(validation::title).transpose()?;
        let content = input
            .content
            .as_deref()
            .map(|c| validation::required("Content", c))
            .transpose()?;
        let hashtags = extract_from(&[
            title.as_deref().unwrap_or(&existing.title),
            content.as_deref().unwrap_or(&existing.content),
        ]);

        let mut update = Update::new()
            .set("hashtags", hashtags.clone())
            .set("updated_at", Utc::now());
        if let Some(title) = title {
            update = update.set("title", title);
        }
        if let Some(content) = content {
            update = update.set("content", content);
        }
        if let Some(image) = input.image {
            update = update.set("image", image);
        }

        let updated = self
            .repos
            .blog_posts
            .update_one(Filter::id(id), update)
            .await?
            .or_not_found("Blog post")?;
        self.hashtags
            .sync(&existing.hashtags, &hashtags, HashtagCategory::Blog)
            .await?;
        Ok(updated)
    }

    /// Delete a post together with its comments
    pub async fn delete(&self, actor: &User, id: ObjectId) -> ServiceResult<bool> {
        let existing = self.repos.blog_posts.get(id).await?.or_not_found("Blog post")?;
        validation::ensure_can_manage(actor, existing.author_id)?;

        self.repos.blog_posts.delete(id).await?;
        let comments = self
            .repos
            .comments
            .delete_many(Filter::all().eq("post_id", id))
            .await?;
        self.hashtags.untrack(&existing.hashtags, HashtagCategory::Blog).await?;
        tracing::info!(post_id = %id, comments, "Blog post deleted");
        Ok(true)
    }

    pub async fn approve(&self, actor: &User, id: ObjectId) -> ServiceResult<BlogPost> {
        validation::ensure_admin(actor)?;
        self.repos
            .blog_posts
            .update_one(
                Filter::id(id),
                Update::new().set("approved", true).set("updated_at", Utc::now()),
            )
            .await?
            .or_not_found("Blog post")
    }

    pub async fn like(&self, actor: &User, id: ObjectId) -> ServiceResult<BlogPost> {
        self.get(Some(actor), id).await?.or_not_found("Blog post")?;
        self.repos
            .blog_posts
            .update_one(Filter::id(id), Update::new().add_to_set("likes", actor.id))
            .await?
            .or_not_found("Blog post")
    }

    pub async fn unlike(&self, actor: &User, id: ObjectId) -> ServiceResult<BlogPost> {
        self.repos
            .blog_posts
            .update_one(Filter::id(id), Update::new().pull("likes", actor.id))
            .await?
            .or_not_found("Blog post")
    }

    // ========================================================================
    // Comments
    // ========================================================================

    /// Oldest first
    pub async fn comments(&self, viewer: Option<&User>, post_id: ObjectId, page: Page) -> ServiceResult<Vec<Comment>> {
        self.get(viewer, post_id).await?.or_not_found("Blog post")?;
        Ok(self
            .repos
            .comments
            .find(
                Query::new(Filter::all().eq("post_id", post_id))
                    .sort("created_at", SortOrder::Ascending)
                    .page(page),
            )
            .await?)
    }

    pub async fn add_comment(&self, actor: &User, post_id: ObjectId, content: &str) -> ServiceResult<Comment> {
        let content = validation::required("Comment", content)?;
        if content.chars().count() > MAX_COMMENT_LENGTH {
            return Err(ServiceError::validation(format!(
                "Comment must be at most {} characters",
                MAX_COMMENT_LENGTH
            )));
        }
        let post = self.repos.blog_posts.get(post_id).await?.or_not_found("Blog post")?;
        if !post.approved {
            return Err(ServiceError::validation("Comments are only allowed on published posts"));
        }

        let comment = Comment {
            id: ObjectId::new(),
            post_id,
            author_id: actor.id,
            content,
            created_at: Utc::now(),
        };
        self.repos.comments.insert(&comment).await?;
        self.repos
            .blog_posts
            .update_one(Filter::id(post_id), Update::new().inc("comment_count", 1i64))
            .await?;
        Ok(comment)
    }

    pub async fn delete_comment(&self, actor: &User, id: ObjectId) -> ServiceResult<bool> {
        let comment = self.repos.comments.get(id).await?.or_not_found("Comment")?;
        validation::ensure_can_manage(actor, comment.author_id)?;

        if self.repos.comments.delete(id).await? {
            self.repos
                .blog_posts
                .update_one(
                    Filter::id(comment.post_id).gte("comment_count", 1i64),
                    Update::new().inc("comment_count", -1i64),
                )
                .await?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::TestEnv;

    fn input(title: &str) -> CreateBlogPostInput {
        CreateBlogPostInput {
            title: title.into(),
            content: "Our volunteers #rock".into(),
            image: None,
        }
    }

    #[tokio::test]
    async fn test_approval_rule_and_visibility() {
        let env = TestEnv::new();
        let admin = env.admin().await;
        let carol = env.member("carol").await;
        let bob = env.user("bob").await;
        let eve = env.user("eve").await;

        let trusted = env.services.blog.create(&carol, input("Trusted")).await.unwrap();
        assert!(trusted.approved);
        let pending = env.services.blog.create(&bob, input("Pending")).await.unwrap();
        assert!(!pending.approved);

        assert_eq!(env.services.blog.list(None, None, true, Page::default()).await.unwrap().len(), 1);
        assert_eq!(
            env.services.blog.list(Some(&admin), None, true, Page::default()).await.unwrap().len(),
            2
        );

        assert!(env.services.blog.get(Some(&bob), pending.id).await.unwrap().is_some());
        assert!(env.services.blog.get(Some(&eve), pending.id).await.unwrap().is_none());
        assert!(env.services.blog.get(None, pending.id).await.unwrap().is_none());

        assert!(env.services.blog.approve(&bob, pending.id).await.is_err());
        let approved = env.services.blog.approve(&admin, pending.id).await.unwrap();
        assert!(approved.approved);
        assert!(env.services.blog.get(None, pending.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_likes_are_idempotent() {
        let env = TestEnv::new();
        let carol = env.member("carol").await;
        let bob = env.user("bob").await;
        let post = env.services.blog.create(&carol, input("Post")).await.unwrap();

        env.services.blog.like(&bob, post.id).await.unwrap();
        let liked = env.services.blog.like(&bob, post.id).await.unwrap();
        assert_eq!(liked.like_count(), 1);
        assert!(liked.is_liked_by(bob.id));

        let unliked = env.services.blog.unlike(&bob, post.id).await.unwrap();
        assert_eq!(unliked.like_count(), 0);
        let again = env.services.blog.unlike(&bob, post.id).await.unwrap();
        assert_eq!(again.like_count(), 0);
    }

    #[tokio::test]
    async fn test_comments_lifecycle() {
        let env = TestEnv::new();
        let admin = env.admin().await;
        let carol = env.member("carol").await;
        let bob = env.user("bob").await;
        let post = env.services.blog.create(&carol, input("Post")).await.unwrap();
        let pending = env.services.blog.create(&bob, input("Pending")).await.unwrap();

        assert!(env.services.blog.add_comment(&bob, pending.id, "Hi").await.is_err());
        assert!(env.services.blog.add_comment(&bob, post.id, "   ").await.is_err());

        let first = env.services.blog.add_comment(&bob, post.id, "Great work").await.unwrap();
        env.services.blog.add_comment(&carol, post.id, "Thanks!").await.unwrap();
        let post_now = env.repos.blog_posts.get(post.id).await.unwrap().unwrap();
        assert_eq!(post_now.comment_count, 2);

        let comments = env.services.blog.comments(None, post.id, Page::default()).await.unwrap();
        assert_eq!(comments[0].content, "Great work");

        assert!(env.services.blog.delete_comment(&carol, first.id).await.is_err());
        assert!(env.services.blog.delete_comment(&admin, first.id).await.unwrap());
        let post_now = env.repos.blog_posts.get(post.id).await.unwrap().unwrap();
        assert_eq!(post_now.comment_count, 1);

        env.services.blog.delete(&carol, post.id).await.unwrap();
        assert_eq!(env.repos.comments.count(Filter::all()).await.unwrap(), 0);
    }
}
