//! Editorial and community content: news, blog, recipes and stories

use async_graphql::{ComplexObject, Context, Object, Result, ResultExt};
use bson::oid::ObjectId;

use super::context::{page, ContextExt};
use super::loaders;
use crate::models::{
    BlogPost, Comment, CreateBlogPostInput, CreateNewsInput, CreateRecipeInput, CreateStoryInput, News, Recipe,
    Story, UpdateBlogPostInput, UpdateNewsInput, UpdateRecipeInput, User,
};

#[ComplexObject]
impl News {
    async fn author(&self, ctx: &Context<'_>) -> Result<Option<User>> {
        loaders::user(ctx, self.author_id).await
    }
}

#[ComplexObject]
impl BlogPost {
    async fn author(&self, ctx: &Context<'_>) -> Result<Option<User>> {
        loaders::user(ctx, self.author_id).await
    }

    #[graphql(name = "likeCount")]
    async fn resolve_like_count(&self) -> i32 {
        self.like_count()
    }

    async fn liked_by_me(&self, ctx: &Context<'_>) -> bool {
        ctx.viewer().is_some_and(|v| self.is_liked_by(v.id))
    }

    /// Plain-text preview of the content
    #[graphql(name = "excerpt")]
    async fn resolve_excerpt(&self) -> String {
        self.excerpt()
    }

    async fn comments(&self, ctx: &Context<'_>, limit: Option<i32>, offset: Option<i32>) -> Result<Vec<Comment>> {
        ctx.services()
            .blog
            .comments(ctx.viewer(), self.id, page(limit, offset))
            .await
            .extend()
    }
}

#[ComplexObject]
impl Comment {
    async fn author(&self, ctx: &Context<'_>) -> Result<Option<User>> {
        loaders::user(ctx, self.author_id).await
    }
}

#[ComplexObject]
impl Recipe {
    async fn author(&self, ctx: &Context<'_>) -> Result<Option<User>> {
        loaders::user(ctx, self.author_id).await
    }

    #[graphql(name = "totalMinutes")]
    async fn resolve_total_minutes(&self) -> i32 {
        self.total_minutes()
    }
}

#[ComplexObject]
impl Story {
    async fn author(&self, ctx: &Context<'_>) -> Result<Option<User>> {
        loaders::user(ctx, self.author_id).await
    }
}

#[derive(Default)]
pub struct ContentQuery;

#[Object]
impl ContentQuery {
    /// Drafts are listed for admins only
    async fn news_list(
        &self,
        ctx: &Context<'_>,
        #[graphql(default = true)] published_only: bool,
        limit: Option<i32>,
        offset: Option<i32>,
    ) -> Result<Vec<News>> {
        ctx.services()
            .news
            .list(ctx.viewer(), published_only, page(limit, offset))
            .await
            .extend()
    }

    async fn news(&self, ctx: &Context<'_>, id: ObjectId) -> Result<Option<News>> {
        ctx.services().news.get(ctx.viewer(), id).await.extend()
    }

    async fn blog_posts(
        &self,
        ctx: &Context<'_>,
        hashtag: Option<String>,
        #[graphql(default)] include_pending: bool,
        limit: Option<i32>,
        offset: Option<i32>,
    ) -> Result<Vec<BlogPost>> {
        ctx.services()
            .blog
            .list(ctx.viewer(), hashtag, include_pending, page(limit, offset))
            .await
            .extend()
    }

    async fn blog_post(&self, ctx: &Context<'_>, id: ObjectId) -> Result<Option<BlogPost>> {
        ctx.services().blog.get(ctx.viewer(), id).await.extend()
    }

    async fn comments(
        &self,
        ctx: &Context<'_>,
        post_id: ObjectId,
        limit: Option<i32>,
        offset: Option<i32>,
    ) -> Result<Vec<Comment>> {
        ctx.services()
            .blog
            .comments(ctx.viewer(), post_id, page(limit, offset))
            .await
            .extend()
    }

    async fn recipes(
        &self,
        ctx: &Context<'_>,
        hashtag: Option<String>,
        limit: Option<i32>,
        offset: Option<i32>,
    ) -> Result<Vec<Recipe>> {
        ctx.services()
            .recipes
            .list(hashtag, page(limit, offset))
            .await
            .extend()
    }

    async fn recipe(&self, ctx: &Context<'_>, id: ObjectId) -> Result<Option<Recipe>> {
        ctx.services().recipes.get(id).await.extend()
    }

    async fn stories(
        &self,
        ctx: &Context<'_>,
        #[graphql(default)] include_pending: bool,
        limit: Option<i32>,
        offset: Option<i32>,
    ) -> Result<Vec<Story>> {
        ctx.services()
            .stories
            .list(ctx.viewer(), include_pending, page(limit, offset))
            .await
            .extend()
    }

    async fn story(&self, ctx: &Context<'_>, id: ObjectId) -> Result<Option<Story>> {
        ctx.services().stories.get(ctx.viewer(), id).await.extend()
    }
}

#[derive(Default)]
pub struct ContentMutation;

#[Object]
impl ContentMutation {
    // News

    async fn create_news(&self, ctx: &Context<'_>, input: CreateNewsInput) -> Result<News> {
        let actor = ctx.require_user()?;
        ctx.services().news.create(actor, input).await.extend()
    }

    async fn update_news(&self, ctx: &Context<'_>, id: ObjectId, input: UpdateNewsInput) -> Result<News> {
        let actor = ctx.require_user()?;
        ctx.services().news.update(actor, id, input).await.extend()
    }

    async fn delete_news(&self, ctx: &Context<'_>, id: ObjectId) -> Result<bool> {
        let actor = ctx.require_user()?;
        ctx.services().news.delete(actor, id).await.extend()
    }

    // Blog

    async fn create_blog_post(&self, ctx: &Context<'_>, input: CreateBlogPostInput) -> Result<BlogPost> {
        let actor = ctx.require_user()?;
        ctx.services().blog.create(actor, input).await.extend()
    }

    async fn update_blog_post(&self, ctx: &Context<'_>, id: ObjectId, input: UpdateBlogPostInput) -> Result<BlogPost> {
        let actor = ctx.require_user()?;
        ctx.services().blog.update(actor, id, input).await.extend()
    }

    async fn delete_blog_post(&self, ctx: &Context<'_>, id: ObjectId) -> Result<bool> {
        let actor = ctx.require_user()?;
        ctx.services().blog.delete(actor, id).await.extend()
    }

    async fn approve_blog_post(&self, ctx: &Context<'_>, id: ObjectId) -> Result<BlogPost> {
        let actor = ctx.require_user()?;
        ctx.services().blog.approve(actor, id).await.extend()
    }

    async fn like_blog_post(&self, ctx: &Context<'_>, id: ObjectId) -> Result<BlogPost> {
        let actor = ctx.require_user()?;
        ctx.services().blog.like(actor, id).await.extend()
    }

    async fn unlike_blog_post(&self, ctx: &Context<'_>, id: ObjectId) -> Result<BlogPost> {
        let actor = ctx.require_user()?;
        ctx.services().blog.unlike(actor, id).await.extend()
    }

    async fn add_comment(&self, ctx: &Context<'_>, post_id: ObjectId, content: String) -> Result<Comment> {
        let actor = ctx.require_user()?;
        ctx.services().blog.add_comment(actor, post_id, &content).await.extend()
    }

    async fn delete_comment(&self, ctx: &Context<'_>, id: ObjectId) -> Result<bool> {
        let actor = ctx.require_user()?;
        ctx.services().blog.delete_comment(actor, id).await.extend()
    }

    // Recipes

    async fn create_recipe(&self, ctx: &Context<'_>, input: CreateRecipeInput) -> Result<Recipe> {
        let actor = ctx.require_user()?;
        ctx.services().recipes.create(actor, input).await.extend()
    }

    async fn update_recipe(&self, ctx: &Context<'_>, id: ObjectId, input: UpdateRecipeInput) -> Result<Recipe> {
        let actor = ctx.require_user()?;
        ctx.services().recipes.update(actor, id, input).await.extend()
    }

    async fn delete_recipe(&self, ctx: &Context<'_>, id: ObjectId) -> Result<bool> {
        let actor = ctx.require_user()?;
        ctx.services().recipes.delete(actor, id).await.extend()
    }

    // Stories

    async fn create_story(&self, ctx: &Context<'_>, input: CreateStoryInput) -> Result<Story> {
        let actor = ctx.require_user()?;
        ctx.services().stories.create(actor, input).await.extend()
    }

    async fn approve_story(&self, ctx: &Context<'_>, id: ObjectId) -> Result<Story> {
        let actor = ctx.require_user()?;
        ctx.services().stories.approve(actor, id).await.extend()
    }

    async fn delete_story(&self, ctx: &Context<'_>, id: ObjectId) -> Result<bool> {
        let actor = ctx.require_user()?;
        ctx.services().stories.delete(actor, id).await.extend()
    }
}
