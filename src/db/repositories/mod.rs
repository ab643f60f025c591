//! Document repositories
//!
//! Every entity lives in its own collection and is accessed through the
//! [`Store`] trait. Two backends implement it:
//! - [`MongoStore`] for MongoDB
//! - [`MemoryStore`] for tests and database-less development runs
//!
//! [`Repositories`] bundles one store per entity.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use bson::oid::ObjectId;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

use crate::db::query::{Filter, Query, Update};
use crate::models::{
    BlogPost, Campaign, ChatMessage, Comment, Conference, Donation, Donor, Event, Hashtag,
    Initiative, News, Payment, Recipe, StoreItem, Story, User,
};

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Index declared by an entity; the fields form one compound key.
#[derive(Debug, Clone, Copy)]
pub struct IndexSpec {
    pub fields: &'static [&'static str],
    pub unique: bool,
}

/// A document type stored in its own collection
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + Unpin + 'static {
    /// Collection name
    const COLLECTION: &'static str;

    /// Document id (`_id`)
    fn id(&self) -> ObjectId;

    /// Secondary indexes
    fn indexes() -> &'static [IndexSpec] {
        &[]
    }
}

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique index rejected the write
    #[error("Duplicate key in collection '{0}'")]
    Duplicate(&'static str),

    #[error("Document serialization failed: {0}")]
    Serialization(String),

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Typed access to one collection
#[async_trait]
pub trait Store<T: Entity>: Send + Sync {
    /// Insert a new document; fails with `Duplicate` on unique index conflicts
    async fn insert(&self, entity: &T) -> StoreResult<()>;

    /// Get a document by id
    async fn get(&self, id: ObjectId) -> StoreResult<Option<T>>;

    /// First document matching the filter
    async fn find_one(&self, filter: Filter) -> StoreResult<Option<T>>;

    /// All documents matching the query
    async fn find(&self, query: Query) -> StoreResult<Vec<T>>;

    /// Number of matching documents
    async fn count(&self, filter: Filter) -> StoreResult<u64>;

    /// Atomically update the first matching document and return it after the update.
    ///
    /// Returns `None` when nothing matched, which lets callers use the filter as
    /// a guard (e.g. "only if status is not yet succeeded").
    async fn update_one(&self, filter: Filter, update: Update) -> StoreResult<Option<T>>;

    /// Replace a whole document by id; returns whether it existed
    async fn replace(&self, entity: &T) -> StoreResult<bool>;

    /// Delete the first matching document
    async fn delete_one(&self, filter: Filter) -> StoreResult<bool>;

    /// Delete every matching document
    async fn delete_many(&self, filter: Filter) -> StoreResult<u64>;

    /// Batch lookup by ids
    async fn get_many(&self, ids: &[ObjectId]) -> StoreResult<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.find(Query::new(Filter::all().is_in("_id", ids.iter().copied())))
            .await
    }

    /// Delete by id
    async fn delete(&self, id: ObjectId) -> StoreResult<bool> {
        self.delete_one(Filter::id(id)).await
    }
}

/// One store per entity
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn Store<User>>,
    pub campaigns: Arc<dyn Store<Campaign>>,
    pub initiatives: Arc<dyn Store<Initiative>>,
    pub conferences: Arc<dyn Store<Conference>>,
    pub events: Arc<dyn Store<Event>>,
    pub store_items: Arc<dyn Store<StoreItem>>,
    pub donors: Arc<dyn Store<Donor>>,
    pub donations: Arc<dyn Store<Donation>>,
    pub payments: Arc<dyn Store<Payment>>,
    pub news: Arc<dyn Store<News>>,
    pub blog_posts: Arc<dyn Store<BlogPost>>,
    pub comments: Arc<dyn Store<Comment>>,
    pub recipes: Arc<dyn Store<Recipe>>,
    pub stories: Arc<dyn Store<Story>>,
    pub hashtags: Arc<dyn Store<Hashtag>>,
    pub chat_messages: Arc<dyn Store<ChatMessage>>,
}

impl Repositories {
    /// Stores backed by a MongoDB database
    pub fn mongo(db: &mongodb::Database) -> Self {
        Self {
            users: MongoStore::boxed(db),
            campaigns: MongoStore::boxed(db),
            initiatives: MongoStore::boxed(db),
            conferences: MongoStore::boxed(db),
            events: MongoStore::boxed(db),
            store_items: MongoStore::boxed(db),
            donors: MongoStore::boxed(db),
            donations: MongoStore::boxed(db),
            payments: MongoStore::boxed(db),
            news: MongoStore::boxed(db),
            blog_posts: MongoStore::boxed(db),
            comments: MongoStore::boxed(db),
            recipes: MongoStore::boxed(db),
            stories: MongoStore::boxed(db),
            hashtags: MongoStore::boxed(db),
            chat_messages: MongoStore::boxed(db),
        }
    }

    /// Process-local stores
    pub fn in_memory() -> Self {
        Self {
            users: MemoryStore::boxed(),
            campaigns: MemoryStore::boxed(),
            initiatives: MemoryStore::boxed(),
            conferences: MemoryStore::boxed(),
            events: MemoryStore::boxed(),
            store_items: MemoryStore::boxed(),
            donors: MemoryStore::boxed(),
            donations: MemoryStore::boxed(),
            payments: MemoryStore::boxed(),
            news: MemoryStore::boxed(),
            blog_posts: MemoryStore::boxed(),
            comments: MemoryStore::boxed(),
            recipes: MemoryStore::boxed(),
            stories: MemoryStore::boxed(),
            hashtags: MemoryStore::boxed(),
            chat_messages: MemoryStore::boxed(),
        }
    }
}
