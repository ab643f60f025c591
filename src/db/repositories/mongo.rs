//! MongoDB-backed store

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Document};
use futures::TryStreamExt;
use mongodb::{
    error::{ErrorKind, WriteFailure},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Collection, Database,
};
use std::sync::Arc;

use super::{Entity, Store, StoreError, StoreResult};
use crate::db::query::{Filter, Query, SortOrder, Update};

/// Duplicate key error code reported by the server
const DUPLICATE_KEY: i32 = 11000;

/// Store over one MongoDB collection
pub struct MongoStore<T: Entity> {
    collection: Collection<T>,
}

impl<T: Entity> MongoStore<T> {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection::<T>(T::COLLECTION),
        }
    }

    pub fn boxed(db: &Database) -> Arc<dyn Store<T>> {
        Arc::new(Self::new(db))
    }

    fn map_error(err: mongodb::error::Error) -> StoreError {
        if is_duplicate_key(&err) {
            StoreError::Duplicate(T::COLLECTION)
        } else {
            StoreError::Database(err)
        }
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

#[async_trait]
impl<T: Entity> Store<T> for MongoStore<T> {
    async fn insert(&self, entity: &T) -> StoreResult<()> {
        self.collection
            .insert_one(entity, None)
            .await
            .map_err(Self::map_error)?;
        Ok(())
    }

    async fn get(&self, id: ObjectId) -> StoreResult<Option<T>> {
        self.find_one(Filter::id(id)).await
    }

    async fn find_one(&self, filter: Filter) -> StoreResult<Option<T>> {
        Ok(self
            .collection
            .find_one(filter.to_document(), None)
            .await?)
    }

    async fn find(&self, query: Query) -> StoreResult<Vec<T>> {
        let mut options = FindOptions::default();
        options.sort = query.sort.as_ref().map(|(field, order)| {
            let direction = match order {
                SortOrder::Ascending => 1,
                SortOrder::Descending => -1,
            };
            let mut sort = Document::new();
            sort.insert(field.clone(), direction);
            sort
        });
        if query.skip > 0 {
            options.skip = Some(query.skip);
        }
        options.limit = query.limit;

        let cursor = self
            .collection
            .find(query.filter.to_document(), options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn count(&self, filter: Filter) -> StoreResult<u64> {
        Ok(self
            .collection
            .count_documents(filter.to_document(), None)
            .await?)
    }

    async fn update_one(&self, filter: Filter, update: Update) -> StoreResult<Option<T>> {
        if update.is_empty() {
            return self.find_one(filter).await;
        }

        let mut options = FindOneAndUpdateOptions::default();
        options.return_document = Some(ReturnDocument::After);

        self.collection
            .find_one_and_update(filter.to_document(), update.to_document(), options)
            .await
            .map_err(Self::map_error)
    }

    async fn replace(&self, entity: &T) -> StoreResult<bool> {
        let result = self
            .collection
            .replace_one(doc! { "_id": entity.id() }, entity, None)
            .await
            .map_err(Self::map_error)?;
        Ok(result.matched_count > 0)
    }

    async fn delete_one(&self, filter: Filter) -> StoreResult<bool> {
        let result = self
            .collection
            .delete_one(filter.to_document(), None)
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn delete_many(&self, filter: Filter) -> StoreResult<u64> {
        let result = self
            .collection
            .delete_many(filter.to_document(), None)
            .await?;
        Ok(result.deleted_count)
    }
}
