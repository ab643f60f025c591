//! In-memory store
//!
//! Keeps documents as BSON in a process-local vector and evaluates the same
//! filters, updates and unique indexes the MongoDB backend relies on. Used by
//! the test-suite and by `database.driver: memory`.

use async_trait::async_trait;
use bson::{oid::ObjectId, Bson, Document};
use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{Entity, Store, StoreError, StoreResult};
use crate::db::query::{compare_bson, Filter, Query, SortOrder, Update};

/// Store over a process-local document list
pub struct MemoryStore<T: Entity> {
    documents: RwLock<Vec<Document>>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(Vec::new()),
            _entity: PhantomData,
        }
    }

    pub fn boxed() -> Arc<dyn Store<T>> {
        Arc::new(Self::new())
    }

    fn to_document(entity: &T) -> StoreResult<Document> {
        bson::to_document(entity).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn from_document(document: &Document) -> StoreResult<T> {
        bson::from_document(document.clone()).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Check `_id` and unique indexes against every document except `skip`
    fn check_unique(documents: &[Document], candidate: &Document, skip: Option<usize>) -> StoreResult<()> {
        for (index, existing) in documents.iter().enumerate() {
            if Some(index) == skip {
                continue;
            }
            if existing.get("_id") == candidate.get("_id") {
                return Err(StoreError::Duplicate(T::COLLECTION));
            }
            for spec in T::indexes().iter().filter(|s| s.unique) {
                let same = spec
                    .fields
                    .iter()
                    .all(|field| existing.get(*field) == candidate.get(*field));
                if same {
                    return Err(StoreError::Duplicate(T::COLLECTION));
                }
            }
        }
        Ok(())
    }
}

impl<T: Entity> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn sort_key_cmp(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => compare_bson(x, y).unwrap_or(Ordering::Equal),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[async_trait]
impl<T: Entity> Store<T> for MemoryStore<T> {
    async fn insert(&self, entity: &T) -> StoreResult<()> {
        let document = Self::to_document(entity)?;
        let mut documents = self.documents.write().await;
        Self::check_unique(&documents, &document, None)?;
        documents.push(document);
        Ok(())
    }

    async fn get(&self, id: ObjectId) -> StoreResult<Option<T>> {
        self.find_one(Filter::id(id)).await
    }

    async fn find_one(&self, filter: Filter) -> StoreResult<Option<T>> {
        let documents = self.documents.read().await;
        documents
            .iter()
            .find(|d| filter.matches(d))
            .map(Self::from_document)
            .transpose()
    }

    async fn find(&self, query: Query) -> StoreResult<Vec<T>> {
        let documents = self.documents.read().await;
        let mut matched: Vec<&Document> = documents
            .iter()
            .filter(|d| query.filter.matches(d))
            .collect();

        if let Some((field, order)) = &query.sort {
            matched.sort_by(|a, b| {
                let ordering = sort_key_cmp(a.get(field), b.get(field));
                match order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            });
        }

        let limit = query
            .limit
            .filter(|l| *l > 0)
            .map(|l| l as usize)
            .unwrap_or(usize::MAX);

        matched
            .into_iter()
            .skip(query.skip as usize)
            .take(limit)
            .map(Self::from_document)
            .collect()
    }

    async fn count(&self, filter: Filter) -> StoreResult<u64> {
        let documents = self.documents.read().await;
        Ok(documents.iter().filter(|d| filter.matches(d)).count() as u64)
    }

    async fn update_one(&self, filter: Filter, update: Update) -> StoreResult<Option<T>> {
        let mut documents = self.documents.write().await;
        let Some(position) = documents.iter().position(|d| filter.matches(d)) else {
            return Ok(None);
        };

        let mut updated = documents[position].clone();
        update.apply(&mut updated);
        // Validate before committing so a failed update leaves the document untouched.
        let entity = Self::from_document(&updated)?;
        Self::check_unique(&documents, &updated, Some(position))?;
        documents[position] = updated;
        Ok(Some(entity))
    }

    async fn replace(&self, entity: &T) -> StoreResult<bool> {
        let document = Self::to_document(entity)?;
        let mut documents = self.documents.write().await;
        let Some(position) = documents
            .iter()
            .position(|d| d.get("_id") == document.get("_id"))
        else {
            return Ok(false);
        };
        Self::check_unique(&documents, &document, Some(position))?;
        documents[position] = document;
        Ok(true)
    }

    async fn delete_one(&self, filter: Filter) -> StoreResult<bool> {
        let mut documents = self.documents.write().await;
        match documents.iter().position(|d| filter.matches(d)) {
            Some(position) => {
                documents.remove(position);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_many(&self, filter: Filter) -> StoreResult<u64> {
        let mut documents = self.documents.write().await;
        let before = documents.len();
        documents.retain(|d| !filter.matches(d));
        Ok((before - documents.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::IndexSpec;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        #[serde(rename = "_id")]
        id: ObjectId,
        slug: String,
        rank: i64,
        tags: Vec<String>,
    }

    impl Entity for Note {
        const COLLECTION: &'static str = "notes";

        fn id(&self) -> ObjectId {
            self.id
        }

        fn indexes() -> &'static [IndexSpec] {
            &[IndexSpec {
                fields: &["slug"],
                unique: true,
            }]
        }
    }

    fn note(slug: &str, rank: i64) -> Note {
        Note {
            id: ObjectId::new(),
            slug: slug.to_string(),
            rank,
            tags: vec!["general".to_string()],
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = MemoryStore::<Note>::new();
        let n = note("a", 1);
        store.insert(&n).await.unwrap();

        assert_eq!(store.get(n.id).await.unwrap(), Some(n));
        assert_eq!(store.get(ObjectId::new()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unique_index_rejects_duplicate() {
        let store = MemoryStore::<Note>::new();
        store.insert(&note("a", 1)).await.unwrap();

        let err = store.insert(&note("a", 2)).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate("notes")));
    }

    #[tokio::test]
    async fn test_find_sorts_and_paginates() {
        let store = MemoryStore::<Note>::new();
        for (slug, rank) in [("a", 3), ("b", 1), ("c", 2), ("d", 5)] {
            store.insert(&note(slug, rank)).await.unwrap();
        }

        let found = store
            .find(
                Query::new(Filter::all().gte("rank", 2i64))
                    .sort("rank", SortOrder::Descending)
                    .limit(2),
            )
            .await
            .unwrap();
        let slugs: Vec<_> = found.iter().map(|n| n.slug.as_str()).collect();
        assert_eq!(slugs, vec!["d", "a"]);
    }

    #[tokio::test]
    async fn test_guarded_update() {
        let store = MemoryStore::<Note>::new();
        let n = note("a", 1);
        store.insert(&n).await.unwrap();

        let first = store
            .update_one(
                Filter::id(n.id).ne("rank", 10i64),
                Update::new().set("rank", 10i64),
            )
            .await
            .unwrap();
        assert_eq!(first.map(|n| n.rank), Some(10));

        let second = store
            .update_one(
                Filter::id(n.id).ne("rank", 10i64),
                Update::new().set("rank", 10i64),
            )
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_update_cannot_break_unique_index() {
        let store = MemoryStore::<Note>::new();
        let a = note("a", 1);
        store.insert(&a).await.unwrap();
        store.insert(&note("b", 1)).await.unwrap();

        let err = store
            .update_one(Filter::id(a.id), Update::new().set("slug", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        assert_eq!(store.get(a.id).await.unwrap().unwrap().slug, "a");
    }

    #[tokio::test]
    async fn test_delete_many_and_count() {
        let store = MemoryStore::<Note>::new();
        store.insert(&note("a", 1)).await.unwrap();
        store.insert(&note("b", 1)).await.unwrap();
        store.insert(&note("c", 2)).await.unwrap();

        assert_eq!(store.count(Filter::all().eq("tags", "general")).await.unwrap(), 3);
        assert_eq!(store.delete_many(Filter::all().eq("rank", 1i64)).await.unwrap(), 2);
        assert_eq!(store.count(Filter::all()).await.unwrap(), 1);
    }
}
