//! Hashtag extraction and usage counting
//!
//! Tags are extracted from content text and counted per category. Creating
//! content tracks its tags (+1), updating re-syncs them and deleting
//! releases them (-1). A tag whose count reaches zero is removed.

use bson::oid::ObjectId;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use super::error::ServiceResult;
use crate::cache::{Cache, CacheLayer};
use crate::db::{Filter, Query, SortOrder, Store, StoreError, Update};
use crate::models::{Hashtag, HashtagCategory};

/// Longest accepted tag, without the `#`
pub const MAX_HASHTAG_LENGTH: usize = 50;

const TRENDING_TTL: Duration = Duration::from_secs(60);

/// `#` not preceded by a word character or `&` (HTML entities like `&#39;`)
static HASHTAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^\p{L}\p{N}_&])#([\p{L}\p{N}_]+)").expect("valid hashtag regex"));

/// Extract lowercase hashtags in first-seen order without duplicates
pub fn extract_hashtags(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    HASHTAG_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
        .filter(|tag| tag.chars().count() <= MAX_HASHTAG_LENGTH)
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}

/// Extract from several text fields at once
pub fn extract_from(parts: &[&str]) -> Vec<String> {
    extract_hashtags(&parts.join("\n"))
}

pub struct HashtagService {
    repo: Arc<dyn Store<Hashtag>>,
    cache: Arc<Cache>,
}

impl HashtagService {
    pub fn new(repo: Arc<dyn Store<Hashtag>>, cache: Arc<Cache>) -> Self {
        Self { repo, cache }
    }

    fn key(name: &str, category: HashtagCategory) -> Filter {
        Filter::all().eq("name", name).eq("category", category.as_str())
    }

    /// Count one use of each tag
    pub async fn track(&self, tags: &[String], category: HashtagCategory) -> ServiceResult<()> {
        for tag in tags {
            self.increment(tag, category).await?;
        }
        if !tags.is_empty() {
            self.invalidate().await;
        }
        Ok(())
    }

    /// Release one use of each tag
    pub async fn untrack(&self, tags: &[String], category: HashtagCategory) -> ServiceResult<()> {
        for tag in tags {
            let updated = self
                .repo
                .update_one(Self::key(tag, category), Update::new().inc("count", -1i64))
                .await?;
            if updated.is_some_and(|h| h.count <= 0) {
                self.repo
                    .delete_one(Self::key(tag, category).lte("count", 0i64))
                    .await?;
            }
        }
        if !tags.is_empty() {
            self.invalidate().await;
        }
        Ok(())
    }

    /// Apply the difference between an old and a new tag list
    pub async fn sync(&self, old: &[String], new: &[String], category: HashtagCategory) -> ServiceResult<()> {
        let removed: Vec<String> = old.iter().filter(|t| !new.contains(t)).cloned().collect();
        let added: Vec<String> = new.iter().filter(|t| !old.contains(t)).cloned().collect();
        self.untrack(&removed, category).await?;
        self.track(&added, category).await
    }

    async fn increment(&self, name: &str, category: HashtagCategory) -> ServiceResult<()> {
        let bump = || {
            Update::new()
                .inc("count", 1i64)
                .set("last_used_at", Utc::now())
        };

        if self.repo.update_one(Self::key(name, category), bump()).await?.is_some() {
            return Ok(());
        }

        let hashtag = Hashtag {
            id: ObjectId::new(),
            name: name.to_string(),
            category,
            count: 1,
            last_used_at: Utc::now(),
        };
        match self.repo.insert(&hashtag).await {
            Ok(()) => Ok(()),
            // Created concurrently; count on the existing record
            Err(StoreError::Duplicate(_)) => {
                self.repo.update_one(Self::key(name, category), bump()).await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn invalidate(&self) {
        if let Err(e) = self.cache.delete_pattern("hashtags:*").await {
            tracing::warn!(error = %e, "Failed to invalidate hashtag cache");
        }
    }

    /// Most used tags, optionally within one category
    pub async fn trending(&self, category: Option<HashtagCategory>, limit: i64) -> ServiceResult<Vec<Hashtag>> {
        let limit = limit.clamp(1, 100);
        let cache_key = format!(
            "hashtags:trending:{}:{}",
            category.map(|c| c.as_str()).unwrap_or("all"),
            limit
        );
        if let Ok(Some(cached)) = self.cache.get::<Vec<Hashtag>>(&cache_key).await {
            return Ok(cached);
        }

        let filter = Filter::all().eq_opt("category", category.map(|c| c.as_str()));
        let tags = self
            .repo
            .find(Query::new(filter).sort("count", SortOrder::Descending).limit(limit))
            .await?;

        if let Err(e) = self.cache.set(&cache_key, &tags, TRENDING_TTL).await {
            tracing::warn!(error = %e, "Failed to cache trending hashtags");
        }
        Ok(tags)
    }

    /// Tags starting with a prefix (case-insensitive, `#` optional)
    pub async fn search(&self, prefix: &str, limit: i64) -> ServiceResult<Vec<Hashtag>> {
        let prefix = prefix.trim().trim_start_matches('#').to_lowercase();
        if prefix.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .repo
            .find(
                Query::new(Filter::all().prefix("name", &prefix))
                    .sort("count", SortOrder::Descending)
                    .limit(limit.clamp(1, 100)),
            )
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::MemoryStore;

    fn service() -> HashtagService {
        HashtagService::new(MemoryStore::boxed(), Arc::new(Cache::new()))
    }

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extract_basic() {
        assert_eq!(
            extract_hashtags("Join us #CleanWater and #food_drive! #cleanwater"),
            tags(&["cleanwater", "food_drive"])
        );
    }

    #[test]
    fn test_extract_ignores_entities_and_inner_hashes() {
        assert!(extract_hashtags("it&#39;s fine").is_empty());
        assert!(extract_hashtags("issue#42 and a#b").is_empty());
        assert_eq!(extract_hashtags("#start"), tags(&["start"]));
        assert_eq!(extract_hashtags("(#paren)"), tags(&["paren"]));
    }

    #[test]
    fn test_extract_unicode_and_length() {
        assert_eq!(extract_hashtags("#Café #日本"), tags(&["café", "日本"]));
        let long = format!("#{}", "a".repeat(51));
        assert!(extract_hashtags(&long).is_empty());
        let max = format!("#{}", "a".repeat(50));
        assert_eq!(extract_hashtags(&max).len(), 1);
    }

    #[tokio::test]
    async fn test_track_untrack_and_removal() {
        let svc = service();
        svc.track(&tags(&["water", "food"]), HashtagCategory::Blog).await.unwrap();
        svc.track(&tags(&["water"]), HashtagCategory::Blog).await.unwrap();
        svc.track(&tags(&["water"]), HashtagCategory::Campaign).await.unwrap();

        let trending = svc.trending(Some(HashtagCategory::Blog), 10).await.unwrap();
        assert_eq!(trending[0].name, "water");
        assert_eq!(trending[0].count, 2);
        assert_eq!(trending.len(), 2);

        svc.untrack(&tags(&["food"]), HashtagCategory::Blog).await.unwrap();
        let trending = svc.trending(Some(HashtagCategory::Blog), 10).await.unwrap();
        assert_eq!(trending.len(), 1);

        let campaign = svc.trending(Some(HashtagCategory::Campaign), 10).await.unwrap();
        assert_eq!(campaign[0].count, 1);
    }

    #[tokio::test]
    async fn test_sync_applies_difference() {
        let svc = service();
        svc.track(&tags(&["a", "b"]), HashtagCategory::Event).await.unwrap();
        svc.sync(&tags(&["a", "b"]), &tags(&["b", "c"]), HashtagCategory::Event)
            .await
            .unwrap();

        let mut names: Vec<String> = svc
            .trending(None, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.name)
            .collect();
        names.sort();
        assert_eq!(names, tags(&["b", "c"]));
    }

    #[tokio::test]
    async fn test_search_by_prefix() {
        let svc = service();
        svc.track(&tags(&["water", "walk", "food"]), HashtagCategory::News).await.unwrap();

        let found = svc.search("#WA", 10).await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(svc.search("  ", 10).await.unwrap().is_empty());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn extracted_tags_are_normalized(text in "[a-zA-Z0-9_ #&.,!]{0,200}") {
                let found = extract_hashtags(&text);
                let unique: HashSet<_> = found.iter().collect();
                prop_assert_eq!(unique.len(), found.len());
                for tag in &found {
                    prop_assert!(!tag.is_empty());
                    prop_assert!(tag.chars().count() <= MAX_HASHTAG_LENGTH);
                    prop_assert_eq!(tag.clone(), tag.to_lowercase());
                    prop_assert!(tag.chars().all(|c| c.is_alphanumeric() || c == '_'));
                }
            }

            #[test]
            fn standalone_words_are_found(words in prop::collection::vec("[a-z][a-z0-9_]{0,20}", 1..6)) {
                let text = words.iter().map(|w| format!("#{}", w)).collect::<Vec<_>>().join(" ");
                let found = extract_hashtags(&text);
                for word in &words {
                    prop_assert!(found.contains(word));
                }
            }
        }
    }
}
