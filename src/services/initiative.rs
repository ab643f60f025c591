//! Initiative service
//!
//! Trusted members organise initiatives; any signed-in user can join one
//! until it is full or over.

use bson::oid::ObjectId;
use bson::Bson;
use chrono::Utc;
use std::sync::Arc;

use super::error::{OrNotFound, ServiceError, ServiceResult};
use super::hashtag::{extract_from, HashtagService};
use super::validation;
use crate::db::{Filter, Page, Query, Repositories, Update};
use crate::models::{CreateInitiativeInput, HashtagCategory, Initiative, UpdateInitiativeInput, User};

/// Filters for initiative listings
#[derive(Debug, Clone, Default)]
pub struct InitiativeFilter {
    pub category: Option<String>,
    pub hashtag: Option<String>,
    /// Started and not yet ended
    pub active_only: bool,
}

pub struct InitiativeService {
    repos: Repositories,
    hashtags: Arc<HashtagService>,
}

fn check_capacity(max: Option<i32>) -> ServiceResult<()> {
    match max {
        Some(max) if max < 1 => Err(ServiceError::validation("Maximum participants must be at least 1")),
        _ => Ok(()),
    }
}

impl InitiativeService {
    pub fn new(repos: Repositories, hashtags: Arc<HashtagService>) -> Self {
        Self { repos, hashtags }
    }

    pub async fn get(&self, id: ObjectId) -> ServiceResult<Option<Initiative>> {
        Ok(self.repos.initiatives.get(id).await?)
    }

    pub async fn list(&self, filter: InitiativeFilter, page: Page) -> ServiceResult<Vec<Initiative>> {
        let mut query = Filter::all()
            .eq_opt("category", filter.category)
            .eq_opt("hashtags", filter.hashtag.map(|h| h.trim_start_matches('#').to_lowercase()));
        if filter.active_only {
            let now = Utc::now();
            query = query.lte("start_date", now);
        }
        let mut initiatives = self
            .repos
            .initiatives
            .find(Query::new(query).newest_first().page(page))
            .await?;
        if filter.active_only {
            let now = Utc::now();
            initiatives.retain(|i| i.is_active_at(now));
        }
        Ok(initiatives)
    }

    pub async fn create(&self, actor: &User, input: CreateInitiativeInput) -> ServiceResult<Initiative> {
        validation::ensure_trusted(actor)?;
        let title = validation::title(&input.title)?;
        let description = validation::required("Description", &input.description)?;
        let category = validation::required("Category", &input.category)?;
        let location = validation::required("Location", &input.location)?;
        check_capacity(input.max_participants)?;
        if input.end_date.is_some_and(|end| end <= input.start_date) {
            return Err(ServiceError::validation("End date must be after the start date"));
        }

        let now = Utc::now();
        let initiative = Initiative {
            id: ObjectId::new(),
            hashtags: extract_from(&[&title, &description]),
            title,
            description,
            category,
            location,
            start_date: input.start_date,
            end_date: input.end_date,
            max_participants: input.max_participants,
            participants: Vec::new(),
            image: input.image,
            created_by: actor.id,
            created_at: now,
            updated_at: now,
        };
        self.repos.initiatives.insert(&initiative).await?;
        self.hashtags
            .track(&initiative.hashtags, HashtagCategory::Initiative)
            .await?;
        tracing::info!(initiative_id = %initiative.id, "Initiative created");
        Ok(initiative)
    }

    pub async fn update(&self, actor: &User, id: ObjectId, input: UpdateInitiativeInput) -> ServiceResult<Initiative> {
        let existing = self.repos.initiatives.get(id).await?.or_not_found("Initiative")?;
        validation::ensure_can_manage(actor, existing.created_by)?;

        let title = input.title.as_deref().map(validation::title).transpose()?;
        let description = input
            .description
            .as_deref()
            .map(|d| validation::required("Description", d))
            .transpose()?;
        check_capacity(input.max_participants)?;
        let start = input.start_date.unwrap_or(existing.start_date);
        let end = input.end_date.or(existing.end_date);
        if end.is_some_and(|end| end <= start) {
            return Err(ServiceError::validation("End date must be after the start date"));
        }

        let hashtags = extract_from(&[
            title.as_deref().unwrap_or(&existing.title),
            description.as_deref().unwrap_or(&existing.description),
        ]);
        let mut update = Update::new()
            .set("start_date", start)
            .set("hashtags", hashtags.clone())
            .set("updated_at", Utc::now());
        if let Some(end) = end {
            update = update.set("end_date", end);
        }
        if let Some(title) = title {
            update = update.set("title", title);
        }
        if let Some(description) = description {
            update = update.set("description", description);
        }
        if let Some(category) = input.category {
            update = update.set("category", validation::required("Category", &category)?);
        }
        if let Some(location) = input.location {
            update = update.set("location", validation::required("Location", &location)?);
        }
        if let Some(max) = input.max_participants {
            update = update.set("max_participants", max);
        }
        if let Some(image) = input.image {
            update = update.set("image", image);
        }

        let updated = self
            .repos
            .initiatives
            .update_one(Filter::id(id), update)
            .await?
            .or_not_found("Initiative")?;
        self.hashtags
            .sync(&existing.hashtags, &hashtags, HashtagCategory::Initiative)
            .await?;
        Ok(updated)
    }

    pub async fn delete(&self, actor: &User, id: ObjectId) -> ServiceResult<bool> {
        let existing = self.repos.initiatives.get(id).await?.or_not_found("Initiative")?;
        validation::ensure_can_manage(actor, existing.created_by)?;
        self.repos.initiatives.delete(id).await?;
        self.hashtags
            .untrack(&existing.hashtags, HashtagCategory::Initiative)
            .await?;
        Ok(true)
    }

    /// Join an initiative; joining twice is a no-op
    pub async fn join(&self, actor: &User, id: ObjectId) -> ServiceResult<Initiative> {
        let initiative = self.repos.initiatives.get(id).await?.or_not_found("Initiative")?;
        if initiative.participants.contains(&actor.id) {
            return Ok(initiative);
        }
        if initiative.has_ended_at(Utc::now()) {
            return Err(ServiceError::validation("This initiative has ended"));
        }

        if initiative.is_full() {
            return Err(ServiceError::validation("This initiative is full"));
        }

        // Capped initiatives only accept the join if nobody else joined meanwhile
        let filter = match initiative.max_participants {
            Some(_) => Filter::id(id).eq(
                "participants",
                initiative
                    .participants
                    .iter()
                    .map(|p| Bson::ObjectId(*p))
                    .collect::<Vec<_>>(),
            ),
            None => Filter::id(id),
        };

        self.repos
            .initiatives
            .update_one(filter, Update::new().add_to_set("participants", actor.id))
            .await?
            .ok_or_else(|| ServiceError::Conflict("Initiative changed, try again".to_string()))
    }

    pub async fn leave(&self, actor: &User, id: ObjectId) -> ServiceResult<Initiative> {
        self.repos
            .initiatives
            .update_one(Filter::id(id), Update::new().pull("participants", actor.id))
            .await?
            .or_not_found("Initiative")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::TestEnv;
    use chrono::Duration;

    fn input(max: Option<i32>) -> CreateInitiativeInput {
        CreateInitiativeInput {
            title: "Beach cleanup".into(),
            description: "Bring gloves #ocean".into(),
            category: "environment".into(),
            location: "North beach".into(),
            start_date: Utc::now() - Duration::hours(1),
            end_date: Some(Utc::now() + Duration::days(2)),
            max_participants: max,
            image: None,
        }
    }

    #[tokio::test]
    async fn test_only_trusted_members_create() {
        let env = TestEnv::new();
        let bob = env.user("bob").await;
        let carol = env.member("carol").await;

        assert_eq!(
            env.services.initiatives.create(&bob, input(None)).await.unwrap_err().code(),
            "FORBIDDEN"
        );
        assert!(env.services.initiatives.create(&carol, input(Some(0))).await.is_err());

        let initiative = env.services.initiatives.create(&carol, input(None)).await.unwrap();
        assert_eq!(initiative.hashtags, vec!["ocean"]);

        // Only the creator or an admin may edit
        assert_eq!(
            env.services
                .initiatives
                .update(&bob, initiative.id, UpdateInitiativeInput::default())
                .await
                .unwrap_err()
                .code(),
            "FORBIDDEN"
        );
        let admin = env.admin().await;
        let updated = env
            .services
            .initiatives
            .update(
                &admin,
                initiative.id,
                UpdateInitiativeInput {
                    location: Some("South beach".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.location, "South beach");
    }

    #[tokio::test]
    async fn test_join_respects_capacity() {
        let env = TestEnv::new();
        let carol = env.member("carol").await;
        let bob = env.user("bob").await;
        let dan = env.user("dan").await;
        let initiative = env.services.initiatives.create(&carol, input(Some(1))).await.unwrap();

        let joined = env.services.initiatives.join(&bob, initiative.id).await.unwrap();
        assert_eq!(joined.participant_count(), 1);
        let again = env.services.initiatives.join(&bob, initiative.id).await.unwrap();
        assert_eq!(again.participant_count(), 1);

        let err = env.services.initiatives.join(&dan, initiative.id).await.unwrap_err();
        assert!(err.to_string().contains("full"));

        let left = env.services.initiatives.leave(&bob, initiative.id).await.unwrap();
        assert_eq!(left.participant_count(), 0);
        assert!(env.services.initiatives.join(&dan, initiative.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_cannot_join_ended() {
        let env = TestEnv::new();
        let carol = env.member("carol").await;
        let bob = env.user("bob").await;
        let mut past = input(None);
        past.start_date = Utc::now() - Duration::days(3);
        past.end_date = Some(Utc::now() - Duration::days(1));
        let initiative = env.services.initiatives.create(&carol, past).await.unwrap();

        assert!(env.services.initiatives.join(&bob, initiative.id).await.is_err());
        let active = env
            .services
            .initiatives
            .list(
                InitiativeFilter {
                    active_only: true,
                    ..Default::default()
                },
                Page::default(),
            )
            .await
            .unwrap();
        assert!(active.is_empty());
    }
}
