//! Conference service

use bson::oid::ObjectId;
use bson::Bson;
use chrono::Utc;
use std::sync::Arc;

use super::email::EmailService;
use super::error::{OrNotFound, ServiceError, ServiceResult};
use super::hashtag::{extract_from, HashtagService};
use super::validation;
use crate::db::{Filter, Page, Query, Repositories, SortOrder, Update};
use crate::models::{Conference, CreateConferenceInput, HashtagCategory, UpdateConferenceInput, User};

pub struct ConferenceService {
    repos: Repositories,
    hashtags: Arc<HashtagService>,
    email: Arc<EmailService>,
}

fn clean_speakers(speakers: Vec<String>) -> Vec<String> {
    speakers
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl ConferenceService {
    pub fn new(repos: Repositories, hashtags: Arc<HashtagService>, email: Arc<EmailService>) -> Self {
        Self { repos, hashtags, email }
    }

    pub async fn get(&self, id: ObjectId) -> ServiceResult<Option<Conference>> {
        Ok(self.repos.conferences.get(id).await?)
    }

    /// Soonest first
    pub async fn list(&self, upcoming_only: bool, page: Page) -> ServiceResult<Vec<Conference>> {
        let mut filter = Filter::all();
        if upcoming_only {
            filter = filter.gte("start_date", Utc::now());
        }
        Ok(self
            .repos
            .conferences
            .find(
                Query::new(filter)
                    .sort("start_date", SortOrder::Ascending)
                    .page(page),
            )
            .await?)
    }

    pub async fn create(&self, actor: &User, input: CreateConferenceInput) -> ServiceResult<Conference> {
        validation::ensure_admin(actor)?;
        let title = validation::title(&input.title)?;
        let description = validation::required("Description", &input.description)?;
        let location = validation::required("Location", &input.location)?;
        if input.end_date < input.start_date {
            return Err(ServiceError::validation("End date must not be before the start date"));
        }
        if input.capacity.is_some_and(|c| c < 1) {
            return Err(ServiceError::validation("Capacity must be at least 1"));
        }

        let now = Utc::now();
        let conference = Conference {
            id: ObjectId::new(),
            hashtags: extract_from(&[&title, &description]),
            title,
            description,
            location,
            start_date: input.start_date,
            end_date: input.end_date,
            speakers: clean_speakers(input.speakers),
            capacity: input.capacity,
            attendees: Vec::new(),
            image: input.image,
            created_by: actor.id,
            created_at: now,
            updated_at: now,
        };
        self.repos.conferences.insert(&conference).await?;
        self.hashtags
            .track(&conference.hashtags, HashtagCategory::Conference)
            .await?;
        tracing::info!(conference_id = %conference.id, "Conference created");
        Ok(conference)
    }

    pub async fn update(&self, actor: &User, id: ObjectId, input: UpdateConferenceInput) -> ServiceResult<Conference> {
        validation::ensure_admin(actor)?;
        let existing = self.repos.conferences.get(id).await?.or_not_found("Conference")?;

        let title = input.title.as_deref().map(validation::title).transpose()?;
        let description = input
            .description
            .as_deref()
            .map(|d| validation::required("Description", d))
            .transpose()?;
        let start = input.start_date.unwrap_or(existing.start_date);
        let end = input.end_date.unwrap_or(existing.end_date);
        if end < start {
            return Err(ServiceError::validation("End date must not be before the start date"));
        }
        if input.capacity.is_some_and(|c| c < 1) {
            return Err(ServiceError::validation("Capacity must be at least 1"));
        }

        let hashtags = extract_from(&[
            title.as_deref().unwrap_or(&existing.title),
            description.as_deref().unwrap_or(&existing.description),
        ]);
        let mut update = Update::new()
            .set("start_date", start)
            .set("end_date", end)
            .set("hashtags", hashtags.clone())
            .set("updated_at", Utc::now());
        if let Some(title) = title {
            update = update.set("title", title);
        }
        if let Some(description) = description {
            update = update.set("description", description);
        }
        if let Some(location) = input.location {
            update = update.set("location", validation::required("Location", &location)?);
        }
        if let Some(speakers) = input.speakers {
            update = update.set("speakers", clean_speakers(speakers));
        }
        if let Some(capacity) = input.capacity {
            update = update.set("capacity", capacity);
        }
        if let Some(image) = input.image {
            update = update.set("image", image);
        }

        let updated = self
            .repos
            .conferences
            .update_one(Filter::id(id), update)
            .await?
            .or_not_found("Conference")?;
        self.hashtags
            .sync(&existing.hashtags, &hashtags, HashtagCategory::Conference)
            .await?;
        Ok(updated)
    }

    pub async fn delete(&self, actor: &User, id: ObjectId) -> ServiceResult<bool> {
        validation::ensure_admin(actor)?;
        let existing = self.repos.conferences.get(id).await?.or_not_found("Conference")?;
        self.repos.conferences.delete(id).await?;
        self.hashtags
            .untrack(&existing.hashtags, HashtagCategory::Conference)
            .await?;
        Ok(true)
    }

    /// Reserve a seat and email a confirmation
    pub async fn register(&self, actor: &User, id: ObjectId) -> ServiceResult<Conference> {
        let conference = self.repos.conferences.get(id).await?.or_not_found("Conference")?;
        if conference.attendees.contains(&actor.id) {
            return Ok(conference);
        }
        if conference.is_past_at(Utc::now()) {
            return Err(ServiceError::validation("This conference is over"));
        }
        if conference.seats_remaining() == Some(0) {
            return Err(ServiceError::validation("This conference is fully booked"));
        }

        let filter = match conference.capacity {
            Some(_) => Filter::id(id).eq(
                "attendees",
                conference
                    .attendees
                    .iter()
                    .map(|a| Bson::ObjectId(*a))
                    .collect::<Vec<_>>(),
            ),
            None => Filter::id(id),
        };
        let updated = self
            .repos
            .conferences
            .update_one(filter, Update::new().add_to_set("attendees", actor.id))
            .await?
            .ok_or_else(|| ServiceError::Conflict("Conference changed, try again".to_string()))?;

        self.email
            .send_conference_confirmation(
                &actor.name,
                &actor.email,
                &updated.title,
                &updated.location,
                &updated.start_date.format("%Y-%m-%d %H:%M UTC").to_string(),
            )
            .await;
        tracing::info!(conference_id = %id, user_id = %actor.id, "Conference registration");
        Ok(updated)
    }

    pub async fn unregister(&self, actor: &User, id: ObjectId) -> ServiceResult<Conference> {
        self.repos
            .conferences
            .update_one(Filter::id(id), Update::new().pull("attendees", actor.id))
            .await?
            .or_not_found("Conference")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::TestEnv;
    use chrono::Duration;

    fn input(capacity: Option<i32>) -> CreateConferenceInput {
        CreateConferenceInput {
            title: "Giving summit".into(),
            description: "Annual #philanthropy meetup".into(),
            location: "Town hall".into(),
            start_date: Utc::now() + Duration::days(7),
            end_date: Utc::now() + Duration::days(8),
            speakers: vec![" Ada ".into(), "".into()],
            capacity,
            image: None,
        }
    }

    #[tokio::test]
    async fn test_admin_only_and_speaker_cleanup() {
        let env = TestEnv::new();
        let admin = env.admin().await;
        let carol = env.member("carol").await;

        assert!(env.services.conferences.create(&carol, input(None)).await.is_err());
        let conference = env.services.conferences.create(&admin, input(None)).await.unwrap();
        assert_eq!(conference.speakers, vec!["Ada"]);
        assert_eq!(conference.hashtags, vec!["philanthropy"]);

        let mut backwards = input(None);
        backwards.end_date = backwards.start_date - Duration::hours(1);
        assert!(env.services.conferences.create(&admin, backwards).await.is_err());
    }

    #[tokio::test]
    async fn test_register_sends_confirmation_and_respects_capacity() {
        let env = TestEnv::new();
        let admin = env.admin().await;
        let bob = env.user("bob").await;
        let dan = env.user("dan").await;
        let conference = env.services.conferences.create(&admin, input(Some(1))).await.unwrap();

        let registered = env.services.conferences.register(&bob, conference.id).await.unwrap();
        assert_eq!(registered.attendee_count(), 1);
        assert_eq!(registered.seats_remaining(), Some(0));

        let outbox = env.services.email.outbox().await;
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].to, bob.email);
        assert!(outbox[0].subject.contains("Giving summit"));

        assert!(env.services.conferences.register(&dan, conference.id).await.is_err());
        env.services.conferences.unregister(&bob, conference.id).await.unwrap();
        assert!(env.services.conferences.register(&dan, conference.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_upcoming_listing() {
        let env = TestEnv::new();
        let admin = env.admin().await;
        let mut past = input(None);
        past.start_date = Utc::now() - Duration::days(3);
        past.end_date = Utc::now() - Duration::days(2);
        let past = env.services.conferences.create(&admin, past).await.unwrap();
        env.services.conferences.create(&admin, input(None)).await.unwrap();

        let upcoming = env.services.conferences.list(true, Page::default()).await.unwrap();
        assert_eq!(upcoming.len(), 1);
        let all = env.services.conferences.list(false, Page::default()).await.unwrap();
        assert_eq!(all[0].id, past.id);

        let bob = env.user("bob").await;
        assert!(env.services.conferences.register(&bob, past.id).await.is_err());
    }
}
