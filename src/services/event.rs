//! Event service
//!
//! Trusted members organise events; anyone signed in can attend.

use bson::oid::ObjectId;
use chrono::Utc;
use std::sync::Arc;

use super::error::{OrNotFound, ServiceError, ServiceResult};
use super::hashtag::{extract_from, HashtagService};
use super::validation;
use crate::db::{Filter, Page, Query, Repositories, SortOrder, Update};
use crate::models::{CreateEventInput, Event, HashtagCategory, UpdateEventInput, User};

/// Filters for event listings
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub upcoming_only: bool,
    pub category: Option<String>,
    pub hashtag: Option<String>,
}

pub struct EventService {
    repos: Repositories,
    hashtags: Arc<HashtagService>,
}

impl EventService {
    pub fn new(repos: Repositories, hashtags: Arc<HashtagService>) -> Self {
        Self { repos, hashtags }
    }

    pub async fn get(&self, id: ObjectId) -> ServiceResult<Option<Event>> {
        Ok(self.repos.events.get(id).await?)
    }

    /// Soonest first
    pub async fn list(&self, filter: EventFilter, page: Page) -> ServiceResult<Vec<Event>> {
        let mut query = Filter::all()
            .eq_opt("category", filter.category)
            .eq_opt("hashtags", filter.hashtag.map(|h| h.trim_start_matches('#').to_lowercase()));
        if filter.upcoming_only {
            query = query.gte("date", Utc::now());
        }
        Ok(self
            .repos
            .events
            .find(Query::new(query).sort("date", SortOrder::Ascending).page(page))
            .await?)
    }

    pub async fn create(&self, actor: &User, input: CreateEventInput) -> ServiceResult<Event> {
        validation::ensure_trusted(actor)?;
        let title = validation::title(&input.title)?;
        let description = validation::required("Description", &input.description)?;
        let location = validation::required("Location", &input.location)?;
        let category = validation::required("Category", &input.category)?;

        let now = Utc::now();
        let event = Event {
            id: ObjectId::new(),
            hashtags: extract_from(&[&title, &description]),
            title,
            description,
            location,
            date: input.date,
            category,
            image: input.image,
            attendees: Vec::new(),
            organizer_id: actor.id,
            created_at: now,
            updated_at: now,
        };
        self.repos.events.insert(&event).await?;
        self.hashtags.track(&event.hashtags, HashtagCategory::Event).await?;
        tracing::info!(event_id = %event.id, "Event created");
        Ok(event)
    }

    pub async fn update(&self, actor: &User, id: ObjectId, input: UpdateEventInput) -> ServiceResult<Event> {
        let existing = self.repos.events.get(id).await?.or_not_found("Event")?;
        validation::ensure_can_manage(actor, existing.organizer_id)?;

        let title = input.title.as_deref().map(validation::title).transpose()?;
        let description = input
            .description
            .as_deref()
            .map(|d| validation::required("Description", d))
            .transpose()?;
        let hashtags = extract_from(&[
            title.as_deref().unwrap_or(&existing.title),
            description.as_deref().unwrap_or(&existing.description),
        ]);

        let mut update = Update::new()
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
        if let Some(category) = input.category {
            update = update.set("category", validation::required("Category", &category)?);
        }
        if let Some(date) = input.date {
            update = update.set("date", date);
        }
        if let Some(image) = input.image {
            update = update.set("image", image);
        }

        let updated = self
            .repos
            .events
            .update_one(Filter::id(id), update)
            .await?
            .or_not_found("Event")?;
        self.hashtags
            .sync(&existing.hashtags, &hashtags, HashtagCategory::Event)
            .await?;
        Ok(updated)
    }

    pub async fn delete(&self, actor: &User, id: ObjectId) -> ServiceResult<bool> {
        let existing = self.repos.events.get(id).await?.or_not_found("Event")?;
        validation::ensure_can_manage(actor, existing.organizer_id)?;
        self.repos.events.delete(id).await?;
        self.hashtags.untrack(&existing.hashtags, HashtagCategory::Event).await?;
        Ok(true)
    }

    pub async fn attend(&self, actor: &User, id: ObjectId) -> ServiceResult<Event> {
        let event = self.repos.events.get(id).await?.or_not_found("Event")?;
        if event.is_past_at(Utc::now()) {
            return Err(ServiceError::validation("This event has already taken place"));
        }
        self.repos
            .events
            .update_one(Filter::id(id), Update::new().add_to_set("attendees", actor.id))
            .await?
            .or_not_found("Event")
    }

    pub async fn cancel_attendance(&self, actor: &User, id: ObjectId) -> ServiceResult<Event> {
        self.repos
            .events
            .update_one(Filter::id(id), Update::new().pull("attendees", actor.id))
            .await?
            .or_not_found("Event")
    }
}
