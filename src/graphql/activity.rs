//! Volunteering initiatives, conferences and community events

use async_graphql::{ComplexObject, Context, Object, Result, ResultExt};
use bson::oid::ObjectId;
use chrono::Utc;

use super::context::{page, ContextExt};
use super::loaders;
use crate::models::{
    Conference, CreateConferenceInput, CreateEventInput, CreateInitiativeInput, Event, Initiative,
    UpdateConferenceInput, UpdateEventInput, UpdateInitiativeInput, User,
};
use crate::services::{EventFilter, InitiativeFilter};

fn viewer_in(ctx: &Context<'_>, members: &[ObjectId]) -> bool {
    ctx.viewer().is_some_and(|v| members.contains(&v.id))
}

#[ComplexObject]
impl Initiative {
    async fn created_by(&self, ctx: &Context<'_>) -> Result<Option<User>> {
        loaders::user(ctx, self.created_by).await
    }

    #[graphql(name = "participantCount")]
    async fn resolve_participant_count(&self) -> i32 {
        self.participant_count()
    }

    /// Null when the initiative has no cap
    #[graphql(name = "spotsRemaining")]
    async fn resolve_spots_remaining(&self) -> Option<i32> {
        self.spots_remaining()
    }

    async fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }

    async fn is_participating(&self, ctx: &Context<'_>) -> bool {
        viewer_in(ctx, &self.participants)
    }
}

#[ComplexObject]
impl Conference {
    async fn created_by(&self, ctx: &Context<'_>) -> Result<Option<User>> {
        loaders::user(ctx, self.created_by).await
    }

    #[graphql(name = "attendeeCount")]
    async fn resolve_attendee_count(&self) -> i32 {
        self.attendee_count()
    }

    #[graphql(name = "seatsRemaining")]
    async fn resolve_seats_remaining(&self) -> Option<i32> {
        self.seats_remaining()
    }

    async fn is_upcoming(&self) -> bool {
        self.is_upcoming_at(Utc::now())
    }

    async fn is_registered(&self, ctx: &Context<'_>) -> bool {
        viewer_in(ctx, &self.attendees)
    }
}

#[ComplexObject]
impl Event {
    async fn organizer(&self, ctx: &Context<'_>) -> Result<Option<User>> {
        loaders::user(ctx, self.organizer_id).await
    }

    async fn attendee_count(&self) -> i32 {
        self.attendees.len() as i32
    }

    async fn is_past(&self) -> bool {
        self.is_past_at(Utc::now())
    }

    async fn is_attending(&self, ctx: &Context<'_>) -> bool {
        viewer_in(ctx, &self.attendees)
    }
}

#[derive(Default)]
pub struct ActivityQuery;

#[Object]
impl ActivityQuery {
    async fn initiatives(
        &self,
        ctx: &Context<'_>,
        category: Option<String>,
        hashtag: Option<String>,
        #[graphql(default)] active_only: bool,
        limit: Option<i32>,
        offset: Option<i32>,
    ) -> Result<Vec<Initiative>> {
        let filter = InitiativeFilter {
            category,
            hashtag,
            active_only,
        };
        ctx.services()
            .initiatives
            .list(filter, page(limit, offset))
            .await
            .extend()
    }

    async fn initiative(&self, ctx: &Context<'_>, id: ObjectId) -> Result<Option<Initiative>> {
        ctx.services().initiatives.get(id).await.extend()
    }

    async fn conferences(
        &self,
        ctx: &Context<'_>,
        #[graphql(default)] upcoming_only: bool,
        limit: Option<i32>,
        offset: Option<i32>,
    ) -> Result<Vec<Conference>> {
        ctx.services()
            .conferences
            .list(upcoming_only, page(limit, offset))
            .await
            .extend()
    }

    async fn conference(&self, ctx: &Context<'_>, id: ObjectId) -> Result<Option<Conference>> {
        ctx.services().conferences.get(id).await.extend()
    }

    async fn events(
        &self,
        ctx: &Context<'_>,
        #[graphql(default)] upcoming_only: bool,
        category: Option<String>,
        hashtag: Option<String>,
        limit: Option<i32>,
        offset: Option<i32>,
    ) -> Result<Vec<Event>> {
        let filter = EventFilter {
            upcoming_only,
            category,
            hashtag,
        };
        ctx.services().events.list(filter, page(limit, offset)).await.extend()
    }

    async fn event(&self, ctx: &Context<'_>, id: ObjectId) -> Result<Option<Event>> {
        ctx.services().events.get(id).await.extend()
    }
}

#[derive(Default)]
pub struct ActivityMutation;

#[Object]
impl ActivityMutation {
    // Initiatives

    async fn create_initiative(&self, ctx: &Context<'_>, input: CreateInitiativeInput) -> Result<Initiative> {
        let actor = ctx.require_user()?;
        ctx.services().initiatives.create(actor, input).await.extend()
    }

    async fn update_initiative(
        &self,
        ctx: &Context<'_>,
        id: ObjectId,
        input: UpdateInitiativeInput,
    ) -> Result<Initiative> {
        let actor = ctx.require_user()?;
        ctx.services().initiatives.update(actor, id, input).await.extend()
    }

    async fn delete_initiative(&self, ctx: &Context<'_>, id: ObjectId) -> Result<bool> {
        let actor = ctx.require_user()?;
        ctx.services().initiatives.delete(actor, id).await.extend()
    }

    async fn join_initiative(&self, ctx: &Context<'_>, id: ObjectId) -> Result<Initiative> {
        let actor = ctx.require_user()?;
        ctx.services().initiatives.join(actor, id).await.extend()
    }

    async fn leave_initiative(&self, ctx: &Context<'_>, id: ObjectId) -> Result<Initiative> {
        let actor = ctx.require_user()?;
        ctx.services().initiatives.leave(actor, id).await.extend()
    }

    // Conferences

    async fn create_conference(&self, ctx: &Context<'_>, input: CreateConferenceInput) -> Result<Conference> {
        let actor = ctx.require_user()?;
        ctx.services().conferences.create(actor, input).await.extend()
    }

    async fn update_conference(
        &self,
        ctx: &Context<'_>,
        id: ObjectId,
        input: UpdateConferenceInput,
    ) -> Result<Conference> {
        let actor = ctx.require_user()?;
        ctx.services().conferences.update(actor, id, input).await.extend()
    }

    async fn delete_conference(&self, ctx: &Context<'_>, id: ObjectId) -> Result<bool> {
        let actor = ctx.require_user()?;
        ctx.services().conferences.delete(actor, id).await.extend()
    }

    async fn register_for_conference(&self, ctx: &Context<'_>, id: ObjectId) -> Result<Conference> {
        let actor = ctx.require_user()?;
        ctx.services().conferences.register(actor, id).await.extend()
    }

    async fn unregister_from_conference(&self, ctx: &Context<'_>, id: ObjectId) -> Result<Conference> {
        let actor = ctx.require_user()?;
        ctx.services().conferences.unregister(actor, id).await.extend()
    }

    // Events

    async fn create_event(&self, ctx: &Context<'_>, input: CreateEventInput) -> Result<Event> {
        let actor = ctx.require_user()?;
        ctx.services().events.create(actor, input).await.extend()
    }

    async fn update_event(&self, ctx: &Context<'_>, id: ObjectId, input: UpdateEventInput) -> Result<Event> {
        let actor = ctx.require_user()?;
        ctx.services().events.update(actor, id, input).await.extend()
    }

    async fn delete_event(&self, ctx: &Context<'_>, id: ObjectId) -> Result<bool> {
        let actor = ctx.require_user()?;
        ctx.services().events.delete(actor, id).await.extend()
    }

    async fn attend_event(&self, ctx: &Context<'_>, id: ObjectId) -> Result<Event> {
        let actor = ctx.require_user()?;
        ctx.services().events.attend(actor, id).await.extend()
    }

    async fn cancel_attendance(&self, ctx: &Context<'_>, id: ObjectId) -> Result<Event> {
        let actor = ctx.require_user()?;
        ctx.services().events.cancel_attendance(actor, id).await.extend()
    }
}
