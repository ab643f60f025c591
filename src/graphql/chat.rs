//! Chat rooms: history, sending and the live feed

use async_graphql::{ComplexObject, Context, Object, Result, ResultExt, Subscription};
use bson::oid::ObjectId;
use futures::stream::{Stream, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use super::context::ContextExt;
use super::loaders;
use crate::models::{ChatMessage, User};
use crate::services::chat::validate_room;

#[ComplexObject]
impl ChatMessage {
    async fn sender(&self, ctx: &Context<'_>) -> Result<Option<User>> {
        loaders::user(ctx, self.sender_id).await
    }
}

#[derive(Default)]
pub struct ChatQuery;

#[Object]
impl ChatQuery {
    /// Last messages of a room, oldest first
    async fn chat_messages(
        &self,
        ctx: &Context<'_>,
        room: String,
        #[graphql(default = 50)] limit: i32,
    ) -> Result<Vec<ChatMessage>> {
        ctx.services()
            .chat
            .history(&room, i64::from(limit))
            .await
            .extend()
    }
}

#[derive(Default)]
pub struct ChatMutation;

#[Object]
impl ChatMutation {
    async fn send_chat_message(&self, ctx: &Context<'_>, room: String, content: String) -> Result<ChatMessage> {
        let actor = ctx.require_user()?;
        ctx.services().chat.send(actor, &room, &content).await.extend()
    }

    async fn delete_chat_message(&self, ctx: &Context<'_>, id: ObjectId) -> Result<bool> {
        let actor = ctx.require_user()?;
        ctx.services().chat.delete(actor, id).await.extend()
    }
}

#[derive(Default)]
pub struct SubscriptionRoot;

#[Subscription]
impl SubscriptionRoot {
    /// New messages posted to a room
    async fn chat_message_sent(
        &self,
        ctx: &Context<'_>,
        room: String,
    ) -> Result<impl Stream<Item = ChatMessage>> {
        validate_room(&room).extend()?;
        let receiver = ctx.services().chat.subscribe();

        let stream = futures::stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(message) => return Some((message, receiver)),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Chat subscriber lagged behind");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
        .filter(move |message| futures::future::ready(message.room == room));

        Ok(stream)
    }
}
