//! Chat service
//!
//! Messages are stored per room and fanned out to live subscribers through a
//! `tokio::sync::broadcast` channel. Subscribers filter by room themselves.

use bson::oid::ObjectId;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::broadcast;

use super::error::{OrNotFound, ServiceError, ServiceResult};
use super::validation;
use crate::db::{Filter, Query, Repositories, SortOrder};
use crate::models::{ChatMessage, User};

pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// Messages buffered per subscriber before it starts lagging
const CHANNEL_CAPACITY: usize = 256;

static ROOM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9-]{1,64}$").expect("valid room regex"));

pub fn validate_room(room: &str) -> ServiceResult<()> {
    if ROOM_RE.is_match(room) {
        Ok(())
    } else {
        Err(ServiceError::validation(
            "Room names use 1-64 lowercase letters, digits or dashes",
        ))
    }
}

pub struct ChatService {
    repos: Repositories,
    sender: broadcast::Sender<ChatMessage>,
}

impl ChatService {
    pub fn new(repos: Repositories) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { repos, sender }
    }

    /// Last `limit` messages of a room, oldest first
    pub async fn history(&self, room: &str, limit: i64) -> ServiceResult<Vec<ChatMessage>> {
        validate_room(room)?;
        let mut messages = self
            .repos
            .chat_messages
            .find(
                Query::new(Filter::all().eq("room", room))
                    .sort("created_at", SortOrder::Descending)
                    .limit(limit.clamp(1, 100)),
            )
            .await?;
        messages.reverse();
        Ok(messages)
    }

    pub async fn send(&self, actor: &User, room: &str, content: &str) -> ServiceResult<ChatMessage> {
        validate_room(room)?;
        let content = validation::required("Message", content)?;
        if content.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ServiceError::validation(format!(
                "Message must be at most {} characters",
                MAX_MESSAGE_LENGTH
            )));
        }

        let message = ChatMessage {
            id: ObjectId::new(),
            room: room.to_string(),
            sender_id: actor.id,
            content,
            created_at: Utc::now(),
        };
        self.repos.chat_messages.insert(&message).await?;

        // No receivers is not an error
        let delivered = self.sender.send(message.clone()).unwrap_or(0);
        tracing::debug!(room = %room, delivered, "Chat message sent");
        Ok(message)
    }

    pub async fn delete(&self, actor: &User, id: ObjectId) -> ServiceResult<bool> {
        let message = self.repos.chat_messages.get(id).await?.or_not_found("Message")?;
        validation::ensure_can_manage(actor, message.sender_id)?;
        Ok(self.repos.chat_messages.delete(id).await?)
    }

    /// Live feed of every new message
    pub fn subscribe(&self) -> broadcast::Receiver<ChatMessage> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::TestEnv;

    #[test]
    fn test_room_names() {
        assert!(validate_room("general").is_ok());
        assert!(validate_room("campaign-42").is_ok());
        assert!(validate_room("").is_err());
        assert!(validate_room("General").is_err());
        assert!(validate_room(&"a".repeat(65)).is_err());
    }

    #[tokio::test]
    async fn test_history_is_ascending_and_limited() {
        let env = TestEnv::new();
        let bob = env.user("bob").await;
        for i in 0..5 {
            env.services.chat.send(&bob, "general", &format!("msg {}", i)).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        env.services.chat.send(&bob, "other", "elsewhere").await.unwrap();

        let history = env.services.chat.history("general", 3).await.unwrap();
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["msg 2", "msg 3", "msg 4"]);
    }

    #[tokio::test]
    async fn test_send_validation_and_broadcast() {
        let env = TestEnv::new();
        let bob = env.user("bob").await;
        let mut receiver = env.services.chat.subscribe();

        assert!(env.services.chat.send(&bob, "general", "  ").await.is_err());
        let too_long = "x".repeat(MAX_MESSAGE_LENGTH + 1);
        assert!(env.services.chat.send(&bob, "general", &too_long).await.is_err());

        let sent = env.services.chat.send(&bob, "general", "hello").await.unwrap();
        let received = receiver.recv().await.unwrap();
        assert_eq!(received, sent);
    }

    #[tokio::test]
    async fn test_delete_by_sender_or_admin() {
        let env = TestEnv::new();
        let admin = env.admin().await;
        let bob = env.user("bob").await;
        let eve = env.user("eve").await;

        let first = env.services.chat.send(&bob, "general", "one").await.unwrap();
        let second = env.services.chat.send(&bob, "general", "two").await.unwrap();

        assert_eq!(
            env.services.chat.delete(&eve, first.id).await.unwrap_err().code(),
            "FORBIDDEN"
        );
        assert!(env.services.chat.delete(&bob, first.id).await.unwrap());
        assert!(env.services.chat.delete(&admin, second.id).await.unwrap());
        assert!(env.services.chat.history("general", 10).await.unwrap().is_empty());
    }
}
