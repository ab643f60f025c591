//! Data models
//!
//! Every entity is a BSON document keyed by an `ObjectId` and doubles as its
//! GraphQL object type. References between entities are plain ids; the
//! GraphQL layer resolves them at read time. This module also holds the
//! GraphQL input types for create/update operations.

mod blog_post;
mod campaign;
mod chat_message;
mod conference;
pub mod datetime;
mod donor;
mod event;
mod hashtag;
mod initiative;
mod news;
mod payment;
mod recipe;
mod store_item;
mod story;
mod user;

pub use blog_post::{excerpt, BlogPost, Comment, CreateBlogPostInput, UpdateBlogPostInput};
pub use campaign::{Campaign, CampaignStats, CampaignStatus, CreateCampaignInput, UpdateCampaignInput};
pub use chat_message::ChatMessage;
pub use conference::{Conference, CreateConferenceInput, UpdateConferenceInput};
pub use donor::{Donation, Donor};
pub use event::{CreateEventInput, Event, UpdateEventInput};
pub use hashtag::{Hashtag, HashtagCategory};
pub use initiative::{CreateInitiativeInput, Initiative, UpdateInitiativeInput};
pub use news::{CreateNewsInput, News, UpdateNewsInput};
pub use payment::{
    CreatePaymentIntentInput, Payment, PaymentIntentPayload, PaymentPurpose, PaymentStatus,
    SetupIntentPayload,
};
pub use recipe::{CreateRecipeInput, Recipe, UpdateRecipeInput};
pub use store_item::{CreateStoreItemInput, StoreItem, UpdateStoreItemInput};
pub use story::{CreateStoryInput, Story};
pub use user::{gravatar_url, RegisterInput, UpdateProfileInput, User, UserRole};
